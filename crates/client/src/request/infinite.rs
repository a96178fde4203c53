//! Infinite scroll: a paginated executor driven by sentinel visibility.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use qa_playground_shared::{ApiError, PageResponse};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::paginated::{use_paginated_api, PageRequest, PaginatedExecutor, PaginatedOptions, PaginationState};

/// Visibility of the element at the end of the list.
///
/// The view reports intersection changes through [`Sentinel::set_visible`].
#[derive(Clone)]
pub struct Sentinel {
    visible: Arc<watch::Sender<bool>>,
}

impl Sentinel {
    fn new() -> Self {
        let (visible, _) = watch::channel(false);
        Self {
            visible: Arc::new(visible),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.send_if_modified(|current| {
            let changed = *current != visible;
            *current = visible;
            changed
        });
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }
}

/// A [`PaginatedExecutor`] plus the observer task that loads the next page
/// whenever the sentinel is visible, more pages exist and nothing is loading.
///
/// Dropping it stops the observer.
pub struct InfiniteScroll<T> {
    paginated: PaginatedExecutor<T>,
    sentinel: Sentinel,
    observer: Mutex<Option<JoinHandle<()>>>,
}

/// Build an [`InfiniteScroll`]. The first page is always loaded right away,
/// so this must be called from within a tokio runtime.
pub fn use_infinite_scroll<T, F, Fut>(operation: F, options: PaginatedOptions<T>) -> InfiniteScroll<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PageResponse<T>, ApiError>> + Send + 'static,
{
    let paginated = use_paginated_api(operation, options.immediate());
    let sentinel = Sentinel::new();
    let observer = tokio::spawn(observe(paginated.clone(), sentinel.visible.subscribe()));

    InfiniteScroll {
        paginated,
        sentinel,
        observer: Mutex::new(Some(observer)),
    }
}

async fn observe<T>(paginated: PaginatedExecutor<T>, mut visible: watch::Receiver<bool>)
where
    T: Clone + Send + Sync + 'static,
{
    let mut requests = paginated.subscribe_request();
    let mut pages = paginated.subscribe();

    loop {
        let ready = *visible.borrow_and_update()
            && !requests.borrow_and_update().loading
            && pages.borrow_and_update().has_more;

        if ready && paginated.is_alive() {
            match paginated.load_more().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    tracing::debug!("Infinite scroll load failed: {}", err);
                    // Only a fresh intersection retries a failed page.
                    if visible.changed().await.is_err() {
                        return;
                    }
                    continue;
                }
            }
        }

        tokio::select! {
            changed = visible.changed() => if changed.is_err() { return },
            changed = requests.changed() => if changed.is_err() { return },
            changed = pages.changed() => if changed.is_err() { return },
        }
    }
}

impl<T> InfiniteScroll<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn sentinel(&self) -> Sentinel {
        self.sentinel.clone()
    }

    pub fn paginated(&self) -> &PaginatedExecutor<T> {
        &self.paginated
    }

    pub fn items(&self) -> Vec<T> {
        self.paginated.items()
    }

    pub fn has_more(&self) -> bool {
        self.paginated.has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.paginated.is_loading()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaginationState<T>> {
        self.paginated.subscribe()
    }

    /// Stop observing and suppress further state writes.
    pub fn teardown(&self) {
        if let Some(observer) = self.observer.lock().take() {
            observer.abort();
        }
        self.paginated.teardown();
    }
}

impl<T> Drop for InfiniteScroll<T> {
    fn drop(&mut self) {
        if let Some(observer) = self.observer.get_mut().take() {
            observer.abort();
        }
    }
}
