//! Page-accumulating executor.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use qa_playground_shared::{ApiError, ErrorInfo, PageResponse};
use tokio::sync::watch;

use super::executor::{RequestExecutor, RequestOptions};
use super::state::RequestState;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Arguments handed to a paginated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Accumulated pages.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState<T> {
    pub page: u32,
    pub has_more: bool,
    pub items: Vec<T>,
}

impl<T> Default for PaginationState<T> {
    fn default() -> Self {
        Self {
            page: 1,
            has_more: true,
            items: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct PaginatedOptions<T> {
    pub page_size: u32,
    /// Options of the underlying executor. Caching is always disabled:
    /// a single cache slot cannot tell pages apart.
    pub request: RequestOptions<PageResponse<T>>,
}

impl<T> Default for PaginatedOptions<T> {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            request: RequestOptions::default(),
        }
    }
}

impl<T> PaginatedOptions<T> {
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn request(mut self, request: RequestOptions<PageResponse<T>>) -> Self {
        self.request = request;
        self
    }

    /// Load the first page right after construction.
    pub fn immediate(mut self) -> Self {
        self.request.immediate = true;
        self
    }
}

struct PaginatedInner<T> {
    executor: RequestExecutor<PageRequest, PageResponse<T>>,
    page_size: u32,
    pagination: watch::Sender<PaginationState<T>>,
    /// Bumped by `refresh`; results of loads started before are dropped.
    epoch: AtomicU64,
}

/// Executor that walks a paginated endpoint and keeps every loaded item.
pub struct PaginatedExecutor<T> {
    inner: Arc<PaginatedInner<T>>,
}

impl<T> Clone for PaginatedExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Build a [`PaginatedExecutor`].
///
/// With `immediate`, page 1 starts loading right away; this must then be
/// called from within a tokio runtime.
pub fn use_paginated_api<T, F, Fut>(operation: F, options: PaginatedOptions<T>) -> PaginatedExecutor<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PageResponse<T>, ApiError>> + Send + 'static,
{
    let PaginatedOptions {
        page_size,
        mut request,
    } = options;
    let immediate = request.immediate;
    request.immediate = false;
    request.cache = false;

    let (pagination, _) = watch::channel(PaginationState::default());
    let paginated = PaginatedExecutor {
        inner: Arc::new(PaginatedInner {
            executor: RequestExecutor::new(operation, request),
            page_size: page_size.max(1),
            pagination,
            epoch: AtomicU64::new(0),
        }),
    };

    if immediate {
        paginated.inner.executor.mark_loading();
        let first = paginated.clone();
        tokio::spawn(async move {
            let _ = first.execute().await;
        });
    }

    paginated
}

impl<T> PaginatedExecutor<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Load the current page.
    ///
    /// Page 1 replaces the accumulated items; later pages are appended.
    /// Returns the items of the loaded page. A page that completes after a
    /// [`refresh`](Self::refresh) started is returned but not applied.
    pub async fn execute(&self) -> Result<Vec<T>, ErrorInfo> {
        let epoch = self.inner.epoch.load(Ordering::Acquire);
        self.load_page(epoch).await
    }

    async fn load_page(&self, epoch: u64) -> Result<Vec<T>, ErrorInfo> {
        let inner = &self.inner;
        let page = inner.pagination.borrow().page;
        let response = inner
            .executor
            .execute(PageRequest {
                page,
                page_size: inner.page_size,
            })
            .await?;

        let (items, has_next) = response.into_parts();
        let has_more = has_next.unwrap_or(items.len() >= inner.page_size as usize);

        if inner.executor.is_alive() {
            let applied = inner.pagination.send_if_modified(|state| {
                if inner.epoch.load(Ordering::Acquire) != epoch {
                    return false;
                }
                if page <= 1 {
                    state.items = items.clone();
                } else {
                    state.items.extend(items.iter().cloned());
                }
                state.has_more = has_more;
                true
            });
            if !applied {
                tracing::debug!("Dropping page {} loaded before a refresh", page);
            }
        }
        Ok(items)
    }

    /// Advance to the next page and load it.
    ///
    /// Returns `Ok(false)` without calling the operation while a load is in
    /// flight or when there are no more pages. On failure the page number is
    /// rolled back so the same page is requested next time.
    pub async fn load_more(&self) -> Result<bool, ErrorInfo> {
        if self.inner.executor.is_loading() || !self.inner.pagination.borrow().has_more {
            tracing::debug!("load_more ignored: loading or no more pages");
            return Ok(false);
        }

        let epoch = self.inner.epoch.load(Ordering::Acquire);
        let mut requested = 0;
        self.inner.pagination.send_modify(|state| {
            state.page += 1;
            requested = state.page;
        });

        match self.load_page(epoch).await {
            Ok(_) => Ok(true),
            Err(err) => {
                let inner = &self.inner;
                inner.pagination.send_if_modified(|state| {
                    if inner.epoch.load(Ordering::Acquire) == epoch && state.page == requested {
                        state.page -= 1;
                        true
                    } else {
                        false
                    }
                });
                Err(err)
            }
        }
    }

    /// Start over from page 1, discarding pages still in flight.
    pub async fn refresh(&self) -> Result<Vec<T>, ErrorInfo> {
        let epoch = self.inner.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.pagination.send_replace(PaginationState::default());
        self.load_page(epoch).await
    }

    pub fn pagination(&self) -> PaginationState<T> {
        self.inner.pagination.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaginationState<T>> {
        self.inner.pagination.subscribe()
    }

    pub fn items(&self) -> Vec<T> {
        self.inner.pagination.borrow().items.clone()
    }

    pub fn has_more(&self) -> bool {
        self.inner.pagination.borrow().has_more
    }

    pub fn page(&self) -> u32 {
        self.inner.pagination.borrow().page
    }

    /// State of the underlying executor (`loading`, last page, `error`).
    pub fn request_state(&self) -> RequestState<PageResponse<T>> {
        self.inner.executor.state()
    }

    pub fn subscribe_request(&self) -> watch::Receiver<RequestState<PageResponse<T>>> {
        self.inner.executor.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.executor.is_loading()
    }

    pub fn teardown(&self) {
        self.inner.executor.teardown();
    }

    pub fn is_alive(&self) -> bool {
        self.inner.executor.is_alive()
    }
}
