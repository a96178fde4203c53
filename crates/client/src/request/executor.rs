//! Generic request executor: loading/error/data state, retries and a
//! time-boxed result cache around one asynchronous operation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use qa_playground_shared::{ApiError, ErrorInfo};
use tokio::sync::watch;

use super::state::{CacheEntry, RequestState};
use crate::lifecycle::Liveness;

pub type OperationFuture<T> = BoxFuture<'static, Result<T, ApiError>>;
type Operation<A, T> = Arc<dyn Fn(A) -> OperationFuture<T> + Send + Sync>;

pub type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&ErrorInfo) + Send + Sync>;

/// Which failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Retry every failure.
    #[default]
    Always,
    /// Skip retries for permanent client errors (see [`ErrorInfo::is_transient`]).
    TransientOnly,
}

impl RetryPolicy {
    pub fn allows(&self, error: &ErrorInfo) -> bool {
        match self {
            RetryPolicy::Always => true,
            RetryPolicy::TransientOnly => error.is_transient(),
        }
    }
}

/// Executor configuration.
#[derive(Clone)]
pub struct RequestOptions<T> {
    /// Run once with default arguments right after construction.
    pub immediate: bool,
    /// Additional attempts after the first failure.
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub retry_policy: RetryPolicy,
    pub cache: bool,
    /// Maximum age of a cached result.
    pub cache_time: Duration,
    pub on_success: Option<SuccessCallback<T>>,
    pub on_error: Option<ErrorCallback>,
}

impl<T> Default for RequestOptions<T> {
    fn default() -> Self {
        Self {
            immediate: false,
            retry_count: 0,
            retry_delay: Duration::from_secs(1),
            retry_policy: RetryPolicy::Always,
            cache: false,
            cache_time: Duration::from_secs(5 * 60),
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> RequestOptions<T> {
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn retry(mut self, count: u32, delay: Duration) -> Self {
        self.retry_count = count;
        self.retry_delay = delay;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn cache(mut self, cache_time: Duration) -> Self {
        self.cache = true;
        self.cache_time = cache_time;
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&ErrorInfo) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

struct Inner<A, T> {
    operation: Operation<A, T>,
    options: RequestOptions<T>,
    state: watch::Sender<RequestState<T>>,
    cache: Mutex<Option<CacheEntry<T>>>,
    liveness: Liveness,
}

/// Wraps one asynchronous operation and exposes its `{ data, loading, error }`.
///
/// Clones share the same state, cache and liveness. After
/// [`RequestExecutor::teardown`], results of calls still in flight are
/// returned to their callers but no longer written to state.
pub struct RequestExecutor<A, T> {
    inner: Arc<Inner<A, T>>,
}

impl<A, T> Clone for RequestExecutor<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Build a [`RequestExecutor`] around `operation`.
///
/// With `options.immediate` this must be called from within a tokio runtime.
pub fn use_api<A, T, F, Fut>(operation: F, options: RequestOptions<T>) -> RequestExecutor<A, T>
where
    A: Clone + Default + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    RequestExecutor::new(operation, options)
}

impl<A, T> RequestExecutor<A, T>
where
    A: Clone + Default + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(operation: F, options: RequestOptions<T>) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let operation: Operation<A, T> = Arc::new(move |args| operation(args).boxed());
        let immediate = options.immediate;
        let (state, _) = watch::channel(RequestState::default());

        let executor = Self {
            inner: Arc::new(Inner {
                operation,
                options,
                state,
                cache: Mutex::new(None),
                liveness: Liveness::new(),
            }),
        };

        if immediate {
            executor.mark_loading();
            let first = executor.clone();
            tokio::spawn(async move {
                // Failures are recorded in state and reported through `on_error`.
                let _ = first.execute(A::default()).await;
            });
        }

        executor
    }

    /// Run the operation with `args`, honoring cache and retry settings.
    ///
    /// Attempts are strictly sequential. The final error is recorded in state
    /// and returned.
    pub async fn execute(&self, args: A) -> Result<T, ErrorInfo> {
        let inner = &self.inner;
        let options = &inner.options;

        if options.cache {
            let cached = inner
                .cache
                .lock()
                .as_ref()
                .filter(|entry| entry.is_fresh(options.cache_time))
                .map(|entry| entry.data.clone());
            if let Some(data) = cached {
                tracing::debug!("Serving cached result");
                self.write(|s| s.data = Some(data.clone()));
                return Ok(data);
            }
        }

        self.write(|s| {
            s.loading = true;
            s.error = None;
        });

        let mut attempt = 0u32;
        loop {
            match (inner.operation)(args.clone()).await {
                Ok(data) => {
                    let written = self.write(|s| {
                        s.data = Some(data.clone());
                        s.loading = false;
                        s.error = None;
                    });
                    if written {
                        if options.cache {
                            *inner.cache.lock() = Some(CacheEntry::new(data.clone()));
                        }
                        if let Some(callback) = options.on_success.as_ref() {
                            callback(&data);
                        }
                    }
                    return Ok(data);
                }
                Err(err) => {
                    let info = ErrorInfo::from(&err);
                    let may_retry = attempt < options.retry_count
                        && options.retry_policy.allows(&info)
                        && inner.liveness.is_alive();
                    if may_retry {
                        attempt += 1;
                        tracing::warn!(
                            "Request failed ({}), retry {}/{} in {:?}",
                            info,
                            attempt,
                            options.retry_count,
                            options.retry_delay
                        );
                        tokio::time::sleep(options.retry_delay).await;
                        continue;
                    }

                    let written = self.write(|s| {
                        s.error = Some(info.clone());
                        s.loading = false;
                    });
                    if written {
                        if let Some(callback) = options.on_error.as_ref() {
                            callback(&info);
                        }
                    }
                    return Err(info);
                }
            }
        }
    }

    /// Drop the cached result and run again with default arguments.
    pub async fn refetch(&self) -> Result<T, ErrorInfo> {
        self.inner.cache.lock().take();
        self.execute(A::default()).await
    }

    /// Clear data, error and cache. Calls in flight are not affected.
    pub fn reset(&self) {
        self.inner.cache.lock().take();
        self.inner.state.send_replace(RequestState::default());
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> RequestState<T> {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.inner.state.subscribe()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.inner.state.borrow().error.clone()
    }

    /// The owner is gone: stop writing state from now on.
    pub fn teardown(&self) {
        self.inner.liveness.invalidate();
    }

    pub fn is_alive(&self) -> bool {
        self.inner.liveness.is_alive()
    }

    pub(crate) fn mark_loading(&self) {
        self.write(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    /// Apply `update` unless the owner is gone. Returns whether it was applied.
    fn write(&self, update: impl FnOnce(&mut RequestState<T>)) -> bool {
        if !self.inner.liveness.is_alive() {
            return false;
        }
        self.inner.state.send_modify(update);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[tokio::test]
    async fn successful_execution_toggles_loading() {
        let (tx, rx) = oneshot::channel::<u32>();
        let rx = Arc::new(Mutex::new(Some(rx)));
        let executor: RequestExecutor<(), u32> = use_api(
            move |_| {
                let rx = rx.lock().take();
                async move {
                    match rx {
                        Some(rx) => rx.await.map_err(|e| ApiError::Network(e.to_string())),
                        None => Err(ApiError::Network("called twice".to_string())),
                    }
                }
            },
            RequestOptions::default(),
        );
        let mut states = executor.subscribe();
        assert!(!executor.is_loading());

        let running = tokio::spawn({
            let executor = executor.clone();
            async move { executor.execute(()).await }
        });
        states.wait_for(|s| s.loading).await.unwrap();
        assert_eq!(executor.error(), None);

        tx.send(7).unwrap();
        assert_eq!(running.await.unwrap(), Ok(7));

        let state = executor.state();
        assert!(!state.loading);
        assert_eq!(state.data, Some(7));
        assert_eq!(state.error, None);
        assert!(state.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_record_error() {
        let calls = counter();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let executor: RequestExecutor<(), u32> = use_api(
            {
                let calls = calls.clone();
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(ApiError::Network("boom".to_string())) }
                }
            },
            RequestOptions::default()
                .retry(2, Duration::from_millis(100))
                .on_error({
                    let errors = errors.clone();
                    move |e| errors.lock().push(e.clone())
                }),
        );

        let started = Instant::now();
        let err = executor.execute(()).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(err.message, "boom");
        let state = executor.state();
        assert!(!state.loading);
        assert_eq!(state.error.map(|e| e.message), Some("boom".to_string()));
        assert_eq!(errors.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_on_later_attempt() {
        let calls = counter();
        let executor: RequestExecutor<(), &'static str> = use_api(
            {
                let calls = calls.clone();
                move |_| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(ApiError::Network("flaky".to_string()))
                        } else {
                            Ok("ok")
                        }
                    }
                }
            },
            RequestOptions::default().retry(3, Duration::from_millis(50)),
        );

        assert_eq!(executor.execute(()).await, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(executor.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_only_policy_skips_client_errors() {
        let calls = counter();
        let executor: RequestExecutor<(), u32> = use_api(
            {
                let calls = calls.clone();
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        Err(ApiError::Api(ErrorInfo::new("VALIDATION", "bad email", 422)))
                    }
                }
            },
            RequestOptions::default()
                .retry(3, Duration::from_millis(10))
                .retry_policy(RetryPolicy::TransientOnly),
        );

        let err = executor.execute(()).await.unwrap_err();
        assert_eq!(err.code, "VALIDATION");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_result_is_served_until_expired() {
        let calls = counter();
        let executor: RequestExecutor<(), u32> = use_api(
            {
                let calls = calls.clone();
                move |_| {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Ok(n) }
                }
            },
            RequestOptions::default().cache(Duration::from_secs(1)),
        );

        assert_eq!(executor.execute(()).await, Ok(1));
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(executor.execute(()).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(executor.execute(()).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refetch_bypasses_cache() {
        let calls = counter();
        let executor: RequestExecutor<(), u32> = use_api(
            {
                let calls = calls.clone();
                move |_| {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Ok(n) }
                }
            },
            RequestOptions::default().cache(Duration::from_secs(60)),
        );

        assert_eq!(executor.execute(()).await, Ok(1));
        assert_eq!(executor.refetch().await, Ok(2));
        assert_eq!(executor.execute(()).await, Ok(2));
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let executor: RequestExecutor<(), u32> = use_api(
            |_| async { Err(ApiError::Network("down".to_string())) },
            RequestOptions::default(),
        );
        let _ = executor.execute(()).await;
        assert!(executor.error().is_some());

        executor.reset();
        assert_eq!(executor.state(), RequestState::default());
    }

    #[tokio::test]
    async fn arguments_are_forwarded() {
        let executor: RequestExecutor<(u32, u32), u32> = use_api(
            |(a, b)| async move { Ok(a + b) },
            RequestOptions::default(),
        );
        assert_eq!(executor.execute((2, 3)).await, Ok(5));
    }

    #[tokio::test]
    async fn immediate_runs_once_after_construction() {
        let calls = counter();
        let successes = counter();
        let executor: RequestExecutor<(), u32> = use_api(
            {
                let calls = calls.clone();
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(42) }
                }
            },
            RequestOptions::default().immediate().on_success({
                let successes = successes.clone();
                move |_| {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        assert!(executor.is_loading());

        let mut states = executor.subscribe();
        states.wait_for(|s| s.data.is_some()).await.unwrap();
        assert_eq!(executor.data(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(successes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn teardown_suppresses_late_writes() {
        let (tx, rx) = oneshot::channel::<u32>();
        let rx = Arc::new(Mutex::new(Some(rx)));
        let successes = counter();
        let executor: RequestExecutor<(), u32> = use_api(
            move |_| {
                let rx = rx.lock().take();
                async move {
                    match rx {
                        Some(rx) => rx.await.map_err(|e| ApiError::Network(e.to_string())),
                        None => Err(ApiError::Network("called twice".to_string())),
                    }
                }
            },
            RequestOptions::default().on_success({
                let successes = successes.clone();
                move |_| {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        let mut states = executor.subscribe();

        let running = tokio::spawn({
            let executor = executor.clone();
            async move { executor.execute(()).await }
        });
        states.wait_for(|s| s.loading).await.unwrap();

        executor.teardown();
        tx.send(9).unwrap();

        assert_eq!(running.await.unwrap(), Ok(9));
        assert_eq!(executor.data(), None);
        assert_eq!(successes.load(Ordering::SeqCst), 0);
        assert!(!executor.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_pending_retries() {
        let calls = counter();
        let executor: RequestExecutor<(), u32> = use_api(
            {
                let calls = calls.clone();
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(ApiError::Network("down".to_string())) }
                }
            },
            RequestOptions::default().retry(5, Duration::from_secs(1)),
        );

        let running = tokio::spawn({
            let executor = executor.clone();
            async move { executor.execute(()).await }
        });
        tokio::time::sleep(Duration::from_millis(1500)).await;
        executor.teardown();

        assert!(running.await.unwrap().is_err());
        assert!(calls.load(Ordering::SeqCst) < 6);
    }
}
