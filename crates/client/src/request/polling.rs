//! Interval-driven re-execution of a request executor.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use qa_playground_shared::ApiError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::executor::{RequestExecutor, RequestOptions};
use super::state::RequestState;

/// Shortest accepted polling interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingOptions {
    /// Time between two executions.
    pub interval: Duration,
    /// Start polling right after construction.
    pub auto_start: bool,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            auto_start: true,
        }
    }
}

impl PollingOptions {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn manual(mut self) -> Self {
        self.auto_start = false;
        self
    }
}

/// Re-runs an executor with default arguments every `interval`.
///
/// Executions never overlap: the next tick is only awaited once the previous
/// execution finished. Stopping (or dropping the poller) ends the loop at the
/// next tick; an execution already in flight still completes.
pub struct Poller<A, T> {
    executor: RequestExecutor<A, T>,
    interval: Duration,
    task: Mutex<Option<PollTask>>,
}

struct PollTask {
    handle: JoinHandle<()>,
    /// Resolves the loop's stop receiver when sent or dropped.
    stop: oneshot::Sender<()>,
}

impl PollTask {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Build a [`Poller`]. With `auto_start` this must be called from within a
/// tokio runtime.
pub fn use_polling<A, T, F, Fut>(
    operation: F,
    polling: PollingOptions,
    request: RequestOptions<T>,
) -> Poller<A, T>
where
    A: Clone + Default + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    let poller = Poller {
        executor: RequestExecutor::new(operation, request),
        interval: polling.interval,
        task: Mutex::new(None),
    };
    if polling.auto_start {
        poller.start();
    }
    poller
}

impl<A, T> Poller<A, T>
where
    A: Clone + Default + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Start polling. The first execution happens one interval from now.
    ///
    /// Returns `false` when already running.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(PollTask::is_running) {
            return false;
        }

        let (stop, stopped) = oneshot::channel();
        let handle = tokio::spawn(poll(self.executor.clone(), self.interval, stopped));
        *task = Some(PollTask { handle, stop });
        tracing::debug!("Polling started every {:?}", self.interval);
        true
    }

    /// Stop polling. Returns `false` when not running.
    pub fn stop(&self) -> bool {
        match self.task.lock().take() {
            Some(task) => {
                let was_running = task.is_running();
                let _ = task.stop.send(());
                if was_running {
                    tracing::debug!("Polling stopped");
                }
                was_running
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(PollTask::is_running)
    }

    pub fn executor(&self) -> &RequestExecutor<A, T> {
        &self.executor
    }

    pub fn state(&self) -> RequestState<T> {
        self.executor.state()
    }

    pub fn teardown(&self) {
        self.stop();
        self.executor.teardown();
    }
}

async fn poll<A, T>(executor: RequestExecutor<A, T>, period: Duration, mut stopped: oneshot::Receiver<()>)
where
    A: Clone + Default + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    let period = period.max(MIN_INTERVAL);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = &mut stopped => break,
            _ = ticker.tick() => {}
        }
        if !executor.is_alive() {
            break;
        }
        if let Err(err) = executor.execute(A::default()).await {
            tracing::debug!("Poll failed: {}", err);
        }
    }
}
