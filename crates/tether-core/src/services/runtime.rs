//! Background task scheduling.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Cancels a registered background task.
///
/// Dropping the handle does not stop the task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    name: &'static str,
    token: CancellationToken,
}

impl TaskHandle {
    pub fn new(name: &'static str, token: CancellationToken) -> Self {
        Self { name, token }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!(task = self.name, "Cancelling background task");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Host facility for running periodic and delayed work.
pub trait BackgroundTaskRunner: Send + Sync + 'static {
    /// Run `task` every `interval`, starting one interval from now.
    fn register_periodic<F, Fut>(&self, name: &'static str, interval: Duration, task: F) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static;

    /// Run `task` once after `delay` unless cancelled first.
    fn schedule_once<F, Fut>(&self, name: &'static str, delay: Duration, task: F) -> TaskHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static;
}

/// Runner that spawns onto the current tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTaskRunner;

impl BackgroundTaskRunner for TokioTaskRunner {
    fn register_periodic<F, Fut>(&self, name: &'static str, interval: Duration, task: F) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            // A suspended device resumes with one tick, not a burst.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        tracing::debug!(task = name, "Running periodic task");
                        task().await;
                    }
                }
            }
            tracing::debug!(task = name, "Periodic task stopped");
        });

        TaskHandle::new(name, token)
    }

    fn schedule_once<F, Fut>(&self, name: &'static str, delay: Duration, task: F) -> TaskHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => {
                    tracing::debug!(task = name, "Delayed task cancelled before firing");
                }
                () = tokio::time::sleep(delay) => {
                    tracing::debug!(task = name, "Running delayed task");
                    task().await;
                }
            }
        });

        TaskHandle::new(name, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_task(
        counter: &Arc<AtomicUsize>,
    ) -> impl Fn() -> std::future::Ready<()> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_runs_each_interval_until_cancelled() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = TokioTaskRunner.register_periodic(
            "test-periodic",
            Duration::from_secs(10),
            counter_task(&counter),
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        handle.cancel();
        assert!(handle.is_cancelled());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_task_fires_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counter_task(&counter);
        let handle = TokioTaskRunner.schedule_once("test-once", Duration::from_secs(60), task);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(handle.name(), "test-once");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_delayed_task_never_fires() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counter_task(&counter);
        let handle = TokioTaskRunner.schedule_once("test-once", Duration::from_secs(60), task);

        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
