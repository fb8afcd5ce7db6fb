//! Periodic tracking runs.
//!
//! Each keyword gets its own tokio task that ticks on a fixed interval.
//! Tasks are keyed by keyword id so one keyword can be rescheduled or
//! cancelled without touching the others.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Owns one repeating task per keyword id.
#[derive(Default)]
pub struct Scheduler {
    tasks: HashMap<String, JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` now and then every `every`, replacing any task already
    /// registered under `keyword_id`.
    ///
    /// A run that overruns the interval delays the next one instead of
    /// stacking up.
    pub fn schedule<F, Fut>(&mut self, keyword_id: &str, every: Duration, job: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.cancel(keyword_id) {
            debug!("Replacing schedule for '{}'", keyword_id);
        }

        let id = keyword_id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("Scheduled run for '{}'", id);
                job().await;
            }
        });

        info!("Scheduled '{}' every {:?}", keyword_id, every);
        self.tasks.insert(keyword_id.to_string(), handle);
    }

    /// Stop the task for `keyword_id`. Returns whether one was running.
    pub fn cancel(&mut self, keyword_id: &str) -> bool {
        match self.tasks.remove(keyword_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, keyword_id: &str) -> bool {
        self.tasks.contains_key(keyword_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every task.
    pub fn shutdown(&mut self) {
        for (id, handle) in self.tasks.drain() {
            debug!("Cancelling schedule for '{}'", id);
            handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_job(counter: &Arc<AtomicUsize>) -> impl Fn() -> futures::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test]
    async fn test_runs_repeatedly() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.schedule("coffee", Duration::from_millis(10), counting_job(&counter));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(counter.load(Ordering::SeqCst) >= 2);
        assert!(scheduler.is_scheduled("coffee"));
    }

    #[tokio::test]
    async fn test_cancel_stops_only_that_keyword() {
        let coffee = Arc::new(AtomicUsize::new(0));
        let tea = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.schedule("coffee", Duration::from_millis(10), counting_job(&coffee));
        scheduler.schedule("tea", Duration::from_millis(10), counting_job(&tea));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(scheduler.cancel("coffee"));
        assert!(!scheduler.cancel("coffee"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let coffee_after_cancel = coffee.load(Ordering::SeqCst);
        let tea_before = tea.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(coffee.load(Ordering::SeqCst), coffee_after_cancel);
        assert!(tea.load(Ordering::SeqCst) > tea_before);
        assert_eq!(scheduler.len(), 1);
    }

    #[tokio::test]
    async fn test_reschedule_replaces_task() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();

        scheduler.schedule("coffee", Duration::from_millis(10), counting_job(&first));
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.schedule("coffee", Duration::from_millis(10), counting_job(&second));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let first_count = first.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(first.load(Ordering::SeqCst), first_count);
        assert!(second.load(Ordering::SeqCst) >= 1);
        assert_eq!(scheduler.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_clears_all() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.schedule("a", Duration::from_secs(60), counting_job(&counter));
        scheduler.schedule("b", Duration::from_secs(60), counting_job(&counter));
        assert_eq!(scheduler.len(), 2);

        scheduler.shutdown();
        assert!(scheduler.is_empty());
    }
}
