use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A single pending delayed task. Scheduling again cancels whatever was
/// pending; only the last task scheduled within a quiet window runs.
#[derive(Default)]
pub(crate) struct DebounceTimer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay` unless rescheduled or cancelled first.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("No Tokio runtime available; scheduled update dropped");
            return;
        };

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        if let Some(previous) = self.pending.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        if let Some(pending) = self.pending.lock().take() {
            pending.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn bump(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_cancels_pending_task() {
        let timer = DebounceTimer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        timer.schedule(Duration::from_millis(100), bump(&runs));
        tokio::time::sleep(Duration::from_millis(50)).await;
        timer.schedule(Duration::from_millis(100), bump(&runs));
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let timer = DebounceTimer::new();
        let runs = Arc::new(AtomicUsize::new(0));
        timer.schedule(Duration::from_millis(10), bump(&runs));
        timer.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
