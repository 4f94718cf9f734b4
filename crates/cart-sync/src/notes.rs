//! Trailing-edge debouncing for typed input, and the timer spawn shared
//! with the controller.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::warn;

/// Run `work` after `delay` on the current tokio runtime.
///
/// Outside a runtime nothing is scheduled: the call logs and returns `None`.
pub(crate) fn spawn_after<F>(what: &'static str, delay: Duration, work: F) -> Option<AbortHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    let Ok(handle) = Handle::try_current() else {
        warn!(timer = what, "no tokio runtime, timer not started");
        return None;
    };
    let task = handle.spawn(async move {
        tokio::time::sleep(delay).await;
        work.await;
    });
    Some(task.abort_handle())
}

#[derive(Debug, Default)]
struct Pending {
    generation: u64,
    timer: Option<AbortHandle>,
}

/// Runs only the last of a burst of calls, `delay` after the burst ends.
///
/// A call that is still waiting is cancelled by the next one. Once the delay
/// has elapsed the work runs to completion even if new calls arrive.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: std::sync::Arc<Mutex<Pending>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Default::default(),
        }
    }

    /// Schedule `work`, replacing anything still waiting. Outside a tokio
    /// runtime the call is dropped with a warning.
    pub fn call<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        let generation = pending.generation;
        let shared = std::sync::Arc::clone(&self.pending);
        pending.timer = spawn_after("debounce", self.delay, async move {
            {
                let mut pending = shared.lock();
                if pending.generation != generation {
                    return;
                }
                pending.timer = None;
            }
            work.await;
        });
    }

    /// Drop the waiting call, if any. Returns whether one was dropped.
    pub fn cancel(&self) -> bool {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        match pending.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a call is waiting out its delay.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().timer.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_last_only() {
        let debouncer = Debouncer::new(Duration::from_millis(1000));
        let seen = Arc::new(Mutex::new(Vec::new()));

        for text in ["g", "gi", "gift"] {
            let seen = Arc::clone(&seen);
            debouncer.call(async move { seen.lock().push(text) });
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(debouncer.is_pending());
        assert!(seen.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(*seen.lock(), vec!["gift"]);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_call_without_runtime_is_dropped() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.call(async {});
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        debouncer.call(async move { *counter.lock() += 1 });
        assert!(debouncer.cancel());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*seen.lock(), 0);
        assert!(!debouncer.cancel());
    }
}
