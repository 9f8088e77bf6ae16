//! Debounce timer and request generations
//!
//! The quote and info refresh paths share one concurrency discipline:
//! every trigger bumps a generation counter, the fetch runs after a
//! trailing-edge debounce window, and the response is applied only if its
//! generation is still current. In-flight requests are never aborted; a
//! stale response is simply discarded when it returns. Only the pending
//! debounce timer itself is abortable.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

// =============================================================================
// GENERATIONS
// =============================================================================

/// Monotonically increasing trigger counter. A task captures the value at
/// schedule time and checks it again before writing results back.
#[derive(Debug, Default)]
pub struct Generation {
    counter: AtomicU64,
}

impl Generation {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Bump and return the new generation
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// True if no newer trigger was issued since `generation` was captured
    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }

    /// Invalidate everything in flight without scheduling new work
    pub fn invalidate(&self) {
        self.next();
    }
}

// =============================================================================
// DEBOUNCER
// =============================================================================

/// Trailing-edge debounce timer. Each `call` aborts the pending timer (if
/// any) and arms a fresh one, so only the last trigger inside the window
/// actually runs.
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
        }
    }

    /// Arm the timer with `future`, replacing any pending timer. The future
    /// itself starts only after the full window elapses undisturbed.
    pub fn call<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // once the window has elapsed the work is detached: a later
            // trigger can only outrun it at the generation gate, not
            // abort it mid-flight
            tokio::spawn(future);
        });
        let previous = {
            let mut pending = match self.pending.lock() {
                Ok(pending) => pending,
                Err(poisoned) => poisoned.into_inner(),
            };
            pending.replace(handle)
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Drop the pending timer without running it
    pub fn cancel(&self) {
        let previous = {
            let mut pending = match self.pending.lock() {
                Ok(pending) => pending,
                Err(poisoned) => poisoned.into_inner(),
            };
            pending.take()
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    pub fn window(&self) -> Duration {
        self.window
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
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn generations_are_monotonic() {
        let generation = Generation::new();
        let first = generation.next();
        let second = generation.next();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
        generation.invalidate();
        assert!(!generation.is_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_triggers_collapse_to_one_run() {
        let debouncer = Debouncer::new(Duration::from_millis(350));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let runs = runs.clone();
            debouncer.call(async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn later_trigger_replaces_earlier_one() {
        let debouncer = Debouncer::new(Duration::from_millis(350));
        let last_fired = Arc::new(AtomicUsize::new(0));

        let marker = last_fired.clone();
        debouncer.call(async move {
            marker.store(1, Ordering::SeqCst);
        });

        // second trigger lands inside the window of the first
        tokio::time::sleep(Duration::from_millis(100)).await;
        let marker = last_fired.clone();
        debouncer.call(async move {
            marker.store(2, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(last_fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_after_window_runs_independently() {
        let debouncer = Debouncer::new(Duration::from_millis(350));
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        debouncer.call(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(400)).await;

        let counter = runs.clone();
        debouncer.call(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn work_already_started_is_not_aborted_by_a_later_trigger() {
        let debouncer = Debouncer::new(Duration::from_millis(350));
        let runs = Arc::new(AtomicUsize::new(0));

        // slow fetch: still in flight when the next trigger arrives
        let counter = runs.clone();
        debouncer.call(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(400)).await;

        let counter = runs.clone();
        debouncer.call(async move {
            counter.fetch_add(10, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(500)).await;

        // both ran to completion; nothing was cut off mid-flight
        assert_eq!(runs.load(Ordering::SeqCst), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_timer() {
        let debouncer = Debouncer::new(Duration::from_millis(350));
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        debouncer.call(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
