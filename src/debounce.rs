//! Trailing-edge debounce
//!
//! Every trigger pushes the deadline out by the configured delay. One timer
//! task per window waits until the deadline stops moving and then runs the
//! action of the first trigger in that window. All callers of the window get
//! the same shared completion to await.

use std::{sync::Arc, time::Duration};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Completion of one debounce window; resolves after the action ran or the
/// window was cancelled
pub type Debounced = Shared<BoxFuture<'static, ()>>;

pub struct Debouncer {
    delay: Duration,
    window: Arc<Mutex<Window>>,
}

struct Window {
    deadline: Instant,
    pending: Option<Debounced>,
    cancel: CancellationToken,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            window: Arc::new(Mutex::new(Window {
                deadline: Instant::now(),
                pending: None,
                cancel: CancellationToken::new(),
            })),
        }
    }

    /// Restart the timer, scheduling `action` if no window is open
    ///
    /// Must be called from within a tokio runtime. When a window is already
    /// open, `action` is dropped and the open window's completion returned.
    pub fn trigger<F, Fut>(&self, action: F) -> Debounced
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut window = self.window.lock();
        window.deadline = Instant::now() + self.delay;
        if let Some(pending) = &window.pending {
            return pending.clone();
        }

        let shared_window = Arc::clone(&self.window);
        let cancel = window.cancel.clone();
        let fire = async move {
            loop {
                let deadline = shared_window.lock().deadline;
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep_until(deadline) => {}
                }

                let mut window = shared_window.lock();
                if cancel.is_cancelled() {
                    return;
                }
                if window.deadline <= Instant::now() {
                    window.pending = None;
                    break;
                }
            }
            action().await;
        }
        .boxed()
        .shared();

        window.pending = Some(fire.clone());
        drop(window);

        tokio::spawn(fire.clone());
        fire
    }

    /// Drop the open window, if any, without running its action
    pub fn cancel(&self) {
        let mut window = self.window.lock();
        window.cancel.cancel();
        window.cancel = CancellationToken::new();
        window.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.window.lock().pending.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.window.lock().cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    fn counting_action(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> BoxFuture<'static, ()> {
        let counter = Arc::clone(counter);
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_triggers_run_once() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicUsize::new(0));

        let mut completions = Vec::new();
        for _ in 0..5 {
            completions.push(debouncer.trigger(counting_action(&counter)));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending());

        futures::future::join_all(completions).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_resets_on_each_trigger() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicUsize::new(0));

        let start = Instant::now();
        let first = debouncer.trigger(counting_action(&counter));
        tokio::time::sleep(Duration::from_millis(80)).await;
        let second = debouncer.trigger(counting_action(&counter));
        first.await;
        second.await;

        assert!(start.elapsed() >= Duration::from_millis(180));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_run_separately() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicUsize::new(0));

        debouncer.trigger(counting_action(&counter)).await;
        debouncer.trigger(counting_action(&counter)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_skips_action() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicUsize::new(0));

        let pending = debouncer.trigger(counting_action(&counter));
        debouncer.cancel();
        pending.await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!debouncer.is_pending());
    }
}
