//! One-shot readiness notification.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;

/// A one-shot notification fired when a context stops being active.
///
/// Cloning is cheap and every clone observes the same notification. Any
/// number of tasks may [`wait`](Self::wait) concurrently; all of them are
/// released when the owning context closes it.
#[derive(Clone)]
pub struct Done {
    inner: Arc<Inner>,
}

struct Inner {
    closed: AtomicBool,
    notify: Notify,
}

impl Done {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                closed: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Returns the shared, already-closed notification.
    ///
    /// Contexts hand this out when they are canceled before anyone asked for
    /// their notification, so no unclosed handle is ever allocated for them.
    #[must_use]
    pub fn closed() -> Self {
        static CLOSED: OnceLock<Done> = OnceLock::new();
        CLOSED
            .get_or_init(|| {
                let done = Self::new();
                done.close();
                done
            })
            .clone()
    }

    /// Returns the shared notification that never fires.
    ///
    /// Contexts that can never be canceled return it, which lets derived
    /// contexts skip watching them.
    #[must_use]
    pub fn never() -> Self {
        static NEVER: OnceLock<Done> = OnceLock::new();
        NEVER.get_or_init(Self::new).clone()
    }

    /// Returns true if this is the [`never`](Self::never) notification.
    #[must_use]
    pub fn is_never(&self) -> bool {
        Self::same(self, &Self::never())
    }

    /// Fires the notification. Returns false if it had already fired.
    pub(crate) fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// Returns true once the notification has fired.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Waits until the notification fires. Completes immediately if it already has.
    ///
    /// The returned future owns its handle, so `ctx.done().wait()` can be
    /// stored in a `select!` arm directly.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let inner = self.inner.clone();
        async move {
            // Registered for `notify_waiters` from creation, before the flag check.
            let notified = inner.notify.notified();
            if inner.closed.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Returns true if both handles refer to the same notification.
    #[must_use]
    pub fn same(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_new_is_open() {
        let done = Done::new();
        assert!(!done.is_closed());

        let mut wait = task::spawn(done.wait());
        assert_pending!(wait.poll());
    }

    #[test]
    fn test_close_wakes_waiter() {
        let done = Done::new();
        let mut wait = task::spawn(done.wait());
        assert_pending!(wait.poll());

        assert!(done.close());

        assert!(wait.is_woken());
        assert_ready!(wait.poll());
    }

    #[test]
    fn test_close_once() {
        let done = Done::new();
        assert!(done.close());
        assert!(!done.close());
        assert!(done.is_closed());
    }

    #[test]
    fn test_closed_sentinel_is_shared() {
        let a = Done::closed();
        let b = Done::closed();
        assert!(a.is_closed());
        assert!(Done::same(&a, &b));

        let mut wait = task::spawn(a.wait());
        assert_ready!(wait.poll());
    }

    #[test]
    fn test_clones_share_state() {
        let done = Done::new();
        let clone = done.clone();
        assert!(Done::same(&done, &clone));
        assert!(!Done::same(&done, &Done::new()));

        done.close();
        assert!(clone.is_closed());
    }

    #[test]
    fn test_never_is_shared_and_open() {
        let never = Done::never();
        assert!(never.is_never());
        assert!(Done::same(&never, &Done::never()));
        assert!(!never.is_closed());
        assert!(!Done::new().is_never());
        assert!(!Done::closed().is_never());

        let mut wait = task::spawn(never.wait());
        assert_pending!(wait.poll());
    }

    #[tokio::test]
    async fn test_many_waiters_released() {
        let done = Done::new();
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let done = done.clone();
                tokio::spawn(async move { done.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        done.close();

        for waiter in futures::future::join_all(waiters).await {
            assert!(waiter.is_ok());
        }
    }
}
