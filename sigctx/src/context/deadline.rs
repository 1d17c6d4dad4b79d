//! Contexts canceled at a point in time.

use super::{with_cancel, CancelContext, CancelFunc, Context, ContextRef};
use crate::errors::ContextError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Derives a context canceled with [`ContextError::DeadlineExceeded`] at `deadline`.
///
/// When the parent's deadline is already earlier the child simply inherits
/// it and behaves like [`with_cancel`].
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn with_deadline(parent: ContextRef, deadline: Instant) -> (Arc<CancelContext>, CancelFunc) {
    if parent.deadline().is_some_and(|current| current <= deadline) {
        return with_cancel(parent);
    }

    let ctx = CancelContext::derive(parent, Some(deadline));
    if ctx.err().is_none() {
        if deadline <= Instant::now() {
            ctx.cancel(ContextError::DeadlineExceeded);
        } else {
            let timer_ctx = Arc::downgrade(&ctx);
            let done = ctx.done();
            let dropped = ctx.dropped();
            tokio::spawn(async move {
                tokio::select! {
                    () = sleep_until(deadline) => {
                        if let Some(ctx) = timer_ctx.upgrade() {
                            ctx.cancel(ContextError::DeadlineExceeded);
                        }
                    }
                    () = done.wait() => {}
                    () = dropped.wait() => {}
                }
            });
        }
    }

    (ctx.clone(), CancelFunc::new(ctx))
}

/// Shorthand for `with_deadline(parent, Instant::now() + timeout)`.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn with_timeout(parent: ContextRef, timeout: Duration) -> (Arc<CancelContext>, CancelFunc) {
    with_deadline(parent, Instant::now() + timeout)
}
