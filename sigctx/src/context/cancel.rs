//! Cancelable contexts derived from a parent.

use super::{Context, ContextRef, Done, Value};
use crate::errors::ContextError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// A context canceled by its [`CancelFunc`], by its parent, or by its deadline.
///
/// Cancellation is idempotent: only the first cause is kept.
pub struct CancelContext {
    /// The context this one was derived from.
    parent: ContextRef,
    /// Own deadline, when earlier than the parent's.
    deadline: Option<Instant>,
    /// Fired together with `err` being set.
    done: Done,
    /// The terminal cause (first one wins).
    err: Mutex<Option<ContextError>>,
    /// Fired when this context is dropped; releases its watcher tasks.
    dropped: Done,
}

impl CancelContext {
    /// Creates a child of `parent` and links its cancellation to the parent's.
    pub(crate) fn derive(parent: ContextRef, deadline: Option<Instant>) -> Arc<Self> {
        let ctx = Arc::new(Self {
            parent,
            deadline,
            done: Done::new(),
            err: Mutex::new(None),
            dropped: Done::new(),
        });
        ctx.propagate();
        ctx
    }

    fn propagate(self: &Arc<Self>) {
        // An already finished parent cancels the child before it is returned.
        if let Some(err) = self.parent.err() {
            self.cancel(err);
            return;
        }

        let parent_done = self.parent.done();
        if parent_done.is_never() {
            return;
        }

        let parent = self.parent.clone();
        let child = Arc::downgrade(self);
        let child_done = self.done.clone();
        let child_dropped = self.dropped.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = child_done.wait() => {}
                () = child_dropped.wait() => {}
                () = parent_done.wait() => {
                    if let Some(child) = child.upgrade() {
                        child.cancel(parent.err().unwrap_or(ContextError::Canceled));
                    }
                }
            }
        });
    }

    /// Records `err` and fires the notification. Returns false if already canceled.
    pub(crate) fn cancel(&self, err: ContextError) -> bool {
        let mut slot = self.err.lock();
        if slot.is_some() {
            return false;
        }
        debug!(context = %self, cause = %err, "context canceled");
        *slot = Some(err);
        self.done.close();
        true
    }

    /// Returns the context this one was derived from.
    #[must_use]
    pub fn parent(&self) -> &ContextRef {
        &self.parent
    }

    /// Returns the notification fired when this context is dropped.
    pub(crate) fn dropped(&self) -> Done {
        self.dropped.clone()
    }
}

impl Drop for CancelContext {
    fn drop(&mut self) {
        self.dropped.close();
    }
}

impl Context for CancelContext {
    fn done(&self) -> Done {
        self.done.clone()
    }

    fn err(&self) -> Option<ContextError> {
        self.err.lock().clone()
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline.or_else(|| self.parent.deadline())
    }

    fn value(&self, key: &str) -> Option<Value> {
        self.parent.value(key)
    }
}

impl fmt::Debug for CancelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelContext")
            .field("parent", &self.parent)
            .field("deadline", &self.deadline)
            .field("err", &*self.err.lock())
            .finish()
    }
}

impl fmt::Display for CancelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.deadline {
            Some(deadline) => write!(f, "{}.WithDeadline({deadline:?})", self.parent),
            None => write!(f, "{}.WithCancel", self.parent),
        }
    }
}

/// Cancels the [`CancelContext`] it was returned with.
///
/// Clones cancel the same context. Calling it more than once, from any
/// number of tasks, is a no-op after the first call.
#[derive(Clone)]
pub struct CancelFunc {
    ctx: Arc<CancelContext>,
}

impl CancelFunc {
    pub(crate) fn new(ctx: Arc<CancelContext>) -> Self {
        Self { ctx }
    }

    /// Cancels the context with [`ContextError::Canceled`].
    pub fn cancel(&self) {
        self.ctx.cancel(ContextError::Canceled);
    }

    /// Cancels the context with a caller-supplied cause.
    pub fn cancel_with_cause(&self, cause: ContextError) {
        self.ctx.cancel(cause);
    }
}

impl fmt::Debug for CancelFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelFunc")
            .field("context", &self.ctx.to_string())
            .finish()
    }
}

/// Derives a context canceled when `parent` is, or when the returned
/// [`CancelFunc`] is called, whichever happens first.
///
/// If `parent` is already canceled the child is canceled with the parent's
/// error before this returns.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime while `parent` can still be
/// canceled.
pub fn with_cancel(parent: ContextRef) -> (Arc<CancelContext>, CancelFunc) {
    let ctx = CancelContext::derive(parent, None);
    (ctx.clone(), CancelFunc::new(ctx))
}
