//! The context abstraction wrapped by signal contexts.
//!
//! This module provides:
//! - The [`Context`] trait: readiness notification, terminal error, deadline
//!   and value lookup
//! - [`background`], the root context that is never canceled
//! - Derived contexts: [`with_cancel`], [`with_deadline`], [`with_timeout`]
//!   and [`with_value`]

mod cancel;
mod deadline;
mod done;
mod value;

pub use cancel::{with_cancel, CancelContext, CancelFunc};
pub use deadline::{with_deadline, with_timeout};
pub use done::Done;
pub use value::{with_value, ValueContext};

use crate::errors::ContextError;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::time::Instant;

/// A value stored in a context.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Shared handle to any context.
pub type ContextRef = Arc<dyn Context>;

/// An environment that carries cancellation, a deadline and values.
///
/// Contexts nest: a derived context is canceled when its parent is, and
/// forwards deadline and value queries it does not answer itself.
pub trait Context: Send + Sync + fmt::Debug + fmt::Display {
    /// Returns the notification fired when this context is canceled.
    ///
    /// Repeated calls return the same notification.
    fn done(&self) -> Done;

    /// Returns `None` while active, then the terminal cause.
    ///
    /// Once [`done`](Self::done) has fired this is guaranteed to be `Some`.
    fn err(&self) -> Option<ContextError>;

    /// Returns the time at which this context will be canceled, if any.
    fn deadline(&self) -> Option<Instant>;

    /// Looks up a value by key.
    fn value(&self, key: &str) -> Option<Value>;
}

/// Looks up a value and downcasts it to `T`.
pub fn value_of<T>(ctx: &dyn Context, key: &str) -> Option<Arc<T>>
where
    T: Any + Send + Sync,
{
    ctx.value(key)?.downcast::<T>().ok()
}

/// Returns the root context: never canceled, no deadline, no values.
#[must_use]
pub fn background() -> ContextRef {
    static BACKGROUND: OnceLock<Arc<Background>> = OnceLock::new();
    BACKGROUND.get_or_init(|| Arc::new(Background)).clone()
}

struct Background;

impl Context for Background {
    fn done(&self) -> Done {
        Done::never()
    }

    fn err(&self) -> Option<ContextError> {
        None
    }

    fn deadline(&self) -> Option<Instant> {
        None
    }

    fn value(&self, _key: &str) -> Option<Value> {
        None
    }
}

impl fmt::Debug for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Background")
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("context.Background")
    }
}
