//! Error types for sigctx.
//!
//! Two families live here:
//! - [`ContextError`]: the terminal cause recorded by a context once it stops
//!   being active. These are values, not failures of the library itself.
//! - [`SignalError`]: failures while subscribing a context to OS signals.

use crate::signals::Signal;
use std::sync::Arc;
use thiserror::Error;

/// The reason a context stopped being active.
///
/// A context reports `None` from [`Context::err`](crate::context::Context::err)
/// while active and exactly one of these values afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ContextError {
    /// The context was canceled through its cancel function.
    #[error("context canceled")]
    Canceled,

    /// The context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A subscribed OS signal was delivered before the parent finished.
    #[error("signal received")]
    SignalReceived,

    /// A caller-supplied cause.
    #[error("{0}")]
    Cause(Arc<str>),
}

/// The distinguished error reported by every signal-canceled context.
pub const SIGNAL_RECEIVED: ContextError = ContextError::SignalReceived;

impl ContextError {
    /// Creates a caller-supplied cause.
    #[must_use]
    pub fn cause(message: impl Into<String>) -> Self {
        Self::Cause(Arc::from(message.into()))
    }

    /// Returns true if the context was canceled by a signal.
    #[must_use]
    pub fn is_signal_received(&self) -> bool {
        matches!(self, Self::SignalReceived)
    }

    /// Returns true if the context ran past its deadline.
    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }
}

/// Errors raised while subscribing a context to OS signals.
#[derive(Debug, Error)]
pub enum SignalError {
    /// No signals were given.
    #[error("no signals given to subscribe to")]
    EmptySignalSet,

    /// The signal cannot be observed on this platform.
    #[error("signal {0} is not supported on this platform")]
    Unsupported(Signal),

    /// A signal name could not be parsed.
    #[error("unknown signal name: {0:?}")]
    UnknownSignal(String),

    /// The OS refused to install a handler.
    #[error("failed to register handler for {signal}: {source}")]
    Register {
        /// The signal being registered.
        signal: Signal,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Subscription was attempted outside a Tokio runtime.
    #[error("signal subscription requires a running Tokio runtime")]
    NoRuntime,
}
