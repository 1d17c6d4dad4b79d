//! # sigctx
//!
//! Cancellable contexts that are canceled when the process receives a signal.
//!
//! sigctx provides:
//!
//! - **Contexts**: a small context abstraction with parent/child
//!   cancellation, deadlines and values
//! - **Signal contexts**: a context canceled by whichever comes first, its
//!   parent finishing or one of a chosen set of OS signals arriving
//! - **Dispatchers**: real OS signals through `tokio::signal`, or signals
//!   raised in-process
//!
//! Long-running work observes one cancellation notification regardless of
//! where cancellation came from, and [`Context::err`] tells the two apart:
//! [`ContextError::SignalReceived`] means the process was asked to stop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sigctx::prelude::*;
//!
//! # async fn serve(_ctx: &dyn Context) {}
//! #[tokio::main]
//! async fn main() {
//!     let (ctx, cancel) =
//!         with_cancel_by_signal(background(), [Signal::Interrupt, Signal::Terminate]);
//!
//!     let done = ctx.done();
//!     tokio::select! {
//!         () = serve(&*ctx) => cancel.cancel(),
//!         () = done.wait() => {}
//!     }
//!
//!     match ctx.err() {
//!         Some(ContextError::SignalReceived) => println!("interrupted"),
//!         other => println!("finished: {other:?}"),
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod errors;
pub mod signal_context;
pub mod signals;

pub use context::{background, with_cancel, CancelFunc, Context, ContextRef, Done};
pub use errors::{ContextError, SignalError, SIGNAL_RECEIVED};
pub use signal_context::{
    try_with_cancel_by_signal, with_cancel_by_signal, SignalContext, SignalContextBuilder,
};
pub use signals::{Signal, SignalSet};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{
        background, value_of, with_cancel, with_deadline, with_timeout, with_value,
        CancelContext, CancelFunc, Context, ContextRef, Done, Value,
    };
    pub use crate::errors::{ContextError, SignalError, SIGNAL_RECEIVED};
    pub use crate::signal_context::{
        try_with_cancel_by_signal, with_cancel_by_signal, SignalContext, SignalContextBuilder,
    };
    pub use crate::signals::{
        LocalDispatcher, OsDispatcher, Registration, Signal, SignalDispatcher, SignalSet,
    };
}
