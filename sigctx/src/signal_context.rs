//! Contexts canceled by OS signals.
//!
//! A [`SignalContext`] is canceled by whichever happens first: its parent
//! finishing (including an explicit call to the returned [`CancelFunc`]), or
//! delivery of one of its subscribed signals. Either way the signal
//! subscription is revoked exactly once, together with recording the
//! terminal error.

use crate::context::{with_cancel, CancelContext, CancelFunc, Context, ContextRef, Done, Value};
use crate::errors::{ContextError, SignalError, SIGNAL_RECEIVED};
use crate::signals::{OsDispatcher, Registration, Signal, SignalDispatcher, SignalSet};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

/// A context canceled by its parent or by a subscribed signal.
///
/// `err()` reports the parent's error verbatim if the parent finished first,
/// or [`ContextError::SignalReceived`] if a signal arrived first. Deadline and
/// value queries pass through to the parent.
///
/// The watcher task keeps the context alive until it is canceled, so dropping
/// every handle does not release the signal subscription: cancel the context
/// or its parent to do that.
pub struct SignalContext {
    /// Derived from the caller's parent; canceled on the signal path too.
    parent: Arc<CancelContext>,
    /// Fixed at creation.
    signals: SignalSet,
    /// Cancels `parent`.
    ctx_cancel: CancelFunc,
    state: Mutex<State>,
}

/// Everything shared between the accessors and the watcher.
#[derive(Default)]
struct State {
    /// Allocated on first `done()` call, or set to the closed sentinel on cancel.
    done: Option<Done>,
    /// Terminal error; set once.
    err: Option<ContextError>,
    /// Taken and revoked on cancel.
    registration: Option<Registration>,
}

impl SignalContext {
    /// Starts building a signal context derived from `parent`.
    pub fn builder(parent: ContextRef) -> SignalContextBuilder {
        SignalContextBuilder::new(parent)
    }

    /// Returns the signals this context listens for.
    #[must_use]
    pub fn signals(&self) -> &SignalSet {
        &self.signals
    }

    /// Returns the intermediate context derived from the caller's parent.
    ///
    /// This is the context canceled by the returned [`CancelFunc`], and also
    /// canceled when a signal arrives.
    #[must_use]
    pub fn parent(&self) -> &Arc<CancelContext> {
        &self.parent
    }

    /// Returns true while the signal subscription is active.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state
            .lock()
            .registration
            .as_ref()
            .is_some_and(Registration::is_active)
    }

    /// Waits for the first of parent completion or signal delivery, then cancels.
    async fn watch(self: Arc<Self>, mut receiver: mpsc::Receiver<Signal>) {
        let parent_done = self.parent.done();
        tokio::select! {
            biased;
            () = parent_done.wait() => {
                self.cancel(self.parent.err());
            }
            Some(signal) = receiver.recv() => {
                info!(%signal, context = %self, "signal received, canceling context");
                self.ctx_cancel.cancel();
                self.cancel(Some(SIGNAL_RECEIVED));
            }
        }
        // The subscription was revoked inside `cancel`, so nothing writes here any more.
        receiver.close();
    }

    /// Records the terminal error, fires `done` and revokes the subscription.
    ///
    /// Returns false without side effects if the context was already canceled.
    ///
    /// # Panics
    ///
    /// Panics if `err` is `None`: a canceled context must have a cause.
    fn cancel(&self, err: Option<ContextError>) -> bool {
        let Some(err) = err else {
            panic!("sigctx: internal error: missing cancel error");
        };

        let mut state = self.state.lock();
        if state.err.is_some() {
            return false;
        }
        debug!(context = %self, cause = %err, "signal context canceled");
        state.err = Some(err);
        // Nobody asked for `done` yet: hand out the shared closed sentinel instead.
        state.done.get_or_insert_with(Done::closed).close();
        if let Some(mut registration) = state.registration.take() {
            registration.revoke();
        }
        true
    }
}

impl Context for SignalContext {
    fn done(&self) -> Done {
        self.state.lock().done.get_or_insert_with(Done::new).clone()
    }

    fn err(&self) -> Option<ContextError> {
        self.state.lock().err.clone()
    }

    fn deadline(&self) -> Option<Instant> {
        self.parent.deadline()
    }

    fn value(&self, key: &str) -> Option<Value> {
        self.parent.value(key)
    }
}

impl fmt::Debug for SignalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SignalContext")
            .field("parent", &self.parent.to_string())
            .field("signals", &self.signals)
            .field("err", &state.err)
            .field("subscribed", &state.registration.is_some())
            .finish()
    }
}

impl fmt::Display for SignalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.WithCancelBySignal", self.parent)
    }
}

/// Builder for [`SignalContext`].
#[must_use]
pub struct SignalContextBuilder {
    parent: ContextRef,
    signals: SignalSet,
    dispatcher: Arc<dyn SignalDispatcher>,
}

impl SignalContextBuilder {
    /// Creates a builder with no signals and the OS dispatcher.
    pub fn new(parent: ContextRef) -> Self {
        Self {
            parent,
            signals: SignalSet::new(),
            dispatcher: Arc::new(OsDispatcher::new()),
        }
    }

    /// Adds one signal.
    pub fn signal(mut self, signal: Signal) -> Self {
        self.signals.insert(signal);
        self
    }

    /// Adds several signals, keeping their order.
    pub fn signals<I>(mut self, signals: I) -> Self
    where
        I: IntoIterator<Item = Signal>,
    {
        self.signals.extend(signals);
        self
    }

    /// Sets the dispatcher that delivers signals.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn SignalDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Subscribes to the signals and starts watching.
    ///
    /// Returns the context and the cancel function of its intermediate
    /// context. Calling that function cancels the signal context as if its
    /// parent had finished.
    pub fn build(self) -> Result<(Arc<SignalContext>, CancelFunc), SignalError> {
        if self.signals.is_empty() {
            return Err(SignalError::EmptySignalSet);
        }
        if Handle::try_current().is_err() {
            return Err(SignalError::NoRuntime);
        }

        let (parent, ctx_cancel) = with_cancel(self.parent);
        let (sender, receiver) = mpsc::channel(1);
        let registration = match self.dispatcher.subscribe(self.signals.as_slice(), sender) {
            Ok(registration) => registration,
            Err(err) => {
                ctx_cancel.cancel();
                return Err(err);
            }
        };
        debug!(signals = %self.signals, "context subscribed to signals");

        let ctx = Arc::new(SignalContext {
            parent,
            signals: self.signals,
            ctx_cancel: ctx_cancel.clone(),
            state: Mutex::new(State {
                registration: Some(registration),
                ..State::default()
            }),
        });
        tokio::spawn(ctx.clone().watch(receiver));

        Ok((ctx, ctx_cancel))
    }
}

/// Derives a context canceled by `parent` or by any of `signals`.
///
/// Returns the context and a [`CancelFunc`] that cancels it as if its parent
/// had finished.
///
/// # Panics
///
/// Panics if the signals cannot be subscribed to: the set is empty, there is
/// no Tokio runtime, or the OS refuses a handler. Running without the
/// promised cancellation trigger is not an option; use
/// [`try_with_cancel_by_signal`] to handle these cases.
pub fn with_cancel_by_signal<I>(parent: ContextRef, signals: I) -> (Arc<SignalContext>, CancelFunc)
where
    I: IntoIterator<Item = Signal>,
{
    match try_with_cancel_by_signal(parent, signals) {
        Ok(pair) => pair,
        Err(err) => panic!("sigctx: cannot subscribe to signals: {err}"),
    }
}

/// Fallible form of [`with_cancel_by_signal`].
pub fn try_with_cancel_by_signal<I>(
    parent: ContextRef,
    signals: I,
) -> Result<(Arc<SignalContext>, CancelFunc), SignalError>
where
    I: IntoIterator<Item = Signal>,
{
    SignalContext::builder(parent).signals(signals).build()
}
