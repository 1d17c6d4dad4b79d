//! Signal subscription and the OS-backed dispatcher.

use super::Signal;
use crate::errors::SignalError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Delivers signals into a context's channel.
///
/// The signal-to-subscriber table behind an implementation is process-wide
/// shared state; contexts only ever touch it through the [`Registration`]
/// returned here.
pub trait SignalDispatcher: Send + Sync + fmt::Debug {
    /// Starts forwarding every occurrence of `signals` into `sender`.
    ///
    /// Forwarding must stop before [`Registration::revoke`] returns.
    fn subscribe(
        &self,
        signals: &[Signal],
        sender: mpsc::Sender<Signal>,
    ) -> Result<Registration, SignalError>;
}

/// Capability to detach one subscription from its dispatcher.
///
/// Revocation runs at most once: explicitly through [`revoke`](Self::revoke)
/// or when the registration is dropped.
pub struct Registration {
    /// The signals covered by this subscription.
    signals: Vec<Signal>,
    /// Detach routine, taken on first revocation.
    revoke: Option<Box<dyn FnOnce() + Send>>,
}

impl Registration {
    /// Creates a registration that runs `revoke` when revoked.
    pub fn new<F>(signals: &[Signal], revoke: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            signals: signals.to_vec(),
            revoke: Some(Box::new(revoke)),
        }
    }

    /// Returns the signals covered by this subscription.
    #[must_use]
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Returns true until the subscription is revoked.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.revoke.is_some()
    }

    /// Detaches the subscription. Later calls do nothing.
    pub fn revoke(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke();
            debug!(signals = ?self.signals, "signal subscription revoked");
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.revoke();
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("signals", &self.signals)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Dispatcher backed by the process's real signal handlers via `tokio::signal`.
///
/// Each subscription gets one listener and one forwarding task per signal.
/// On Unix, once the last subscription to a signal is revoked that signal
/// takes its default action again, so a second Ctrl-C after the context was
/// canceled still terminates the process.
///
/// On non-Unix targets only [`Signal::Interrupt`] (Ctrl-C) is supported, and
/// its default handling is not restored after revocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsDispatcher;

impl OsDispatcher {
    /// Creates the dispatcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SignalDispatcher for OsDispatcher {
    fn subscribe(
        &self,
        signals: &[Signal],
        sender: mpsc::Sender<Signal>,
    ) -> Result<Registration, SignalError> {
        let runtime = Handle::try_current().map_err(|_| SignalError::NoRuntime)?;

        #[cfg(unix)]
        let hold = super::disposition::hold(signals)?;

        // Install every handler before forwarding anything, so a failure leaves nothing behind.
        let listeners = signals
            .iter()
            .map(|&signal| listen(signal).map(|listener| (signal, listener)))
            .collect::<Result<Vec<_>, _>>()?;

        let slot = Arc::new(Mutex::new(Some(sender)));
        let tasks: Vec<JoinHandle<()>> = listeners
            .into_iter()
            .map(|(signal, mut listener)| {
                let slot = slot.clone();
                runtime.spawn(async move {
                    while listener.recv().await.is_some() {
                        if !forward(&slot, signal) {
                            break;
                        }
                    }
                })
            })
            .collect();

        debug!(?signals, "installed OS signal listeners");
        Ok(Registration::new(signals, move || {
            // Emptying the slot under its lock is what stops forwarding; the
            // tasks are aborted only to release the listeners.
            slot.lock().take();
            for task in tasks {
                task.abort();
            }
            #[cfg(unix)]
            drop(hold);
        }))
    }
}

/// Forwards one occurrence. Returns false once the subscription is gone.
fn forward(slot: &Mutex<Option<mpsc::Sender<Signal>>>, signal: Signal) -> bool {
    let slot = slot.lock();
    let Some(sender) = slot.as_ref() else {
        return false;
    };
    match sender.try_send(signal) {
        Ok(()) => {
            trace!(%signal, "forwarded signal");
            true
        }
        // One pending occurrence is enough to cancel.
        Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Closed(_)) => {
            warn!(%signal, "signal channel closed before its subscription was revoked");
            false
        }
    }
}

#[cfg(unix)]
fn listen(signal: Signal) -> Result<tokio::signal::unix::Signal, SignalError> {
    tokio::signal::unix::signal(signal.kind())
        .map_err(|source| SignalError::Register { signal, source })
}

#[cfg(windows)]
fn listen(signal: Signal) -> Result<tokio::signal::windows::CtrlC, SignalError> {
    match signal {
        Signal::Interrupt => tokio::signal::windows::ctrl_c()
            .map_err(|source| SignalError::Register { signal, source }),
        other => Err(SignalError::Unsupported(other)),
    }
}
