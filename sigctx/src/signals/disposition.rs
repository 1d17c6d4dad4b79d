//! Process-wide default disposition of subscribed signals.
//!
//! Tokio keeps its handler installed for the life of the process, which on
//! its own would swallow every later occurrence of a signal nobody listens
//! for any more. Each signal therefore also carries a conditional
//! default-action handler, armed whenever its subscriber count drops to zero
//! and disarmed while at least one subscription is live.

use super::Signal;
use crate::errors::SignalError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

struct Entry {
    subscribers: usize,
    /// When set, the signal runs its default action.
    restore_default: Arc<AtomicBool>,
}

fn table() -> &'static Mutex<HashMap<Signal, Entry>> {
    static TABLE: OnceLock<Mutex<HashMap<Signal, Entry>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Keeps the default action of its signals suppressed until dropped.
#[derive(Debug)]
pub(crate) struct Hold {
    signals: Vec<Signal>,
}

/// Counts one more subscriber for each of `signals`.
///
/// On failure, the signals acquired so far are released again.
pub(crate) fn hold(signals: &[Signal]) -> Result<Hold, SignalError> {
    let mut held = Hold {
        signals: Vec::with_capacity(signals.len()),
    };
    for &signal in signals {
        acquire(signal)?;
        held.signals.push(signal);
    }
    Ok(held)
}

impl Drop for Hold {
    fn drop(&mut self) {
        for &signal in &self.signals {
            release(signal);
        }
    }
}

fn acquire(signal: Signal) -> Result<(), SignalError> {
    let mut table = table().lock();
    if let Some(entry) = table.get_mut(&signal) {
        entry.subscribers += 1;
        entry.restore_default.store(false, Ordering::SeqCst);
        return Ok(());
    }

    let restore_default = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register_conditional_default(signal.raw(), restore_default.clone())
        .map_err(|source| SignalError::Register { signal, source })?;
    table.insert(
        signal,
        Entry {
            subscribers: 1,
            restore_default,
        },
    );
    Ok(())
}

fn release(signal: Signal) {
    let mut table = table().lock();
    let Some(entry) = table.get_mut(&signal) else {
        return;
    };
    entry.subscribers = entry.subscribers.saturating_sub(1);
    if entry.subscribers == 0 {
        entry.restore_default.store(true, Ordering::SeqCst);
        debug!(%signal, "no subscribers left, default action restored");
    }
}

/// Returns the number of live subscriptions to `signal`.
#[cfg(test)]
pub(crate) fn subscribers(signal: Signal) -> usize {
    table().lock().get(&signal).map_or(0, |entry| entry.subscribers)
}

/// Returns true if `signal` currently runs its default action.
#[cfg(test)]
pub(crate) fn restores_default(signal: Signal) -> bool {
    table()
        .lock()
        .get(&signal)
        .map_or(true, |entry| entry.restore_default.load(Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;

    // SIGCHLD is ignored by default, so arming it here is harmless; no other
    // unit test subscribes to it.
    #[test]
    fn test_default_restored_after_last_hold() {
        let signal = Signal::Child;
        assert_eq!(subscribers(signal), 0);
        assert!(restores_default(signal));

        let first = hold(&[signal]).unwrap();
        let second = hold(&[signal]).unwrap();
        assert_eq!(subscribers(signal), 2);
        assert!(!restores_default(signal));

        drop(first);
        assert_eq!(subscribers(signal), 1);
        assert!(!restores_default(signal));

        drop(second);
        assert_eq!(subscribers(signal), 0);
        assert!(restores_default(signal));

        // Subscribing again disarms the default action.
        let third = hold(&[signal]).unwrap();
        assert!(!restores_default(signal));
        drop(third);
        assert!(restores_default(signal));
    }
}
