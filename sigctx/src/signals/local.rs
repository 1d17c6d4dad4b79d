//! In-process signal dispatcher.

use super::{Registration, Signal, SignalDispatcher};
use crate::errors::SignalError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

/// A dispatcher whose signals are raised by the program itself.
///
/// Useful for tests and for embedders that receive termination requests
/// through some other channel (an admin endpoint, a supervisor pipe) and want
/// them to behave exactly like OS signals.
///
/// Clones share the same subscriber table.
#[derive(Debug, Clone, Default)]
pub struct LocalDispatcher {
    table: Arc<Mutex<Table>>,
}

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    subscribers: BTreeMap<u64, Subscriber>,
    /// Deliveries attempted against a channel whose receiver was already closed.
    closed_sends: usize,
}

#[derive(Debug)]
struct Subscriber {
    signals: Vec<Signal>,
    sender: mpsc::Sender<Signal>,
}

impl LocalDispatcher {
    /// Creates a dispatcher with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `signal` to every active subscription that listens for it.
    ///
    /// Returns the number of subscriptions it was delivered to.
    pub fn raise(&self, signal: Signal) -> usize {
        let mut table = self.table.lock();
        let mut delivered = 0;
        let mut closed = 0;
        for subscriber in table.subscribers.values() {
            if !subscriber.signals.contains(&signal) {
                continue;
            }
            match subscriber.sender.try_send(signal) {
                Ok(()) | Err(TrySendError::Full(_)) => delivered += 1,
                Err(TrySendError::Closed(_)) => closed += 1,
            }
        }
        table.closed_sends += closed;
        trace!(%signal, delivered, "raised local signal");
        delivered
    }

    /// Returns the number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.table.lock().subscribers.len()
    }

    /// Returns true if any active subscription listens for `signal`.
    #[must_use]
    pub fn is_subscribed(&self, signal: Signal) -> bool {
        self.table
            .lock()
            .subscribers
            .values()
            .any(|subscriber| subscriber.signals.contains(&signal))
    }

    /// Returns how many deliveries found their channel closed while still subscribed.
    #[must_use]
    pub fn closed_sends(&self) -> usize {
        self.table.lock().closed_sends
    }
}

impl SignalDispatcher for LocalDispatcher {
    fn subscribe(
        &self,
        signals: &[Signal],
        sender: mpsc::Sender<Signal>,
    ) -> Result<Registration, SignalError> {
        let id = {
            let mut table = self.table.lock();
            let id = table.next_id;
            table.next_id += 1;
            table.subscribers.insert(
                id,
                Subscriber {
                    signals: signals.to_vec(),
                    sender,
                },
            );
            id
        };

        let table = Arc::downgrade(&self.table);
        Ok(Registration::new(signals, move || {
            if let Some(table) = table.upgrade() {
                table.lock().subscribers.remove(&id);
            }
        }))
    }
}
