//! Contexts carrying a keyed value.

use super::{Context, ContextRef, Done, Value};
use crate::errors::ContextError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// A context that adds one key to its parent. Everything else passes through.
pub struct ValueContext {
    parent: ContextRef,
    key: String,
    value: Value,
}

impl Context for ValueContext {
    fn done(&self) -> Done {
        self.parent.done()
    }

    fn err(&self) -> Option<ContextError> {
        self.parent.err()
    }

    fn deadline(&self) -> Option<Instant> {
        self.parent.deadline()
    }

    fn value(&self, key: &str) -> Option<Value> {
        if key == self.key {
            Some(self.value.clone())
        } else {
            self.parent.value(key)
        }
    }
}

impl fmt::Debug for ValueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueContext")
            .field("parent", &self.parent)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ValueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.WithValue({})", self.parent, self.key)
    }
}

/// Derives a context in which `key` maps to `value`.
#[must_use]
pub fn with_value<T>(parent: ContextRef, key: impl Into<String>, value: T) -> Arc<ValueContext>
where
    T: Any + Send + Sync,
{
    Arc::new(ValueContext {
        parent,
        key: key.into(),
        value: Arc::new(value),
    })
}
