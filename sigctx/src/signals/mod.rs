//! OS signals and their delivery to contexts.
//!
//! This module provides:
//! - [`Signal`] and [`SignalSet`], the configurable set of signals a context
//!   listens for
//! - [`SignalDispatcher`], the seam between a context and whatever delivers
//!   signals, with its [`Registration`] token
//! - [`OsDispatcher`] backed by `tokio::signal`, and [`LocalDispatcher`] for
//!   signals routed in-process

mod dispatcher;
#[cfg(unix)]
mod disposition;
mod local;

pub use dispatcher::{OsDispatcher, Registration, SignalDispatcher};
pub use local::LocalDispatcher;

use crate::errors::SignalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An asynchronous signal the process can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Signal {
    /// `SIGHUP`: terminal hang-up, commonly used for reloads.
    Hangup,
    /// `SIGINT`: interrupt, sent by Ctrl-C.
    Interrupt,
    /// `SIGQUIT`: quit.
    Quit,
    /// `SIGTERM`: polite termination request.
    Terminate,
    /// `SIGUSR1`.
    User1,
    /// `SIGUSR2`.
    User2,
    /// `SIGALRM`.
    Alarm,
    /// `SIGCHLD`.
    Child,
    /// `SIGWINCH`.
    WindowChange,
}

impl Signal {
    /// Every supported signal.
    pub const ALL: [Self; 9] = [
        Self::Hangup,
        Self::Interrupt,
        Self::Quit,
        Self::Terminate,
        Self::User1,
        Self::User2,
        Self::Alarm,
        Self::Child,
        Self::WindowChange,
    ];

    /// Returns the conventional name, e.g. `SIGINT`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hangup => "SIGHUP",
            Self::Interrupt => "SIGINT",
            Self::Quit => "SIGQUIT",
            Self::Terminate => "SIGTERM",
            Self::User1 => "SIGUSR1",
            Self::User2 => "SIGUSR2",
            Self::Alarm => "SIGALRM",
            Self::Child => "SIGCHLD",
            Self::WindowChange => "SIGWINCH",
        }
    }

    #[cfg(unix)]
    pub(crate) fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Self::Hangup => SignalKind::hangup(),
            Self::Interrupt => SignalKind::interrupt(),
            Self::Quit => SignalKind::quit(),
            Self::Terminate => SignalKind::terminate(),
            Self::User1 => SignalKind::user_defined1(),
            Self::User2 => SignalKind::user_defined2(),
            Self::Alarm => SignalKind::alarm(),
            Self::Child => SignalKind::child(),
            Self::WindowChange => SignalKind::window_change(),
        }
    }

    #[cfg(unix)]
    pub(crate) fn raw(self) -> std::ffi::c_int {
        use signal_hook::consts::signal;

        match self {
            Self::Hangup => signal::SIGHUP,
            Self::Interrupt => signal::SIGINT,
            Self::Quit => signal::SIGQUIT,
            Self::Terminate => signal::SIGTERM,
            Self::User1 => signal::SIGUSR1,
            Self::User2 => signal::SIGUSR2,
            Self::Alarm => signal::SIGALRM,
            Self::Child => signal::SIGCHLD,
            Self::WindowChange => signal::SIGWINCH,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signal {
    type Err = SignalError;

    /// Accepts `SIGINT`, `INT` or `interrupt`, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let short = upper.strip_prefix("SIG").unwrap_or(upper.as_str());
        let signal = match short {
            "HUP" | "HANGUP" => Self::Hangup,
            "INT" | "INTERRUPT" => Self::Interrupt,
            "QUIT" => Self::Quit,
            "TERM" | "TERMINATE" => Self::Terminate,
            "USR1" | "USER1" => Self::User1,
            "USR2" | "USER2" => Self::User2,
            "ALRM" | "ALARM" => Self::Alarm,
            "CHLD" | "CHILD" => Self::Child,
            "WINCH" | "WINDOW_CHANGE" | "WINDOWCHANGE" => Self::WindowChange,
            _ => return Err(SignalError::UnknownSignal(s.to_string())),
        };
        Ok(signal)
    }
}

impl TryFrom<String> for Signal {
    type Error = SignalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signal> for String {
    fn from(signal: Signal) -> Self {
        signal.name().to_string()
    }
}

/// An ordered, duplicate-free set of signals.
///
/// Parses from a comma separated list (`"INT, TERM"`) and (de)serializes as a
/// list of names, so the set can come straight from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Signal>", into = "Vec<Signal>")]
pub struct SignalSet {
    signals: Vec<Signal>,
}

impl SignalSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            signals: Vec::new(),
        }
    }

    /// The usual shutdown signals: `SIGINT` and `SIGTERM`.
    #[must_use]
    pub fn shutdown() -> Self {
        Self::from([Signal::Interrupt, Signal::Terminate])
    }

    /// Adds a signal.
    #[must_use]
    pub fn with(mut self, signal: Signal) -> Self {
        self.insert(signal);
        self
    }

    /// Adds a signal. Returns false if it was already present.
    pub fn insert(&mut self, signal: Signal) -> bool {
        if self.contains(signal) {
            return false;
        }
        self.signals.push(signal);
        true
    }

    /// Returns true if the set contains `signal`.
    #[must_use]
    pub fn contains(&self, signal: Signal) -> bool {
        self.signals.contains(&signal)
    }

    /// Returns the number of signals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Returns the signals in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[Signal] {
        &self.signals
    }

    /// Iterates over the signals in insertion order.
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, Signal>> {
        self.signals.iter().copied()
    }
}

impl Default for SignalSet {
    fn default() -> Self {
        Self::shutdown()
    }
}

impl Extend<Signal> for SignalSet {
    fn extend<I: IntoIterator<Item = Signal>>(&mut self, iter: I) {
        for signal in iter {
            self.insert(signal);
        }
    }
}

impl FromIterator<Signal> for SignalSet {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl From<Vec<Signal>> for SignalSet {
    fn from(signals: Vec<Signal>) -> Self {
        signals.into_iter().collect()
    }
}

impl<const N: usize> From<[Signal; N]> for SignalSet {
    fn from(signals: [Signal; N]) -> Self {
        signals.into_iter().collect()
    }
}

impl From<SignalSet> for Vec<Signal> {
    fn from(set: SignalSet) -> Self {
        set.signals
    }
}

impl IntoIterator for SignalSet {
    type Item = Signal;
    type IntoIter = std::vec::IntoIter<Signal>;

    fn into_iter(self) -> Self::IntoIter {
        self.signals.into_iter()
    }
}

impl<'a> IntoIterator for &'a SignalSet {
    type Item = Signal;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Signal>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromStr for SignalSet {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, signal) in self.signals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(signal.name())?;
        }
        Ok(())
    }
}
