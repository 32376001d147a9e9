//! Leveled diagnostic sink injected into the registry, detector and parse
//! sessions. Nothing in the parsing framework writes to a global logger
//! directly; it reports through whatever sink the caller hands in.

use std::sync::Mutex;

pub use tracing::Level;

pub trait Diagnostics: Send + Sync {
    fn event(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.event(Level::DEBUG, message);
    }

    fn info(&self, message: &str) {
        self.event(Level::INFO, message);
    }

    fn warn(&self, message: &str) {
        self.event(Level::WARN, message);
    }

    fn error(&self, message: &str) {
        self.event(Level::ERROR, message);
    }
}

/// Forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl Diagnostics for TracingSink {
    fn event(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "tally", "{message}"),
            Level::WARN => tracing::warn!(target: "tally", "{message}"),
            Level::INFO => tracing::info!(target: "tally", "{message}"),
            Level::DEBUG => tracing::debug!(target: "tally", "{message}"),
            _ => tracing::trace!(target: "tally", "{message}"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl Diagnostics for NullSink {
    fn event(&self, _level: Level, _message: &str) {}
}

/// Keeps events in memory so callers (mostly tests) can inspect them.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Level, String)> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.events().iter().filter(|(l, _)| *l == level).count()
    }

    /// True if an event at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.events()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl Diagnostics for MemorySink {
    fn event(&self, level: Level, message: &str) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((level, message.to_string()));
    }
}
