//! Client debug messages of one unit of work.
//!
//! The test endpoints answer with everything the client reported while
//! handling the request, so each scope keeps its own copy next to the
//! regular `tracing` output.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Severity of a debug message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    /// Detail.
    Debug,
    /// Progress.
    Info,
    /// Something was dropped.
    Warning,
    /// Something failed.
    Error,
}

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugEntry {
    /// Severity.
    pub level: DebugLevel,
    /// Message text.
    pub message: String,
}

/// Shared, append-only list of debug messages.
///
/// Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct DebugLog {
    entries: Arc<RwLock<Vec<DebugEntry>>>,
}

impl DebugLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message and forwards it to `tracing`.
    pub fn record(&self, level: DebugLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            DebugLevel::Debug => tracing::debug!(target: "raven", "{message}"),
            DebugLevel::Info => tracing::info!(target: "raven", "{message}"),
            DebugLevel::Warning => tracing::warn!(target: "raven", "{message}"),
            DebugLevel::Error => tracing::error!(target: "raven", "{message}"),
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.push(DebugEntry { level, message });
        }
    }

    /// Returns the messages recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<DebugEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let log = DebugLog::new();
        let clone = log.clone();
        clone.record(DebugLevel::Info, "Sending event");
        log.record(DebugLevel::Warning, "Dropped event");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "Sending event");
        assert_eq!(entries[1].level, DebugLevel::Warning);
    }

    #[test]
    fn test_entry_serialization() {
        let entry = DebugEntry {
            level: DebugLevel::Error,
            message: "Transport failed".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({"level": "error", "message": "Transport failed"})
        );
    }
}
