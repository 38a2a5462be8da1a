//! Suppression filters.
//!
//! The error event path and the structured logs path are filtered
//! independently. On the event path an ignored channel, an ignored message
//! or a disabled level each suppress the event on their own.

use crate::config::Settings;
use crate::models::{Level, LevelSet};

/// Decides which log records reach the collector.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    log_levels: LevelSet,
    logs_log_levels: LevelSet,
    ignored_channels: Vec<String>,
    ignored_messages: Vec<String>,
}

impl EventFilter {
    /// Builds the filter from settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            log_levels: settings.log_levels.clone(),
            logs_log_levels: settings.logs_log_levels.clone(),
            ignored_channels: settings.ignored_channels.clone(),
            ignored_messages: settings.ignored_messages.clone(),
        }
    }

    /// Returns true if a record should become an error event.
    ///
    /// `template` is the unformatted message as logged.
    #[must_use]
    pub fn should_capture_event(&self, level: Level, channel: Option<&str>, template: &str) -> bool {
        let ignored_channel = channel.is_some_and(|c| self.ignored_channels.iter().any(|i| i == c));
        let ignored_message = self.ignored_messages.iter().any(|m| m == template);
        !(ignored_channel || ignored_message || !level.is_enabled(&self.log_levels))
    }

    /// Returns true if a record should be sent as a structured log item.
    ///
    /// Ignore lists do not apply here.
    #[must_use]
    pub fn should_capture_log(&self, level: Level) -> bool {
        level.is_enabled(&self.logs_log_levels)
    }
}
