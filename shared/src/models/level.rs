//! Severity levels.
//!
//! Maps the various host representations of a log severity (RFC 5424
//! integers, PSR-3 names) onto one ordered [`Level`] and derives the
//! collector-side severities from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Log severity, ordered from least to most severe.
///
/// # Example
///
/// ```
/// use shared::models::Level;
///
/// assert!(Level::Debug < Level::Emergency);
/// assert_eq!(Level::from_raw("warning"), Level::Warning);
/// assert_eq!(Level::from_raw("no-such-level"), Level::Info);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Debug-level messages.
    Debug,
    /// Informational messages.
    #[default]
    Info,
    /// Normal but significant conditions.
    Notice,
    /// Warning conditions.
    Warning,
    /// Error conditions.
    Error,
    /// Critical conditions.
    Critical,
    /// Action must be taken immediately.
    Alert,
    /// System is unusable.
    Emergency,
}

/// A severity as handed over by the host, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawLevel {
    /// RFC 5424 numeric severity (0 = emergency, 7 = debug).
    Rfc(i64),
    /// PSR-3 style name such as `"warning"`.
    Name(String),
    /// Already normalized.
    Level(Level),
}

impl From<i64> for RawLevel {
    fn from(value: i64) -> Self {
        Self::Rfc(value)
    }
}

impl From<&str> for RawLevel {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for RawLevel {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<Level> for RawLevel {
    fn from(value: Level) -> Self {
        Self::Level(value)
    }
}

impl From<RawLevel> for Level {
    fn from(raw: RawLevel) -> Self {
        match raw {
            RawLevel::Rfc(value) => Self::from_rfc(value),
            RawLevel::Name(name) => Self::from_raw(&name),
            RawLevel::Level(level) => level,
        }
    }
}

impl Level {
    /// All levels, most severe first.
    pub const ALL: [Level; 8] = [
        Self::Emergency,
        Self::Alert,
        Self::Critical,
        Self::Error,
        Self::Warning,
        Self::Notice,
        Self::Info,
        Self::Debug,
    ];

    /// Maps an RFC 5424 severity. Out-of-range values map to [`Level::Info`].
    #[must_use]
    pub fn from_rfc(value: i64) -> Self {
        match value {
            0 => Self::Emergency,
            1 => Self::Alert,
            2 => Self::Critical,
            3 => Self::Error,
            4 => Self::Warning,
            5 => Self::Notice,
            7 => Self::Debug,
            _ => Self::Info,
        }
    }

    /// Maps a PSR-3 level name (case-insensitive). Unknown names map to
    /// [`Level::Info`].
    #[must_use]
    pub fn from_raw(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "emergency" => Self::Emergency,
            "alert" => Self::Alert,
            "critical" => Self::Critical,
            "error" => Self::Error,
            "warning" => Self::Warning,
            "notice" => Self::Notice,
            "debug" => Self::Debug,
            _ => Self::Info,
        }
    }

    /// Returns the PSR-3 name, used as key in level configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// Returns the RFC 5424 numeric severity.
    #[must_use]
    pub fn rfc(self) -> i64 {
        match self {
            Self::Emergency => 0,
            Self::Alert => 1,
            Self::Critical => 2,
            Self::Error => 3,
            Self::Warning => 4,
            Self::Notice => 5,
            Self::Info => 6,
            Self::Debug => 7,
        }
    }

    /// Returns the collector's event severity.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::Emergency | Self::Alert | Self::Critical => Severity::Fatal,
            Self::Error => Severity::Error,
            Self::Warning => Severity::Warning,
            Self::Notice | Self::Info => Severity::Info,
            Self::Debug => Severity::Debug,
        }
    }

    /// Returns the severity used for structured log items.
    #[must_use]
    pub fn log_level(self) -> LogLevel {
        match self {
            Self::Emergency | Self::Alert | Self::Critical => LogLevel::Fatal,
            Self::Error => LogLevel::Error,
            Self::Warning => LogLevel::Warn,
            Self::Notice | Self::Info => LogLevel::Info,
            Self::Debug => LogLevel::Debug,
        }
    }

    /// Returns true if this level is switched on in `levels`.
    #[must_use]
    pub fn is_enabled(self, levels: &LevelSet) -> bool {
        levels.contains(self)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity understood by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Debug.
    Debug,
    /// Info.
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
    /// Fatal.
    Fatal,
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Severity of a structured log item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace.
    Trace,
    /// Debug.
    Debug,
    /// Info.
    Info,
    /// Warn.
    Warn,
    /// Error.
    Error,
    /// Fatal.
    Fatal,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// The set of enabled levels, stored as PSR-3 name to flag.
///
/// Serialized as `{"error": true, "debug": false, ...}`; missing keys count
/// as disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelSet(BTreeMap<String, bool>);

impl LevelSet {
    /// Creates a set with no level enabled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a set with every level enabled.
    #[must_use]
    pub fn all() -> Self {
        Level::ALL.into_iter().collect()
    }

    /// Creates a set enabling `min` and everything more severe.
    #[must_use]
    pub fn at_least(min: Level) -> Self {
        Level::ALL.into_iter().filter(|l| *l >= min).collect()
    }

    /// Enables a level.
    pub fn enable(&mut self, level: Level) {
        self.0.insert(level.as_str().to_string(), true);
    }

    /// Returns true if `level` is enabled.
    #[must_use]
    pub fn contains(&self, level: Level) -> bool {
        self.0.get(level.as_str()).copied().unwrap_or(false)
    }

    /// Converts the legacy numeric configuration, where the key was the RFC
    /// severity plus one, to a level set.
    #[must_use]
    pub fn migrate_rfc(old: &BTreeMap<i64, i64>) -> Self {
        Level::ALL
            .into_iter()
            .filter(|level| old.get(&(level.rfc() + 1)).is_some_and(|v| *v != 0))
            .collect()
    }
}

impl FromIterator<Level> for LevelSet {
    fn from_iter<T: IntoIterator<Item = Level>>(iter: T) -> Self {
        let mut set = Self::none();
        for level in iter {
            set.enable(level);
        }
        set
    }
}
