//! Event builder.
//!
//! Turns a raw log record (level, message template, context) into a
//! [`TelemetryEvent`] for the error path or a [`LogItem`] for the logs path.
//! Building reads the clock and generates an id, nothing else.

pub mod html;
pub mod placeholders;

use crate::config::Settings;
use crate::models::{
    EventMessage, ExceptionInfo, Level, LogItem, Mechanism, RawLevel, RequestInfo, StackFrame,
    Stacktrace, TelemetryEvent, TraceId, UserContext,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Context key carrying a preformatted backtrace.
pub const BACKTRACE_KEY: &str = "@backtrace_string";

/// Request data keys whose values are masked.
const SENSITIVE_FIELDS: [&str; 1] = ["pass"];
const MASK: &str = "********";

/// The account that is logged in while the record is produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    /// User id.
    pub id: String,
    /// Email address.
    pub email: Option<String>,
    /// Account name.
    pub username: Option<String>,
}

/// Everything the host knows about a log record besides level and message.
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    /// Logger channel, e.g. `php` or `cron`.
    pub channel: Option<String>,
    /// When the record was produced; defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
    /// Id of the user the record is attributed to.
    pub uid: Option<String>,
    /// Client IP address.
    pub ip: Option<String>,
    /// URI of the request.
    pub request_uri: Option<String>,
    /// Referer of the request.
    pub referer: Option<String>,
    /// HTML link to the affected object.
    pub link: Option<String>,
    /// Placeholder values, keyed with their sigil (or bare for PSR-3).
    pub placeholders: BTreeMap<String, serde_json::Value>,
    /// Frames of the logging call, if the host captured them.
    pub backtrace: Option<Vec<StackFrame>>,
    /// Bound exception.
    pub exception: Option<ExceptionInfo>,
    /// Set by top-level error handlers that report a crash.
    pub uncaught: bool,
    /// The logged in account.
    pub account: Option<Account>,
    /// Request data.
    pub request: Option<RequestInfo>,
}

impl LogContext {
    /// Creates a context for `channel`.
    #[must_use]
    pub fn channel(channel: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            ..Self::default()
        }
    }

    /// Adds a placeholder value.
    #[must_use]
    pub fn with_placeholder(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.placeholders.insert(key.into(), value.into());
        self
    }

    /// Binds an exception.
    #[must_use]
    pub fn with_exception(mut self, exception: ExceptionInfo, uncaught: bool) -> Self {
        self.exception = Some(exception);
        self.uncaught = uncaught;
        self
    }
}

/// Decides whether a bound exception crashed the application.
pub trait UnhandledClassifier: Send + Sync + std::fmt::Debug {
    /// Returns true if `exception` should be reported as unhandled.
    fn is_unhandled(&self, exception: &ExceptionInfo, uncaught: bool) -> bool;
}

/// Default classifier.
///
/// An exception is unhandled when a top-level handler reported it and it
/// is not an HTTP exception with a status below 500.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopLevelClassifier;

impl UnhandledClassifier for TopLevelClassifier {
    fn is_unhandled(&self, exception: &ExceptionInfo, uncaught: bool) -> bool {
        uncaught && exception.http_status.is_none_or(|status| status >= 500)
    }
}

/// Builder switches taken from settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Send the client IP address.
    pub capture_user_ip: bool,
    /// Send email and account name.
    pub send_user_data: bool,
    /// Attach the logging call's frames.
    pub attach_stacktrace: bool,
    /// Keep frame variables.
    pub include_frame_vars: bool,
    /// Prefix for relative link targets on the logs path.
    pub base_url: Option<String>,
}

impl BuilderOptions {
    /// Reads the switches from settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            capture_user_ip: settings.capture_user_ip,
            send_user_data: settings.send_user_data,
            attach_stacktrace: settings.stack,
            include_frame_vars: settings.trace,
            base_url: None,
        }
    }
}

/// A log message with its placeholders resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Normalized level.
    pub level: Level,
    /// Message as logged, without the backtrace token.
    pub unformatted: String,
    /// Template without the backtrace token, PSR-3 tokens rewritten.
    pub template: String,
    /// Placeholder to value.
    pub placeholders: BTreeMap<String, String>,
    /// Template with placeholders substituted.
    pub formatted: String,
}

impl ParsedMessage {
    /// Parses a log message. Removes the backtrace placeholder from both the
    /// template and the context.
    pub fn parse(level: impl Into<RawLevel>, message: &str, context: &mut LogContext) -> Self {
        let raw: RawLevel = level.into();
        let level = Level::from(raw);
        let mut unformatted = message.to_string();
        if context.placeholders.remove(BACKTRACE_KEY).is_some() {
            unformatted = unformatted.replace(&format!(" {BACKTRACE_KEY}"), "");
        }

        let (template, placeholders) =
            placeholders::parse_placeholders(&unformatted, &context.placeholders);
        let formatted = placeholders::substitute(&template, &placeholders);
        Self {
            level,
            unformatted,
            template,
            placeholders,
            formatted,
        }
    }
}

/// Assembles events and log items from log records.
///
/// # Example
///
/// ```
/// use shared::builder::{EventBuilder, LogContext};
/// use shared::models::Level;
///
/// let builder = EventBuilder::default();
/// let context = LogContext::channel("php").with_placeholder("@name", "alice");
/// let event = builder.build(Level::Error, "Login failed for @name", context);
/// assert_eq!(event.message.formatted, "Login failed for alice");
/// assert_eq!(event.message.template, "Login failed for @name");
/// ```
#[derive(Debug, Clone)]
pub struct EventBuilder {
    options: BuilderOptions,
    classifier: Arc<dyn UnhandledClassifier>,
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new(BuilderOptions::default())
    }
}

impl EventBuilder {
    /// Creates a builder with the default classifier.
    #[must_use]
    pub fn new(options: BuilderOptions) -> Self {
        Self {
            options,
            classifier: Arc::new(TopLevelClassifier),
        }
    }

    /// Replaces the unhandled classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn UnhandledClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the prefix for relative link targets.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.options.base_url = Some(base_url.into());
        self
    }

    /// Returns the builder options.
    #[must_use]
    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Builds an event from a raw record.
    pub fn build(
        &self,
        level: impl Into<RawLevel>,
        message: &str,
        mut context: LogContext,
    ) -> TelemetryEvent {
        let parsed = ParsedMessage::parse(level, message, &mut context);
        self.build_event(&parsed, &context)
    }

    /// Builds an event from an already parsed message.
    #[must_use]
    pub fn build_event(&self, parsed: &ParsedMessage, context: &LogContext) -> TelemetryEvent {
        let mut event = TelemetryEvent::message(parsed.level, parsed.formatted.clone());
        event.message = EventMessage {
            template: parsed.template.clone(),
            params: parsed.placeholders.clone(),
            formatted: parsed.formatted.clone(),
        };
        if let Some(timestamp) = context.timestamp {
            event.timestamp = timestamp;
        }
        event.logger.clone_from(&context.channel);
        event.user = self.user(context);
        event.extra = extra(context);

        if self.options.attach_stacktrace {
            if let Some(frames) = &context.backtrace {
                event.stacktrace = Some(Stacktrace {
                    frames: self.scrub_frames(frames),
                });
            }
        }

        if let Some(exception) = &context.exception {
            let mut exception = exception.clone();
            if let Some(stacktrace) = &mut exception.stacktrace {
                stacktrace.frames = self.scrub_frames(&stacktrace.frames);
            }
            if self.classifier.is_unhandled(&exception, context.uncaught) {
                exception.mechanism = Some(Mechanism::unhandled());
            }
            event.exception = Some(exception);
        }

        event.request = context.request.clone().map(mask_request);
        event
    }

    /// Builds a structured log item for the logs path.
    #[must_use]
    pub fn build_log_item(
        &self,
        parsed: &ParsedMessage,
        context: &LogContext,
        trace_id: TraceId,
    ) -> LogItem {
        let mut item = LogItem::new(parsed.level.log_level(), parsed.formatted.clone(), trace_id);
        if let Some(timestamp) = context.timestamp {
            item.timestamp = timestamp;
        }
        if let Some(channel) = &context.channel {
            item = item.with_attribute("channel", channel);
        }
        if let Some(href) = context.link.as_deref().and_then(html::last_href) {
            let base = self.options.base_url.as_deref().unwrap_or_default();
            item = item.with_attribute("link", format!("{base}{href}"));
        }
        if let Some(referer) = context.referer.as_deref().filter(|r| !r.is_empty()) {
            item = item.with_attribute("referer", referer);
        }
        item = item.with_attribute("request_uri", &context.request_uri);
        if !parsed.placeholders.is_empty() {
            item = item.with_attribute("sentry.message.template", &parsed.template);
            for (key, value) in &parsed.placeholders {
                item = item.with_attribute(format!("sentry.message.parameter.{key}"), value);
            }
        }
        item = item.with_attribute("user.id", &context.uid);
        if self.options.capture_user_ip {
            item = item.with_attribute("user.ip_address", &context.ip);
        }
        item
    }

    fn user(&self, context: &LogContext) -> UserContext {
        let mut user = UserContext {
            id: context.uid.clone(),
            ..UserContext::default()
        };
        if self.options.capture_user_ip {
            user.ip_address = context.ip.clone().filter(|ip| !ip.is_empty());
        }
        if self.options.send_user_data {
            if let Some(account) = &context.account {
                if context.uid.as_deref() == Some(account.id.as_str()) {
                    user.email.clone_from(&account.email);
                    user.username.clone_from(&account.username);
                }
            }
        }
        user
    }

    fn scrub_frames(&self, frames: &[StackFrame]) -> Vec<StackFrame> {
        frames
            .iter()
            .cloned()
            .map(|mut frame| {
                if !self.options.include_frame_vars {
                    frame.vars.clear();
                }
                frame
            })
            .collect()
    }
}

fn extra(context: &LogContext) -> BTreeMap<String, serde_json::Value> {
    let mut extra = BTreeMap::new();
    extra.insert(
        "request_uri".to_string(),
        serde_json::json!(context.request_uri),
    );
    if let Some(referer) = context.referer.as_deref().filter(|r| !r.is_empty()) {
        extra.insert("referer".to_string(), serde_json::json!(referer));
    }
    if let Some(link) = context.link.as_deref().filter(|l| !l.is_empty()) {
        extra.insert("link".to_string(), serde_json::json!(html::to_text(link)));
    }
    extra
}

fn mask_request(mut request: RequestInfo) -> RequestInfo {
    for field in SENSITIVE_FIELDS {
        if let Some(value) = request.data.get_mut(field) {
            *value = serde_json::json!(MASK);
        }
    }
    request
}
