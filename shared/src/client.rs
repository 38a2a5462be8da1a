//! Telemetry client and per-unit scope.
//!
//! A [`Client`] holds everything that is fixed for the process: settings,
//! DSN, builder, filters and the transport. It is shared behind an `Arc`.
//! Every request, command or job opens its own [`Scope`], which owns the
//! rate limiter, the trace context and the queue of captured items. Draining
//! a scope yields an [`Outbox`] that is sent asynchronously.

use crate::builder::{EventBuilder, BuilderOptions, LogContext, ParsedMessage, UnhandledClassifier};
use crate::config::{Settings, SettingsError};
use crate::debug_log::{DebugLevel, DebugLog};
use crate::dsn::{Dsn, DsnError};
use crate::envelope::{self, Envelope, EnvelopeError, EnvelopeItem, ReleaseInfo, CONTENT_TYPE};
use crate::filter::EventFilter;
use crate::models::{
    CheckIn, EventId, ExceptionInfo, Level, LogItem, LogLevel, RawLevel, Severity, SpanStatus,
    TelemetryEvent,
};
use crate::rate_limit::{Decision, RateLimitState, RATE_LIMIT_MESSAGE};
use crate::trace::{
    DynamicSamplingContext, FinishedTransaction, PropagationContext, PropagationTargets,
    SpanHandle, TraceContext, TraceError, TraceSettings, TransactionContext,
};
use crate::transport::{
    HttpTransport, HttpTransportConfig, OutboundRequest, Transport, TransportError,
    TransportResponse,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use url::Url;
use validator::Validate;

/// Client name sent to the collector.
pub const CLIENT_NAME: &str = concat!("raven-relay/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while creating a client or sending an envelope.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No DSN is configured; telemetry is disabled.
    #[error("No DSN configured")]
    MissingDsn,

    /// The configured DSN is malformed.
    #[error("Invalid DSN: {0}")]
    Dsn(#[from] DsnError),

    /// A setting is out of range.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The transport could not be built or the collector was unreachable.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An envelope could not be assembled.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// Process-wide telemetry client.
#[derive(Debug)]
pub struct Client {
    settings: Settings,
    dsn: Dsn,
    release: ReleaseInfo,
    builder: EventBuilder,
    filter: EventFilter,
    targets: PropagationTargets,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Creates a client delivering over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if no DSN is configured, a setting is invalid or the
    /// HTTP client cannot be built.
    pub fn try_new(settings: Settings) -> Result<Self, ClientError> {
        let dsn = settings.dsn()?.ok_or(ClientError::MissingDsn)?;
        let transport = HttpTransport::new(&HttpTransportConfig {
            timeout: settings.timeout(),
            proxy: settings.proxy.for_dsn(&dsn).map(ToString::to_string),
        })?;
        Self::with_transport(settings, Arc::new(transport))
    }

    /// Creates a client delivering through `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if no DSN is configured or a setting is invalid.
    pub fn with_transport(
        settings: Settings,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        settings.validate().map_err(SettingsError::from)?;
        let dsn = settings.dsn()?.ok_or(ClientError::MissingDsn)?;
        Ok(Self {
            release: ReleaseInfo {
                environment: settings.environment.clone(),
                release: settings.release.clone(),
            },
            builder: EventBuilder::new(BuilderOptions::from_settings(&settings)),
            filter: EventFilter::from_settings(&settings),
            targets: PropagationTargets::new(settings.trace_propagation_targets_backend.clone()),
            dsn,
            transport,
            settings,
        })
    }

    /// Creates a client, or returns `None` when telemetry is disabled or
    /// misconfigured. Configuration problems are logged, never raised.
    #[must_use]
    pub fn init(settings: Settings) -> Option<Arc<Self>> {
        match Self::try_new(settings) {
            Ok(client) => {
                tracing::info!(host = %client.dsn.host(), "Telemetry client initialized");
                Some(Arc::new(client))
            }
            Err(ClientError::MissingDsn) => {
                tracing::debug!("No DSN configured, telemetry disabled");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Telemetry client disabled");
                None
            }
        }
    }

    /// Replaces the unhandled exception classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn UnhandledClassifier>) -> Self {
        self.builder = self.builder.with_classifier(classifier);
        self
    }

    /// Sets the prefix for relative links on log items.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.builder = self.builder.with_base_url(base_url);
        self
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the server side DSN.
    #[must_use]
    pub fn dsn(&self) -> &Dsn {
        &self.dsn
    }

    /// Returns the event builder.
    #[must_use]
    pub fn builder(&self) -> &EventBuilder {
        &self.builder
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Opens the scope of a web request.
    #[must_use]
    pub fn scope(self: &Arc<Self>) -> Scope {
        Scope::new(Arc::clone(self), self.settings.enable_logs)
    }

    /// Opens the scope of a CLI command.
    #[must_use]
    pub fn cli_scope(self: &Arc<Self>) -> Scope {
        Scope::new(Arc::clone(self), self.settings.cli_enable_logs)
    }

    /// Sends one envelope to the collector.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope cannot be serialized or no response
    /// arrives. Non-2xx responses are returned as is.
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<TransportResponse, ClientError> {
        let body = envelope.to_bytes()?;
        let url = self.dsn.envelope_endpoint();
        let request = if self.settings.http_compression {
            OutboundRequest::new(url, envelope::gzip(&body)?).with_header("Content-Encoding", "gzip")
        } else {
            OutboundRequest::new(url, body)
        };
        let request = request
            .with_header("Content-Type", CONTENT_TYPE)
            .with_header("X-Sentry-Auth", self.auth_header());
        Ok(self.transport.send(request).await?)
    }

    fn auth_header(&self) -> String {
        format!(
            "Sentry sentry_version=7, sentry_client={CLIENT_NAME}, sentry_key={}",
            self.dsn.public_key()
        )
    }
}

/// An outbound HTTP call being traced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientSpan {
    /// The `http.client` span.
    pub span: SpanHandle,
    /// Propagation headers to add to the call.
    pub headers: Vec<(&'static str, String)>,
}

/// State of one unit of work.
#[derive(Debug)]
pub struct Scope {
    client: Arc<Client>,
    rate_limit: RateLimitState,
    trace: TraceContext,
    logs_enabled: bool,
    outbox: Outbox,
    debug_log: DebugLog,
}

impl Scope {
    /// Opens a scope with a fresh rate limiter and trace identity.
    #[must_use]
    pub fn new(client: Arc<Client>, logs_enabled: bool) -> Self {
        let settings = client.settings();
        let trace = TraceContext::new(TraceSettings {
            sample_rate: settings.traces_sample_rate,
            environment: settings.environment.clone(),
            release: settings.release.clone(),
            public_key: Some(client.dsn().public_key().to_string()),
        });
        let rate_limit = RateLimitState::new(settings.rate_limit);
        let debug_log = DebugLog::new();
        Self {
            client,
            rate_limit,
            trace,
            logs_enabled,
            outbox: Outbox::new(debug_log.clone()),
            debug_log,
        }
    }

    /// Returns the client.
    #[must_use]
    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Returns the rate limiter.
    #[must_use]
    pub fn rate_limit(&self) -> &RateLimitState {
        &self.rate_limit
    }

    /// Returns the trace context.
    #[must_use]
    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    /// Returns the trace context for manual span bookkeeping.
    pub fn trace_mut(&mut self) -> &mut TraceContext {
        &mut self.trace
    }

    /// Returns the debug messages of this unit.
    #[must_use]
    pub fn debug_log(&self) -> &DebugLog {
        &self.debug_log
    }

    /// Returns the items waiting to be sent.
    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Handles one log record.
    ///
    /// The record is always parsed. It becomes a log item when the logs path
    /// is enabled for its level, and an error event unless a filter
    /// suppresses it or the rate limit is exhausted. Returns the id of the
    /// queued event.
    pub fn log(
        &mut self,
        level: impl Into<RawLevel>,
        message: &str,
        mut context: LogContext,
    ) -> Option<EventId> {
        let started = Utc::now();
        let client = Arc::clone(&self.client);
        let parsed = ParsedMessage::parse(level, message, &mut context);

        if self.logs_enabled && client.filter.should_capture_log(parsed.level) {
            let item = client
                .builder
                .build_log_item(&parsed, &context, self.trace.trace_id());
            self.outbox.logs.push(item);
        }

        if !client
            .filter
            .should_capture_event(parsed.level, context.channel.as_deref(), &parsed.unformatted)
        {
            return None;
        }

        match self.rate_limit.admit() {
            Decision::Accept => {}
            Decision::Warn => {
                self.debug_log.record(DebugLevel::Warning, RATE_LIMIT_MESSAGE);
                let event = TelemetryEvent::message(Level::Error, RATE_LIMIT_MESSAGE)
                    .with_exception(ExceptionInfo::new("RateLimitException", RATE_LIMIT_MESSAGE));
                self.capture_event(event);
                return None;
            }
            Decision::Drop => return None,
        }

        let event = client.builder.build_event(&parsed, &context);
        let id = self.capture_event(event);
        let channel = context.channel.as_deref().unwrap_or_default();
        self.trace.record_child(
            "sentry.capture",
            &format!("{channel}: {}", parsed.formatted),
            started,
            Utc::now(),
        );
        Some(id)
    }

    /// Queues a plain message event.
    pub fn capture_message(&mut self, message: &str, severity: Severity) -> EventId {
        let level = match severity {
            Severity::Debug => Level::Debug,
            Severity::Info => Level::Info,
            Severity::Warning => Level::Warning,
            Severity::Error => Level::Error,
            Severity::Fatal => Level::Critical,
        };
        self.capture_event(TelemetryEvent::message(level, message).with_severity(severity))
    }

    /// Queues an event, attaching the current trace identifiers.
    pub fn capture_event(&mut self, event: TelemetryEvent) -> EventId {
        let event = if event.trace.is_some() {
            event
        } else {
            event.with_trace(Some(self.trace.event_context()))
        };
        let id = event.event_id;
        self.debug_log
            .record(DebugLevel::Debug, format!("Captured event {id}"));
        self.outbox.events.push(event);
        id
    }

    /// Queues a structured log item. Returns false when the logs path is
    /// disabled for this unit.
    pub fn capture_log(&mut self, level: LogLevel, message: &str) -> bool {
        if !self.logs_enabled {
            self.debug_log
                .record(DebugLevel::Info, "Logs are disabled, log item discarded");
            return false;
        }
        self.outbox
            .logs
            .push(LogItem::new(level, message, self.trace.trace_id()));
        true
    }

    /// Queues a cron check-in stamped with release and environment.
    pub fn capture_check_in(&mut self, mut check_in: CheckIn) -> EventId {
        check_in.release.clone_from(&self.client.release.release);
        check_in.environment.clone_from(&self.client.release.environment);
        let id = check_in.check_in_id;
        self.debug_log.record(
            DebugLevel::Debug,
            format!("Captured check-in {id} for {}", check_in.monitor_slug),
        );
        self.outbox.check_ins.push(check_in);
        id
    }

    /// Joins the trace described by inbound request headers.
    ///
    /// Baggage is only honored together with a trace header.
    pub fn continue_trace(
        &mut self,
        sentry_trace: Option<&str>,
        traceparent: Option<&str>,
        baggage: Option<&str>,
    ) {
        let incoming = PropagationContext::from_headers(sentry_trace, traceparent);
        let dsc = baggage
            .filter(|_| incoming.is_some())
            .and_then(DynamicSamplingContext::from_baggage);
        self.trace.continue_trace(incoming, dsc);
    }

    /// Starts the unit's transaction.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::AlreadyStarted`] if one was started before.
    pub fn start_transaction(&mut self, ctx: TransactionContext) -> Result<SpanHandle, TraceError> {
        self.trace.start_transaction(ctx)
    }

    /// Records an already timed child of the current span.
    pub fn record_child(
        &mut self,
        op: &str,
        description: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SpanHandle {
        self.trace.record_child(op, description, start, end)
    }

    /// Opens an `http.client` span for an outbound call and returns the
    /// propagation headers the call may carry.
    pub fn start_http_client_span(&mut self, method: &str, url: &str) -> HttpClientSpan {
        let parsed = Url::parse(url).ok();
        let host = parsed
            .as_ref()
            .and_then(Url::host_str)
            .unwrap_or_default()
            .to_string();
        let target = parsed.as_ref().map_or_else(
            || url.to_string(),
            |u| {
                let mut bare = u.clone();
                bare.set_query(None);
                bare.set_fragment(None);
                bare.to_string()
            },
        );

        let parent = self.trace.current_span();
        let span = self
            .trace
            .start_child(parent, "http.client", &format!("{method} {target}"))
            .unwrap_or(SpanHandle::Noop);
        if let Some(s) = self.trace.span_mut(span) {
            s.origin = Some("auto.http.client".to_string());
            s.data.insert("http.request.method".to_string(), json!(method));
            s.data.insert("url".to_string(), json!(target));
            if let Some(query) = parsed.as_ref().and_then(Url::query) {
                s.data.insert("http.query".to_string(), json!(query));
            }
            if let Some(fragment) = parsed.as_ref().and_then(Url::fragment) {
                s.data.insert("http.fragment".to_string(), json!(fragment));
            }
        }

        let headers = self
            .trace
            .outbound_headers(span, &host, &self.client.targets);
        HttpClientSpan { span, headers }
    }

    /// Finishes an `http.client` span. `status_code` is `None` when the
    /// call failed without a response.
    ///
    /// # Errors
    ///
    /// Returns an error if `span` is not the innermost open span.
    pub fn finish_http_client_span(
        &mut self,
        span: SpanHandle,
        status_code: Option<u16>,
    ) -> Result<(), TraceError> {
        if let Some(s) = self.trace.span_mut(span) {
            match status_code {
                Some(code) => {
                    s.data
                        .insert("http.response.status_code".to_string(), json!(code));
                    s.status = SpanStatus::from_http_status(code);
                }
                None => s.status = SpanStatus::Error,
            }
        }
        self.trace.finish(span).map(|_| ())
    }

    /// Ends the unit's transaction and queues it if sampled.
    pub fn finish_transaction(&mut self, status: SpanStatus) -> bool {
        match self.trace.finish_transaction(status) {
            Some(transaction) => {
                self.outbox.transactions.push(transaction);
                true
            }
            None => false,
        }
    }

    /// Ends a request transaction with the response status.
    ///
    /// Transactions of 404 responses are discarded unless 404 tracing is
    /// enabled.
    pub fn finish_server_transaction(&mut self, status_code: u16) -> bool {
        let root = self.trace.transaction();
        if let Some(root) = self.trace.span_mut(root) {
            root.data
                .insert("http.response.status_code".to_string(), json!(status_code));
        }
        match self
            .trace
            .finish_transaction(SpanStatus::from_http_status(status_code))
        {
            Some(_) if status_code == 404 && !self.client.settings.tracing_404 => {
                self.debug_log
                    .record(DebugLevel::Debug, "Discarded transaction of a 404 response");
                false
            }
            Some(transaction) => {
                self.outbox.transactions.push(transaction);
                true
            }
            None => false,
        }
    }

    /// Takes everything queued so far.
    pub fn drain(&mut self) -> Outbox {
        let mut outbox = std::mem::replace(&mut self.outbox, Outbox::new(self.debug_log.clone()));
        outbox.dsc = self.trace.dynamic_sampling_context();
        outbox
    }
}

/// Result of sending an [`Outbox`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Envelopes the collector accepted.
    pub delivered: Vec<EventId>,
    /// Envelopes that were rejected or not sent.
    pub failed: Vec<EventId>,
}

impl DeliveryReport {
    /// Returns true if the envelope with `id` was accepted.
    #[must_use]
    pub fn is_delivered(&self, id: EventId) -> bool {
        self.delivered.contains(&id)
    }
}

/// Items captured by one unit, waiting for delivery.
#[derive(Debug)]
pub struct Outbox {
    events: Vec<TelemetryEvent>,
    transactions: Vec<FinishedTransaction>,
    logs: Vec<LogItem>,
    check_ins: Vec<CheckIn>,
    dsc: DynamicSamplingContext,
    debug_log: DebugLog,
}

impl Outbox {
    fn new(debug_log: DebugLog) -> Self {
        Self {
            events: Vec::new(),
            transactions: Vec::new(),
            logs: Vec::new(),
            check_ins: Vec::new(),
            dsc: DynamicSamplingContext::new(),
            debug_log,
        }
    }

    /// Returns the queued error events.
    #[must_use]
    pub fn events(&self) -> &[TelemetryEvent] {
        &self.events
    }

    /// Returns the queued transactions.
    #[must_use]
    pub fn transactions(&self) -> &[FinishedTransaction] {
        &self.transactions
    }

    /// Returns the queued log items.
    #[must_use]
    pub fn logs(&self) -> &[LogItem] {
        &self.logs
    }

    /// Returns the queued check-ins.
    #[must_use]
    pub fn check_ins(&self) -> &[CheckIn] {
        &self.check_ins
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.transactions.is_empty()
            && self.logs.is_empty()
            && self.check_ins.is_empty()
    }

    /// Sends every queued item, one envelope per event, transaction and
    /// check-in and one for all log items. Failures are logged and reported,
    /// never retried.
    pub async fn send(self, client: &Client) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (id, envelope) in self.envelopes(client) {
            let result = match envelope {
                Ok(envelope) => client.send_envelope(&envelope).await,
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(response) if response.is_success() => {
                    self.debug_log
                        .record(DebugLevel::Info, format!("Sent envelope {id}"));
                    report.delivered.push(id);
                }
                Ok(response) => {
                    self.debug_log.record(
                        DebugLevel::Warning,
                        format!(
                            "Collector rejected envelope {id} with status {}",
                            response.status
                        ),
                    );
                    report.failed.push(id);
                }
                Err(e) => {
                    self.debug_log
                        .record(DebugLevel::Error, format!("Failed to send envelope {id}: {e}"));
                    report.failed.push(id);
                }
            }
        }
        report
    }

    fn envelopes(&self, client: &Client) -> Vec<(EventId, Result<Envelope, EnvelopeError>)> {
        let dsn = client.dsn();
        let info = &client.release;
        let mut envelopes = Vec::new();

        for event in &self.events {
            let id = event.event_id;
            let envelope = EnvelopeItem::event(event, info).map(|item| {
                single(Envelope::new(dsn).with_event_id(id).with_trace(&self.dsc), item)
            });
            envelopes.push((id, envelope));
        }
        for transaction in &self.transactions {
            let id = EventId::new();
            let envelope = EnvelopeItem::transaction(transaction, id, info).map(|item| {
                single(
                    Envelope::new(dsn)
                        .with_event_id(id)
                        .with_trace(&transaction.dsc),
                    item,
                )
            });
            envelopes.push((id, envelope));
        }
        if !self.logs.is_empty() {
            let id = EventId::new();
            let envelope = EnvelopeItem::logs(&self.logs).map(|item| {
                single(Envelope::new(dsn).with_event_id(id).with_trace(&self.dsc), item)
            });
            envelopes.push((id, envelope));
        }
        for check_in in &self.check_ins {
            let id = check_in.check_in_id;
            let envelope = EnvelopeItem::check_in(check_in)
                .map(|item| single(Envelope::new(dsn).with_event_id(id), item));
            envelopes.push((id, envelope));
        }
        envelopes
    }
}

fn single(mut envelope: Envelope, item: EnvelopeItem) -> Envelope {
    envelope.add_item(item);
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckInStatus, LevelSet, TransactionSource};
    use crate::trace::{BAGGAGE_HEADER, SENTRY_TRACE_HEADER};
    use crate::transport::RecordingTransport;

    const DSN: &str = "https://pubkey@o1.ingest.sentry.test/7";

    fn settings() -> Settings {
        Settings {
            client_key: Some(DSN.to_string()),
            environment: Some("production".to_string()),
            release: Some("2.4.0".to_string()),
            log_levels: LevelSet::all(),
            ..Settings::default()
        }
    }

    fn client_with(settings: Settings, transport: &RecordingTransport) -> Arc<Client> {
        Arc::new(Client::with_transport(settings, Arc::new(transport.clone())).unwrap())
    }

    fn envelope_items(body: &[u8]) -> Vec<serde_json::Value> {
        std::str::from_utf8(body)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_missing_dsn() {
        let transport = RecordingTransport::new();
        let result = Client::with_transport(Settings::default(), Arc::new(transport));
        assert!(matches!(result, Err(ClientError::MissingDsn)));
        assert!(Client::init(Settings::default()).is_none());
    }

    #[test]
    fn test_invalid_settings_are_swallowed_by_init() {
        let settings = Settings {
            traces_sample_rate: Some(1.5),
            ..settings()
        };
        assert!(matches!(
            Client::try_new(settings.clone()),
            Err(ClientError::Settings(_))
        ));
        assert!(Client::init(settings).is_none());

        let settings = Settings {
            client_key: Some("not a dsn".to_string()),
            ..Settings::default()
        };
        assert!(matches!(Client::try_new(settings), Err(ClientError::Dsn(_))));
    }

    #[tokio::test]
    async fn test_accepted_message_is_sent() {
        let transport = RecordingTransport::new();
        let client = client_with(settings(), &transport);
        let mut scope = client.scope();

        let context = LogContext::channel("php").with_placeholder("%name", "bob");
        let id = scope.log(Level::Error, "Hello %name", context).unwrap();

        let report = scope.drain().send(&client).await;
        assert!(report.is_delivered(id));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url,
            "https://o1.ingest.sentry.test/api/7/envelope/"
        );
        assert!(requests[0]
            .header("x-sentry-auth")
            .unwrap()
            .contains("sentry_key=pubkey"));

        let lines = envelope_items(&requests[0].body);
        assert_eq!(lines[0]["event_id"], id.to_string());
        assert_eq!(lines[0]["dsn"], DSN);
        assert_eq!(lines[1]["type"], "event");
        assert_eq!(lines[2]["message"]["formatted"], "Hello bob");
        assert_eq!(lines[2]["message"]["message"], "Hello %name");
        assert_eq!(lines[2]["logger"], "php");
        assert_eq!(lines[2]["environment"], "production");
        assert_eq!(lines[2]["release"], "2.4.0");
        assert_eq!(
            lines[2]["contexts"]["trace"]["trace_id"],
            scope.trace().trace_id().to_string()
        );
    }

    #[tokio::test]
    async fn test_ignored_channel_is_not_sent() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                ignored_channels: vec!["cron".to_string()],
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();

        assert!(scope
            .log(Level::Error, "Cron run completed.", LogContext::channel("cron"))
            .is_none());
        assert_eq!(scope.rate_limit().count(), 0);

        let outbox = scope.drain();
        assert!(outbox.is_empty());
        assert_eq!(outbox.send(&client).await, DeliveryReport::default());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_ignored_message_matches_without_backtrace_token() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                ignored_messages: vec!["%type: @message".to_string()],
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();
        let context = LogContext::channel("php")
            .with_placeholder("%type", "RuntimeException")
            .with_placeholder("@message", "boom")
            .with_placeholder(crate::builder::BACKTRACE_KEY, "#0 index.php(1): main()");

        assert!(scope
            .log(Level::Error, "%type: @message @backtrace_string", context)
            .is_none());
        assert!(scope.outbox().events().is_empty());
        assert_eq!(scope.rate_limit().count(), 0);
    }

    #[test]
    fn test_rate_limit_sends_one_notice() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                rate_limit: 2,
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();

        let ids: Vec<_> = (0..5)
            .map(|i| scope.log(Level::Error, &format!("failure {i}"), LogContext::default()))
            .collect();

        assert!(ids[0].is_some());
        assert!(ids[1].is_some());
        assert!(ids[2..].iter().all(Option::is_none));
        assert_eq!(scope.rate_limit().count(), 5);

        let events = scope.outbox().events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].message.formatted, RATE_LIMIT_MESSAGE);
        assert_eq!(
            events[2].exception.as_ref().unwrap().type_name,
            "RateLimitException"
        );
        assert!(scope
            .debug_log()
            .entries()
            .iter()
            .any(|e| e.level == DebugLevel::Warning && e.message == RATE_LIMIT_MESSAGE));
    }

    #[test]
    fn test_scopes_have_independent_limits() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                rate_limit: 1,
                ..settings()
            },
            &transport,
        );

        let mut first = client.scope();
        assert!(first.log(Level::Error, "a", LogContext::default()).is_some());
        assert!(first.log(Level::Error, "b", LogContext::default()).is_none());

        let mut second = client.scope();
        assert!(second.log(Level::Error, "c", LogContext::default()).is_some());
    }

    #[test]
    fn test_logs_path_uses_its_own_levels() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                enable_logs: true,
                log_levels: LevelSet::at_least(Level::Error),
                logs_log_levels: LevelSet::at_least(Level::Info),
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();

        assert!(scope
            .log(Level::Info, "User @name logged in", LogContext::default().with_placeholder("@name", "eve"))
            .is_none());
        assert!(scope.log(Level::Debug, "noise", LogContext::default()).is_none());

        let outbox = scope.outbox();
        assert!(outbox.events().is_empty());
        assert_eq!(outbox.logs().len(), 1);
        assert_eq!(outbox.logs()[0].body, "User eve logged in");
        assert_eq!(
            outbox.logs()[0].attributes["sentry.message.parameter.@name"],
            "eve"
        );
    }

    #[test]
    fn test_cli_scope_uses_cli_logs_switch() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                enable_logs: true,
                cli_enable_logs: false,
                ..settings()
            },
            &transport,
        );

        assert!(client.scope().capture_log(LogLevel::Info, "web"));
        let mut cli = client.cli_scope();
        assert!(!cli.capture_log(LogLevel::Info, "cli"));
        assert!(cli.outbox().logs().is_empty());
    }

    #[test]
    fn test_capture_inside_transaction_records_span() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                traces_sample_rate: Some(1.0),
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();
        let root = scope
            .start_transaction(
                TransactionContext::new("GET /node/1", "http.server")
                    .with_source(TransactionSource::Url),
            )
            .unwrap();

        scope
            .log(Level::Error, "Broken", LogContext::channel("php"))
            .unwrap();

        let event = &scope.outbox().events()[0];
        let trace = event.trace.as_ref().unwrap();
        assert_eq!(trace.span_id, root.span_id().unwrap().to_string());

        assert!(scope.finish_server_transaction(200));
        let transaction = &scope.outbox().transactions()[0];
        assert_eq!(transaction.spans.len(), 1);
        assert_eq!(transaction.spans[0].op, "sentry.capture");
        assert_eq!(
            transaction.spans[0].description.as_deref(),
            Some("php: Broken")
        );
        assert_eq!(
            transaction.root.data["http.response.status_code"],
            json!(200)
        );
    }

    #[test]
    fn test_not_found_transaction_is_discarded() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                traces_sample_rate: Some(1.0),
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();
        scope
            .start_transaction(TransactionContext::new("GET /missing", "http.server"))
            .unwrap();
        assert!(!scope.finish_server_transaction(404));
        assert!(scope.outbox().transactions().is_empty());

        let client = client_with(
            Settings {
                traces_sample_rate: Some(1.0),
                tracing_404: true,
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();
        scope
            .start_transaction(TransactionContext::new("GET /missing", "http.server"))
            .unwrap();
        assert!(scope.finish_server_transaction(404));
    }

    #[test]
    fn test_http_client_span_propagation() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                traces_sample_rate: Some(1.0),
                trace_propagation_targets_backend: Some(vec!["api.internal.test".to_string()]),
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();
        scope
            .start_transaction(TransactionContext::new("GET /", "http.server"))
            .unwrap();

        let call = scope.start_http_client_span("GET", "https://api.internal.test/users?page=2#top");
        let span_id = call.span.span_id().unwrap();
        let names: Vec<_> = call.headers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec![SENTRY_TRACE_HEADER, BAGGAGE_HEADER]);
        assert!(call.headers[0].1.contains(&span_id.to_string()));

        let span = scope.trace_mut().span_mut(call.span).unwrap();
        assert_eq!(span.description.as_deref(), Some("GET https://api.internal.test/users"));
        assert_eq!(span.data["http.query"], json!("page=2"));
        assert_eq!(span.origin.as_deref(), Some("auto.http.client"));

        scope.finish_http_client_span(call.span, Some(503)).unwrap();
        assert!(scope.finish_transaction(SpanStatus::Ok));
        let child = &scope.outbox().transactions()[0].spans[0];
        assert_eq!(child.status, SpanStatus::Error);
        assert_eq!(child.data["http.response.status_code"], json!(503));

        let mut scope = client.scope();
        let call = scope.start_http_client_span("POST", "https://elsewhere.test/");
        assert!(call.span.is_noop());
        assert!(call.headers.is_empty());
    }

    #[test]
    fn test_empty_propagation_list_sends_trace_everywhere() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                traces_sample_rate: Some(1.0),
                trace_propagation_targets_backend: Some(Vec::new()),
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();
        scope
            .start_transaction(TransactionContext::new("GET /", "http.server"))
            .unwrap();

        let call = scope.start_http_client_span("GET", "https://api.example.org/x");
        let names: Vec<_> = call.headers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec![SENTRY_TRACE_HEADER]);
    }

    #[test]
    fn test_continue_trace_from_headers() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                traces_sample_rate: Some(0.0),
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();
        scope.continue_trace(
            Some("771a43a4192642f0b136d5159a501700-1234567890abcdef-1"),
            None,
            Some("sentry-trace_id=771a43a4192642f0b136d5159a501700,sentry-sampled=true"),
        );
        let root = scope
            .start_transaction(TransactionContext::new("GET /", "http.server"))
            .unwrap();

        assert!(!root.is_noop());
        assert_eq!(
            scope.trace().trace_id().to_string(),
            "771a43a4192642f0b136d5159a501700"
        );
        assert!(scope.trace().dynamic_sampling_context().is_frozen());
    }

    #[test]
    fn test_baggage_without_trace_header_is_ignored() {
        let transport = RecordingTransport::new();
        let client = client_with(settings(), &transport);
        let mut scope = client.scope();
        scope.continue_trace(None, None, Some("sentry-trace_id=771a43a4192642f0b136d5159a501700"));
        assert!(!scope.trace().dynamic_sampling_context().is_frozen());
    }

    #[tokio::test]
    async fn test_check_in_envelope() {
        let transport = RecordingTransport::new();
        let client = client_with(settings(), &transport);
        let mut scope = client.cli_scope();

        let opening = CheckIn::in_progress("nightly-import");
        let id = scope.capture_check_in(opening.clone());
        scope.capture_check_in(opening.close(CheckInStatus::Ok, 1.5));
        let report = scope.drain().send(&client).await;

        assert_eq!(report.delivered, vec![id, id]);
        let lines = envelope_items(&transport.requests()[1].body);
        assert_eq!(lines[1]["type"], "check_in");
        assert_eq!(lines[2]["status"], "ok");
        assert_eq!(lines[2]["release"], "2.4.0");
        assert_eq!(lines[2]["environment"], "production");
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let transport = RecordingTransport::new()
            .with_response(Ok(TransportResponse::new(429, "")))
            .with_response(Err(TransportError::Timeout));
        let client = client_with(settings(), &transport);
        let mut scope = client.scope();

        let first = scope.capture_message("one", Severity::Warning);
        let second = scope.capture_message("two", Severity::Fatal);
        let report = scope.drain().send(&client).await;

        assert!(report.delivered.is_empty());
        assert_eq!(report.failed, vec![first, second]);
        let entries = scope.debug_log().entries();
        assert!(entries.iter().any(|e| e.level == DebugLevel::Warning));
        assert!(entries.iter().any(|e| e.level == DebugLevel::Error));
    }

    #[tokio::test]
    async fn test_compressed_delivery() {
        let transport = RecordingTransport::new();
        let client = client_with(
            Settings {
                http_compression: true,
                ..settings()
            },
            &transport,
        );
        let mut scope = client.scope();
        scope.capture_message("zipped", Severity::Info);
        scope.drain().send(&client).await;

        assert_eq!(
            transport.requests()[0].header("content-encoding"),
            Some("gzip")
        );
    }
}
