//! Trace context of one unit of work.
//!
//! Each request or command owns one [`TraceContext`]. It holds the
//! transaction, the stack of open spans (the innermost one is the current
//! span) and the propagation identity used when no transaction is running.

use super::propagation::{
    sentry_trace_value, DynamicSamplingContext, PropagationContext, PropagationTargets,
    BAGGAGE_HEADER, SENTRY_TRACE_HEADER,
};
use super::sampler::Sampler;
use crate::models::{EventTraceContext, Span, SpanId, SpanStatus, TraceId, TransactionSource};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from span bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraceError {
    /// A transaction was already started in this unit.
    #[error("A transaction was already started in this unit of work")]
    AlreadyStarted,

    /// No transaction is running.
    #[error("No transaction is active")]
    NotActive,

    /// The span is not open in this unit.
    #[error("Span {0} is not open")]
    UnknownSpan(SpanId),

    /// Spans must finish innermost first.
    #[error("Span {found} finished before its child {expected}")]
    OutOfOrder {
        /// The innermost open span.
        expected: SpanId,
        /// The span that was asked to finish.
        found: SpanId,
    },
}

/// Lifecycle of a unit's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceState {
    /// No transaction has been started.
    NoTransaction,
    /// A transaction is running.
    TransactionActive,
    /// The transaction finished.
    Finished,
}

/// Reference to a span of the current unit.
///
/// Spans of unsampled traces are [`SpanHandle::Noop`]: every operation on
/// them succeeds and records nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanHandle {
    /// A recorded span.
    Span(SpanId),
    /// A span nobody will see.
    Noop,
}

impl SpanHandle {
    /// Returns true for [`SpanHandle::Noop`].
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }

    /// Returns the span id of a recorded span.
    #[must_use]
    pub fn span_id(&self) -> Option<SpanId> {
        match self {
            Self::Span(id) => Some(*id),
            Self::Noop => None,
        }
    }
}

/// Parameters of a new transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    /// Transaction name, e.g. `GET /node/{node}`.
    pub name: String,
    /// Operation, e.g. `http.server`.
    pub op: String,
    /// Where the name came from.
    pub source: TransactionSource,
    /// Origin of the instrumentation.
    pub origin: Option<String>,
}

impl TransactionContext {
    /// Creates a transaction context with a custom source.
    #[must_use]
    pub fn new(name: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: op.into(),
            source: TransactionSource::Custom,
            origin: None,
        }
    }

    /// Sets the name source.
    #[must_use]
    pub fn with_source(mut self, source: TransactionSource) -> Self {
        self.source = source;
        self
    }

    /// Sets the origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// A finished, sampled transaction ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedTransaction {
    /// Transaction name.
    pub name: String,
    /// Where the name came from.
    pub source: TransactionSource,
    /// The root span.
    pub root: Span,
    /// Finished children, in finish order.
    pub spans: Vec<Span>,
    /// Sampling context to send along.
    pub dsc: DynamicSamplingContext,
}

/// Values that identify this service in the sampling context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceSettings {
    /// Transaction sample rate.
    pub sample_rate: Option<f64>,
    /// Environment name.
    pub environment: Option<String>,
    /// Release identifier.
    pub release: Option<String>,
    /// Public key of the DSN.
    pub public_key: Option<String>,
}

#[derive(Debug)]
struct ActiveTransaction {
    name: String,
    source: TransactionSource,
    root: Span,
    open: Vec<Span>,
    finished: Vec<Span>,
    dsc: DynamicSamplingContext,
}

impl ActiveTransaction {
    fn innermost(&self) -> &Span {
        self.open.last().unwrap_or(&self.root)
    }

    fn is_open(&self, id: SpanId) -> bool {
        self.root.span_id == id || self.open.iter().any(|s| s.span_id == id)
    }
}

/// Span stack and trace identity of one unit of work.
///
/// # Example
///
/// ```
/// use shared::trace::{TraceContext, TraceSettings, TransactionContext};
///
/// let mut trace = TraceContext::new(TraceSettings {
///     sample_rate: Some(1.0),
///     ..TraceSettings::default()
/// });
/// let root = trace.start_transaction(TransactionContext::new("GET /", "http.server")).unwrap();
/// let child = trace.start_child(root, "db.sql.query", "SELECT 1").unwrap();
/// trace.finish(child).unwrap();
/// let finished = trace.finish(root).unwrap().unwrap();
/// assert_eq!(finished.spans.len(), 1);
/// ```
#[derive(Debug)]
pub struct TraceContext {
    settings: TraceSettings,
    sampler: Sampler,
    state: TraceState,
    propagation: PropagationContext,
    incoming: Option<PropagationContext>,
    incoming_dsc: Option<DynamicSamplingContext>,
    transaction: Option<ActiveTransaction>,
}

impl TraceContext {
    /// Creates a context with a fresh trace identity.
    #[must_use]
    pub fn new(settings: TraceSettings) -> Self {
        Self {
            sampler: Sampler::new(settings.sample_rate),
            settings,
            state: TraceState::NoTransaction,
            propagation: PropagationContext {
                trace_id: TraceId::random(),
                parent_span_id: SpanId::random(),
                sampled: None,
            },
            incoming: None,
            incoming_dsc: None,
            transaction: None,
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> TraceState {
        self.state
    }

    /// Joins the trace described by inbound headers.
    ///
    /// Later transactions inherit the remote trace id, parent span and
    /// sampling decision; an inbound `sentry-` baggage is forwarded as is.
    pub fn continue_trace(
        &mut self,
        incoming: Option<PropagationContext>,
        dsc: Option<DynamicSamplingContext>,
    ) {
        if let Some(incoming) = incoming {
            self.propagation = PropagationContext {
                trace_id: incoming.trace_id,
                parent_span_id: SpanId::random(),
                sampled: incoming.sampled,
            };
            self.incoming = Some(incoming);
        }
        self.incoming_dsc = dsc;
    }

    /// Starts the unit's transaction and makes it the current span.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::AlreadyStarted`] unless no transaction was
    /// started yet.
    pub fn start_transaction(&mut self, ctx: TransactionContext) -> Result<SpanHandle, TraceError> {
        if self.state != TraceState::NoTransaction {
            return Err(TraceError::AlreadyStarted);
        }

        let trace_id = self.propagation.trace_id;
        let sampled = self
            .incoming
            .and_then(|i| i.sampled)
            .unwrap_or_else(|| self.sampler.should_sample(trace_id));

        let mut root = Span::new(trace_id, SpanId::random(), ctx.op, sampled);
        root.description = Some(ctx.name.clone());
        root.origin = ctx.origin;
        if let Some(incoming) = self.incoming {
            root.parent_span_id = Some(incoming.parent_span_id);
        }

        let dsc = self.incoming_dsc.clone().unwrap_or_else(|| {
            let mut dsc = self.base_dsc(trace_id);
            dsc.set("transaction", ctx.name.clone());
            dsc.set("sampled", sampled.to_string());
            dsc
        });

        let handle = if sampled {
            SpanHandle::Span(root.span_id)
        } else {
            SpanHandle::Noop
        };
        tracing::debug!(
            transaction = %ctx.name,
            trace_id = %trace_id,
            sampled,
            "Transaction started"
        );

        self.transaction = Some(ActiveTransaction {
            name: ctx.name,
            source: ctx.source,
            root,
            open: Vec::new(),
            finished: Vec::new(),
            dsc,
        });
        self.state = TraceState::TransactionActive;
        Ok(handle)
    }

    /// Returns the root span handle while the transaction is active.
    #[must_use]
    pub fn transaction(&self) -> SpanHandle {
        match &self.transaction {
            Some(t) if self.state == TraceState::TransactionActive && t.root.sampled => {
                SpanHandle::Span(t.root.span_id)
            }
            _ => SpanHandle::Noop,
        }
    }

    /// Returns the innermost open span.
    #[must_use]
    pub fn current_span(&self) -> SpanHandle {
        match &self.transaction {
            Some(t) if self.state == TraceState::TransactionActive && t.root.sampled => {
                SpanHandle::Span(t.innermost().span_id)
            }
            _ => SpanHandle::Noop,
        }
    }

    /// Returns true if the running transaction is sampled.
    #[must_use]
    pub fn is_sampled(&self) -> bool {
        self.state == TraceState::TransactionActive
            && self.transaction.as_ref().is_some_and(|t| t.root.sampled)
    }

    /// Opens a child of `parent`. The child becomes the current span.
    ///
    /// Children of [`SpanHandle::Noop`] are no-ops as well.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::UnknownSpan`] if `parent` is not open.
    pub fn start_child(
        &mut self,
        parent: SpanHandle,
        op: &str,
        description: &str,
    ) -> Result<SpanHandle, TraceError> {
        let SpanHandle::Span(parent_id) = parent else {
            return Ok(SpanHandle::Noop);
        };
        let transaction = self.active_mut()?;
        if !transaction.is_open(parent_id) {
            return Err(TraceError::UnknownSpan(parent_id));
        }

        let span = Span::new(transaction.root.trace_id, SpanId::random(), op, true)
            .with_parent(parent_id)
            .with_description(description);
        let id = span.span_id;
        transaction.open.push(span);
        Ok(SpanHandle::Span(id))
    }

    /// Records an already timed child of the current span.
    pub fn record_child(
        &mut self,
        op: &str,
        description: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SpanHandle {
        if !self.is_sampled() {
            return SpanHandle::Noop;
        }
        let Ok(transaction) = self.active_mut() else {
            return SpanHandle::Noop;
        };

        let mut span = Span::new(transaction.root.trace_id, SpanId::random(), op, true)
            .with_parent(transaction.innermost().span_id)
            .with_description(description);
        span.origin = Some("auto.app".to_string());
        span.start_time = start;
        span.end_time = Some(end);
        let id = span.span_id;
        transaction.finished.push(span);
        SpanHandle::Span(id)
    }

    /// Gives mutable access to an open span to set data or status.
    pub fn span_mut(&mut self, handle: SpanHandle) -> Option<&mut Span> {
        let id = handle.span_id()?;
        let transaction = self.transaction.as_mut()?;
        if transaction.root.span_id == id {
            return Some(&mut transaction.root);
        }
        transaction.open.iter_mut().find(|s| s.span_id == id)
    }

    /// Finishes a span.
    ///
    /// Only the innermost open span may finish; anything else is rejected
    /// and leaves the stack untouched. Finishing the transaction ends the
    /// unit's trace and returns it if it was sampled.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::OutOfOrder`] when `span` is not the innermost
    /// open span and [`TraceError::UnknownSpan`] when it is not open at all.
    pub fn finish(&mut self, span: SpanHandle) -> Result<Option<FinishedTransaction>, TraceError> {
        let SpanHandle::Span(id) = span else {
            return Ok(None);
        };
        let transaction = self.active_mut()?;
        if !transaction.is_open(id) {
            return Err(TraceError::UnknownSpan(id));
        }

        let innermost = transaction.innermost().span_id;
        if innermost != id {
            tracing::warn!(span_id = %id, open_child = %innermost, "Span finished out of order");
            return Err(TraceError::OutOfOrder {
                expected: innermost,
                found: id,
            });
        }

        if let Some(mut child) = transaction.open.pop() {
            child.end_time = Some(Utc::now());
            transaction.finished.push(child);
            return Ok(None);
        }
        Ok(self.close_transaction())
    }

    /// Ends the unit's transaction.
    ///
    /// Children still open are cancelled. Returns the transaction if it was
    /// sampled.
    pub fn finish_transaction(&mut self, status: SpanStatus) -> Option<FinishedTransaction> {
        let transaction = self.active_mut().ok()?;
        while let Some(mut child) = transaction.open.pop() {
            tracing::warn!(span_id = %child.span_id, op = %child.op, "Cancelling unfinished span");
            child.status = SpanStatus::Cancelled;
            child.end_time = Some(Utc::now());
            transaction.finished.push(child);
        }
        transaction.root.status = status;
        self.close_transaction()
    }

    fn close_transaction(&mut self) -> Option<FinishedTransaction> {
        self.state = TraceState::Finished;
        let mut transaction = self.transaction.take()?;
        transaction.root.end_time = Some(Utc::now());
        tracing::debug!(
            transaction = %transaction.name,
            spans = transaction.finished.len(),
            sampled = transaction.root.sampled,
            "Transaction finished"
        );
        if !transaction.root.sampled {
            return None;
        }
        Some(FinishedTransaction {
            name: transaction.name,
            source: transaction.source,
            root: transaction.root,
            spans: transaction.finished,
            dsc: transaction.dsc,
        })
    }

    fn active_mut(&mut self) -> Result<&mut ActiveTransaction, TraceError> {
        match self.state {
            TraceState::TransactionActive => self.transaction.as_mut().ok_or(TraceError::NotActive),
            _ => Err(TraceError::NotActive),
        }
    }

    fn base_dsc(&self, trace_id: TraceId) -> DynamicSamplingContext {
        let mut dsc = DynamicSamplingContext::new();
        dsc.set("trace_id", trace_id.to_string());
        if let Some(public_key) = &self.settings.public_key {
            dsc.set("public_key", public_key.clone());
        }
        if let Some(environment) = &self.settings.environment {
            dsc.set("environment", environment.clone());
        }
        if let Some(release) = &self.settings.release {
            dsc.set("release", release.clone());
        }
        if let Some(rate) = self.sampler.rate() {
            dsc.set("sample_rate", rate.to_string());
        }
        dsc
    }

    /// Returns the trace id events and logs of this unit belong to.
    #[must_use]
    pub fn trace_id(&self) -> TraceId {
        self.propagation.trace_id
    }

    /// Returns the identifiers to attach to a captured event.
    #[must_use]
    pub fn event_context(&self) -> EventTraceContext {
        let span_id = match self.current_span() {
            SpanHandle::Span(id) => id,
            SpanHandle::Noop => self
                .transaction
                .as_ref()
                .filter(|_| self.state == TraceState::TransactionActive)
                .map_or(self.propagation.parent_span_id, |t| t.root.span_id),
        };
        EventTraceContext {
            trace_id: self.trace_id().to_string(),
            span_id: span_id.to_string(),
        }
    }

    /// Returns the sampling context of the unit.
    #[must_use]
    pub fn dynamic_sampling_context(&self) -> DynamicSamplingContext {
        if let Some(transaction) = &self.transaction {
            return transaction.dsc.clone();
        }
        self.incoming_dsc
            .clone()
            .unwrap_or_else(|| self.base_dsc(self.trace_id()))
    }

    /// Returns the `sentry-trace` value for an outbound call made inside
    /// `span` (or the current span when `span` is a no-op).
    #[must_use]
    pub fn sentry_trace(&self, span: SpanHandle) -> String {
        match (&self.transaction, self.state) {
            (Some(t), TraceState::TransactionActive) => {
                let span_id = span.span_id().unwrap_or(t.innermost().span_id);
                sentry_trace_value(t.root.trace_id, span_id, Some(t.root.sampled))
            }
            _ => sentry_trace_value(
                self.propagation.trace_id,
                self.propagation.parent_span_id,
                self.propagation.sampled,
            ),
        }
    }

    /// Returns the propagation headers an outbound call to `host` may carry.
    #[must_use]
    pub fn outbound_headers(
        &self,
        span: SpanHandle,
        host: &str,
        targets: &PropagationTargets,
    ) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if targets.allows_trace(host) {
            headers.push((SENTRY_TRACE_HEADER, self.sentry_trace(span)));
        }
        if targets.allows_baggage(host) {
            let baggage = self.dynamic_sampling_context().to_baggage();
            if !baggage.is_empty() {
                headers.push((BAGGAGE_HEADER, baggage));
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled() -> TraceContext {
        TraceContext::new(TraceSettings {
            sample_rate: Some(1.0),
            environment: Some("prod".to_string()),
            release: Some("1.0".to_string()),
            public_key: Some("key".to_string()),
        })
    }

    fn unsampled() -> TraceContext {
        TraceContext::new(TraceSettings {
            sample_rate: Some(0.0),
            ..TraceSettings::default()
        })
    }

    fn start(trace: &mut TraceContext) -> SpanHandle {
        trace
            .start_transaction(TransactionContext::new("GET /node", "http.server"))
            .unwrap()
    }

    #[test]
    fn test_state_machine() {
        let mut trace = sampled();
        assert_eq!(trace.state(), TraceState::NoTransaction);

        let root = start(&mut trace);
        assert_eq!(trace.state(), TraceState::TransactionActive);
        assert_eq!(trace.current_span(), root);

        let finished = trace.finish(root).unwrap().unwrap();
        assert_eq!(trace.state(), TraceState::Finished);
        assert_eq!(finished.name, "GET /node");
        assert!(finished.root.is_finished());
    }

    #[test]
    fn test_second_transaction_rejected() {
        let mut trace = sampled();
        let root = start(&mut trace);
        assert_eq!(
            trace.start_transaction(TransactionContext::new("again", "task")),
            Err(TraceError::AlreadyStarted)
        );
        trace.finish(root).unwrap();
        assert_eq!(
            trace.start_transaction(TransactionContext::new("again", "task")),
            Err(TraceError::AlreadyStarted)
        );
    }

    #[test]
    fn test_children_inherit_trace_and_nest() {
        let mut trace = sampled();
        let root = start(&mut trace);
        let a = trace.start_child(root, "db", "a").unwrap();
        let b = trace.start_child(a, "db", "b").unwrap();
        assert_eq!(trace.current_span(), b);

        trace.finish(b).unwrap();
        assert_eq!(trace.current_span(), a);
        trace.finish(a).unwrap();
        let finished = trace.finish(root).unwrap().unwrap();

        assert_eq!(finished.spans.len(), 2);
        assert!(finished.spans.iter().all(|s| s.trace_id == finished.root.trace_id));
        assert_eq!(finished.spans[0].parent_span_id, a.span_id());
        assert_eq!(finished.spans[1].parent_span_id, root.span_id());
    }

    #[test]
    fn test_out_of_order_finish_rejected() {
        let mut trace = sampled();
        let root = start(&mut trace);
        let a = trace.start_child(root, "db", "a").unwrap();
        let b = trace.start_child(a, "db", "b").unwrap();

        assert_eq!(
            trace.finish(a),
            Err(TraceError::OutOfOrder {
                expected: b.span_id().unwrap(),
                found: a.span_id().unwrap(),
            })
        );
        assert_eq!(trace.current_span(), b);

        assert!(matches!(trace.finish(root), Err(TraceError::OutOfOrder { .. })));
        assert_eq!(trace.state(), TraceState::TransactionActive);

        trace.finish(b).unwrap();
        trace.finish(a).unwrap();
        assert!(trace.finish(root).unwrap().is_some());
    }

    #[test]
    fn test_finish_unknown_span() {
        let mut trace = sampled();
        let root = start(&mut trace);
        let a = trace.start_child(root, "db", "a").unwrap();
        trace.finish(a).unwrap();
        assert_eq!(trace.finish(a), Err(TraceError::UnknownSpan(a.span_id().unwrap())));
    }

    #[test]
    fn test_unsampled_transaction_records_nothing() {
        let mut trace = unsampled();
        let root = start(&mut trace);
        assert!(root.is_noop());

        let child = trace.start_child(root, "db", "a").unwrap();
        assert!(child.is_noop());
        let now = Utc::now();
        assert!(trace.record_child("sentry.capture", "x", now, now).is_noop());
        assert!(trace.finish(child).unwrap().is_none());
        assert!(trace.finish_transaction(SpanStatus::Ok).is_none());
        assert_eq!(trace.state(), TraceState::Finished);
    }

    #[test]
    fn test_record_child_under_current_span() {
        let mut trace = sampled();
        let root = start(&mut trace);
        let a = trace.start_child(root, "http.client", "GET").unwrap();
        let now = Utc::now();
        let recorded = trace.record_child("sentry.capture", "php: boom", now, now);
        assert!(!recorded.is_noop());
        assert_eq!(trace.current_span(), a);

        trace.finish(a).unwrap();
        let finished = trace.finish(root).unwrap().unwrap();
        let capture = finished.spans.iter().find(|s| s.op == "sentry.capture").unwrap();
        assert_eq!(capture.parent_span_id, a.span_id());
        assert_eq!(capture.origin.as_deref(), Some("auto.app"));
    }

    #[test]
    fn test_finish_transaction_cancels_open_children() {
        let mut trace = sampled();
        let root = start(&mut trace);
        let a = trace.start_child(root, "db", "a").unwrap();
        trace.start_child(a, "db", "b").unwrap();

        let finished = trace.finish_transaction(SpanStatus::Error).unwrap();
        assert_eq!(finished.root.status, SpanStatus::Error);
        assert_eq!(finished.spans.len(), 2);
        assert!(finished.spans.iter().all(|s| s.status == SpanStatus::Cancelled));
        assert!(trace.finish_transaction(SpanStatus::Ok).is_none());
    }

    #[test]
    fn test_continue_trace_inherits_decision() {
        let mut trace = unsampled();
        let incoming = PropagationContext::from_sentry_trace(
            "771a43a4192642f0b136d5159a501700-1234567890abcdef-1",
        );
        trace.continue_trace(incoming, None);
        let root = start(&mut trace);

        assert!(!root.is_noop());
        let finished = trace.finish(root).unwrap().unwrap();
        assert_eq!(
            finished.root.trace_id.to_string(),
            "771a43a4192642f0b136d5159a501700"
        );
        assert_eq!(
            finished.root.parent_span_id.map(|s| s.to_string()).as_deref(),
            Some("1234567890abcdef")
        );
    }

    #[test]
    fn test_continue_trace_without_flag_samples_locally() {
        let mut trace = unsampled();
        let incoming = PropagationContext::from_sentry_trace(
            "771a43a4192642f0b136d5159a501700-1234567890abcdef",
        );
        trace.continue_trace(incoming, None);
        assert!(start(&mut trace).is_noop());
    }

    #[test]
    fn test_frozen_baggage_is_forwarded() {
        let mut trace = sampled();
        let dsc = DynamicSamplingContext::from_baggage("sentry-trace_id=abc,sentry-release=upstream");
        trace.continue_trace(None, dsc);
        let root = start(&mut trace);

        let targets = PropagationTargets::new(Some(vec!["api.example.org".to_string()]));
        let headers = trace.outbound_headers(root, "api.example.org", &targets);
        assert_eq!(
            headers[1],
            (BAGGAGE_HEADER, "sentry-release=upstream,sentry-trace_id=abc".to_string())
        );
    }

    #[test]
    fn test_outbound_headers_respect_allow_list() {
        let mut trace = sampled();
        let root = start(&mut trace);
        let targets = PropagationTargets::new(Some(vec!["api.example.org".to_string()]));

        let headers = trace.outbound_headers(root, "api.example.org", &targets);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, SENTRY_TRACE_HEADER);
        assert!(headers[0].1.ends_with("-1"));
        assert!(headers[1].1.contains("sentry-environment=prod"));
        assert!(headers[1].1.contains("sentry-transaction=GET%20/node"));

        assert!(trace.outbound_headers(root, "other.test", &targets).is_empty());
    }

    #[test]
    fn test_outbound_headers_without_transaction() {
        let trace = sampled();
        let headers = trace.outbound_headers(SpanHandle::Noop, "any.test", &PropagationTargets::default());
        assert_eq!(headers.len(), 1);
        assert!(headers[0].1.starts_with(&trace.trace_id().to_string()));
    }

    #[test]
    fn test_event_context_tracks_current_span() {
        let mut trace = sampled();
        let root = start(&mut trace);
        let child = trace.start_child(root, "db", "a").unwrap();
        let ctx = trace.event_context();
        assert_eq!(ctx.span_id, child.span_id().unwrap().to_string());
        assert_eq!(ctx.trace_id, trace.trace_id().to_string());
    }
}
