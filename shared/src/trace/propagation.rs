//! Trace propagation headers.
//!
//! Outbound calls carry a `sentry-trace` header
//! (`{trace_id}-{span_id}[-{sampled}]`) and a `baggage` header holding the
//! dynamic sampling context as `sentry-` prefixed entries. Inbound requests
//! may carry either `sentry-trace` or a W3C `traceparent`.

use crate::models::{SpanId, TraceId};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::BTreeMap;

/// Header carrying trace id, span id and sampled flag.
pub const SENTRY_TRACE_HEADER: &str = "sentry-trace";
/// W3C trace context header.
pub const TRACEPARENT_HEADER: &str = "traceparent";
/// Header carrying the dynamic sampling context.
pub const BAGGAGE_HEADER: &str = "baggage";

const BAGGAGE_PREFIX: &str = "sentry-";
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b';')
    .add(b',')
    .add(b'=')
    .add(b'%')
    .add(b'\\');

/// Trace identity received from an upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationContext {
    /// Trace id of the remote trace.
    pub trace_id: TraceId,
    /// Span id of the remote caller.
    pub parent_span_id: SpanId,
    /// Sampling decision of the remote caller, if it made one.
    pub sampled: Option<bool>,
}

impl PropagationContext {
    /// Parses a `sentry-trace` header.
    ///
    /// # Example
    ///
    /// ```
    /// use shared::trace::PropagationContext;
    ///
    /// let ctx = PropagationContext::from_sentry_trace(
    ///     "771a43a4192642f0b136d5159a501700-1234567890abcdef-1",
    /// ).unwrap();
    /// assert_eq!(ctx.sampled, Some(true));
    /// ```
    #[must_use]
    pub fn from_sentry_trace(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let trace_id = TraceId::from_hex(parts.next()?).ok()?;
        let parent_span_id = SpanId::from_hex(parts.next()?).ok()?;
        let sampled = match parts.next() {
            None => None,
            Some("1") => Some(true),
            Some("0") => Some(false),
            Some(_) => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            trace_id,
            parent_span_id,
            sampled,
        })
    }

    /// Parses a W3C `traceparent` header (`00-{trace}-{span}-{flags}`).
    #[must_use]
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.trim().split('-').collect();
        if parts.len() < 4 {
            return None;
        }
        let version = u8::from_str_radix(parts[0], 16).ok()?;
        if version == 0xff || (version == 0 && parts.len() != 4) {
            return None;
        }
        if parts[1..3].iter().any(|p| p.chars().any(|c| c.is_ascii_uppercase())) {
            return None;
        }
        let trace_id = TraceId::from_hex(parts[1]).ok()?;
        let parent_span_id = SpanId::from_hex(parts[2]).ok()?;
        let flags = u8::from_str_radix(parts[3], 16).ok()?;
        Some(Self {
            trace_id,
            parent_span_id,
            sampled: Some(flags & 1 == 1),
        })
    }

    /// Picks the inbound trace from request headers, preferring
    /// `sentry-trace` over `traceparent`.
    #[must_use]
    pub fn from_headers(sentry_trace: Option<&str>, traceparent: Option<&str>) -> Option<Self> {
        sentry_trace
            .and_then(Self::from_sentry_trace)
            .or_else(|| traceparent.and_then(Self::from_traceparent))
    }
}

/// Formats a `sentry-trace` header value.
#[must_use]
pub fn sentry_trace_value(trace_id: TraceId, span_id: SpanId, sampled: Option<bool>) -> String {
    match sampled {
        Some(sampled) => format!("{trace_id}-{span_id}-{}", u8::from(sampled)),
        None => format!("{trace_id}-{span_id}"),
    }
}

/// The `sentry-` entries of a baggage header, keyed without the prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicSamplingContext {
    entries: BTreeMap<String, String>,
    frozen: bool,
}

impl DynamicSamplingContext {
    /// Creates an empty, mutable context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the `sentry-` entries of an inbound baggage header.
    ///
    /// The result is frozen: it is forwarded as received. Returns `None`
    /// when the header carries no `sentry-` entry.
    #[must_use]
    pub fn from_baggage(header: &str) -> Option<Self> {
        let entries: BTreeMap<String, String> = header
            .split(',')
            .filter_map(|member| {
                let (key, value) = member.split(';').next()?.split_once('=')?;
                let key = percent_decode_str(key.trim()).decode_utf8().ok()?;
                let key = key.strip_prefix(BAGGAGE_PREFIX)?.to_string();
                let value = percent_decode_str(value.trim()).decode_utf8().ok()?;
                Some((key, value.into_owned()))
            })
            .filter(|(k, _)| !k.is_empty())
            .collect();

        if entries.is_empty() {
            return None;
        }
        Some(Self {
            entries,
            frozen: true,
        })
    }

    /// Sets an entry unless the context is frozen. Empty values are skipped.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if !self.frozen && !value.is_empty() {
            self.entries.insert(key.to_string(), value);
        }
    }

    /// Returns an entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns true if the context came from upstream.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Returns the entries, keyed without prefix.
    #[must_use]
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Renders the context as a baggage header value.
    #[must_use]
    pub fn to_baggage(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| {
                format!(
                    "{BAGGAGE_PREFIX}{}={}",
                    utf8_percent_encode(k, FRAGMENT),
                    utf8_percent_encode(v, FRAGMENT)
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Hosts that may receive propagation headers.
///
/// Without a list, `sentry-trace` goes everywhere and `baggage` nowhere.
/// With a list, both go to listed hosts only. An empty list counts as no
/// list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationTargets(Option<Vec<String>>);

impl PropagationTargets {
    /// Creates the policy from the configured host list.
    #[must_use]
    pub fn new(hosts: Option<Vec<String>>) -> Self {
        Self(hosts.filter(|hosts| !hosts.is_empty()))
    }

    fn listed(&self, host: &str) -> bool {
        self.0
            .as_ref()
            .is_some_and(|hosts| hosts.iter().any(|h| h.eq_ignore_ascii_case(host)))
    }

    /// Returns true if `host` may receive the `sentry-trace` header.
    #[must_use]
    pub fn allows_trace(&self, host: &str) -> bool {
        self.0.is_none() || self.listed(host)
    }

    /// Returns true if `host` may receive the `baggage` header.
    #[must_use]
    pub fn allows_baggage(&self, host: &str) -> bool {
        self.listed(host)
    }
}
