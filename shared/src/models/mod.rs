//! Data models for the Raven relay.
//!
//! This module contains the telemetry events, spans, log items and the
//! severity levels they are classified by.

pub mod event;
pub mod level;
pub mod log_item;
pub mod span;

pub use event::{
    EventId, EventMessage, EventTraceContext, ExceptionInfo, Mechanism, RequestInfo, StackFrame,
    Stacktrace, TelemetryEvent, UserContext,
};
pub use level::{Level, LevelSet, LogLevel, RawLevel, Severity};
pub use log_item::{CheckIn, CheckInStatus, LogItem};
pub use span::{IdParseError, Span, SpanId, SpanStatus, TraceId, TransactionSource};
