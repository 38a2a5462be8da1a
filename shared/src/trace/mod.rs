//! Distributed tracing for one unit of work.
//!
//! - [`sampler`] - Transaction sampling
//! - [`propagation`] - `sentry-trace`, `traceparent` and `baggage` headers
//! - [`context`] - The per-unit span stack

pub mod context;
pub mod propagation;
pub mod sampler;

pub use context::{
    FinishedTransaction, SpanHandle, TraceContext, TraceError, TraceSettings, TraceState,
    TransactionContext,
};
pub use propagation::{
    DynamicSamplingContext, PropagationContext, PropagationTargets, BAGGAGE_HEADER,
    SENTRY_TRACE_HEADER, TRACEPARENT_HEADER,
};
pub use sampler::Sampler;
