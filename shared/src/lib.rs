//! Raven Relay Shared Library
//!
//! This crate forwards application errors, log records and performance
//! traces to a Sentry-compatible collector, and relays envelopes that
//! browsers send through the application.
//!
//! # Modules
//!
//! - [`models`] - Levels, events, spans, log items and check-ins
//! - [`config`] - Settings, environment overrides and proxy selection
//! - [`builder`] - Turns log records into events and log items
//! - [`filter`] - Suppression by channel, message and level
//! - [`rate_limit`] - Per-unit event cap
//! - [`trace`] - Span stack, sampling and header propagation
//! - [`envelope`] - Envelope wire format
//! - [`transport`] - Delivery to the collector
//! - [`tunnel`] - Relay of browser envelopes
//! - [`client`] - Process-wide client and per-unit scope
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use shared::builder::LogContext;
//! use shared::client::Client;
//! use shared::config::Settings;
//! use shared::models::Level;
//! use shared::transport::RecordingTransport;
//!
//! let settings = Settings {
//!     client_key: Some("https://key@sentry.test/1".to_string()),
//!     ..Settings::default()
//! };
//! let client = Arc::new(Client::with_transport(settings, Arc::new(RecordingTransport::new())).unwrap());
//! let mut scope = client.scope();
//!
//! let id = scope.log(Level::Error, "Payment @id failed", LogContext::channel("shop").with_placeholder("@id", 42));
//! assert!(id.is_some());
//! assert_eq!(scope.outbox().events()[0].message.formatted, "Payment 42 failed");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod builder;
pub mod client;
pub mod config;
pub mod debug_log;
pub mod dsn;
pub mod envelope;
pub mod filter;
pub mod models;
pub mod rate_limit;
pub mod trace;
pub mod transport;
pub mod tunnel;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
