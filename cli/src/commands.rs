//! Command implementations.
//!
//! Every command is one unit of work: it opens its own scope, optionally
//! runs inside a `console.command` transaction, and flushes what it captured
//! before returning.

use anyhow::{bail, ensure, Context, Result};
use chrono::Utc;
use shared::client::{Client, Scope};
use shared::models::{
    CheckIn, CheckInStatus, EventId, ExceptionInfo, Level, LogLevel, Severity, SpanStatus,
    TelemetryEvent, TransactionSource,
};
use shared::trace::TransactionContext;
use std::sync::Arc;
use std::time::Instant;

/// Origin of spans created by commands.
const ORIGIN: &str = "auto.console";

/// A command ready to run against a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a message event.
    Message {
        /// Message text.
        message: String,
        /// Event severity.
        severity: Severity,
    },
    /// Send a structured log item.
    Log {
        /// Log body.
        message: String,
        /// Log severity.
        level: LogLevel,
    },
    /// Report a cron run as started and finished.
    CheckIn {
        /// Monitor slug.
        slug: Option<String>,
    },
}

impl Command {
    /// Name of the command as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "capture-message",
            Self::Log { .. } => "capture-log",
            Self::CheckIn { .. } => "check-in",
        }
    }
}

/// Runs `command` in its own scope and returns the id of what was sent.
///
/// # Errors
///
/// Returns an error if nothing could be delivered.
pub async fn run(client: &Arc<Client>, command: &Command) -> Result<EventId> {
    let mut scope = client.cli_scope();
    if client.settings().cli_tracing {
        let ctx = TransactionContext::new(format!("raven {}", command.name()), "console.command")
            .with_source(TransactionSource::Task)
            .with_origin(ORIGIN);
        if let Err(e) = scope.start_transaction(ctx) {
            tracing::warn!(error = %e, "Failed to start command transaction");
        }
    }

    let result = execute(client, &mut scope, command).await;

    if let Err(e) = &result {
        if client.settings().cli_error_handler {
            let text = format!("{e:#}");
            scope.capture_event(
                TelemetryEvent::message(Level::Error, text.clone())
                    .with_exception(ExceptionInfo::new("CommandError", text)),
            );
        }
    }

    let exit_code = i32::from(result.is_err());
    let root = scope.trace().transaction();
    if let Some(span) = scope.trace_mut().span_mut(root) {
        span.tags
            .insert("command.exit_code".to_string(), exit_code.to_string());
    }
    let status = if result.is_ok() {
        SpanStatus::Ok
    } else {
        SpanStatus::Error
    };
    scope.finish_transaction(status);

    let outbox = scope.drain();
    if !outbox.is_empty() {
        let report = outbox.send(client).await;
        tracing::debug!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Command telemetry flushed"
        );
    }
    result
}

async fn execute(client: &Arc<Client>, scope: &mut Scope, command: &Command) -> Result<EventId> {
    match command {
        Command::Message { message, severity } => {
            let start = Utc::now();
            let id = scope.capture_message(message, *severity);
            let report = scope.drain().send(client).await;
            scope.record_child(
                "sentry.capture",
                &format!("{severity}: {message}"),
                start,
                Utc::now(),
            );
            ensure!(report.is_delivered(id), "Send failed");
            Ok(id)
        }
        Command::Log { message, level } => {
            if !client.settings().cli_enable_logs {
                tracing::warn!("Structured logs are disabled, no logs will be sent");
            }
            let start = Utc::now();
            let queued = scope.capture_log(*level, message);
            let report = scope.drain().send(client).await;
            scope.record_child(
                "sentry.log",
                &format!("{level}: {message}"),
                start,
                Utc::now(),
            );
            report
                .delivered
                .first()
                .copied()
                .filter(|_| queued)
                .context("Send failed")
        }
        Command::CheckIn { slug } => {
            let Some(slug) = slug.as_deref().or(client.settings().cron_monitor_id.as_deref())
            else {
                bail!("No monitor slug given and no cron monitor configured");
            };
            let started = Instant::now();
            let open = CheckIn::in_progress(slug);
            let id = scope.capture_check_in(open.clone());
            let report = scope.drain().send(client).await;
            ensure!(report.is_delivered(id), "Check-in failed");

            scope.capture_check_in(open.close(CheckInStatus::Ok, started.elapsed().as_secs_f64()));
            let report = scope.drain().send(client).await;
            ensure!(report.is_delivered(id), "Check-in failed");
            Ok(id)
        }
    }
}
