//! Raven CLI
//!
//! Sends test messages, structured log items and cron check-ins through the
//! telemetry client, using the same settings file as the relay server.
//!
//! # Usage
//!
//! ```bash
//! raven --help
//! raven capture-message --level error "Mic check."
//! raven capture-log --level warn
//! raven check-in nightly-import
//! ```

#![deny(unsafe_code)]

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::Command;
use shared::client::Client;
use shared::config::{EnvOverrides, Settings};
use shared::models::{LogLevel, Severity};
use std::path::PathBuf;
use std::sync::Arc;

/// Raven CLI - send telemetry to the configured collector
#[derive(Parser)]
#[command(name = "raven")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (JSON)
    #[arg(short, long, env = "RAVEN_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message event
    CaptureMessage {
        /// The message text
        #[arg(default_value = "Test message from the raven CLI.")]
        message: String,

        /// The message level (debug, info, warning, error, fatal)
        #[arg(short, long, default_value = "info")]
        level: Severity,
    },
    /// Send a structured log item
    CaptureLog {
        /// The log message text
        #[arg(default_value = "Test log from the raven CLI.")]
        message: String,

        /// The log level (trace, debug, info, warn, error, fatal)
        #[arg(short, long, default_value = "info")]
        level: LogLevel,
    },
    /// Report a cron run to a monitor
    CheckIn {
        /// Monitor slug, defaults to the configured cron monitor
        slug: Option<String>,
    },
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::CaptureMessage { message, level } => Self::Message {
                message,
                severity: level,
            },
            Commands::CaptureLog { message, level } => Self::Log { message, level },
            Commands::CheckIn { slug } => Self::CheckIn { slug },
        }
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?,
        None => Settings::default(),
    };
    Ok(settings.with_overrides(&EnvOverrides::from_env()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_ref())?;
    let client = Arc::new(Client::try_new(settings).context("Telemetry client not available")?);

    let command = Command::from(cli.command);
    let id = commands::run(&client, &command)
        .await
        .with_context(|| format!("raven {} failed", command.name()))?;

    println!("{id}");
    Ok(())
}
