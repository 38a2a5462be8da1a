//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use shared::client::{Client, ClientError};
use shared::config::Settings;
use shared::transport::{HttpTransport, HttpTransportConfig, Transport, TransportError};
use shared::tunnel::Tunnel;
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Holds the telemetry client (absent when telemetry is disabled or
/// misconfigured) and the envelope tunnel.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The telemetry client.
    client: Option<Arc<Client>>,
    /// The browser envelope tunnel.
    tunnel: Arc<Tunnel>,
}

impl AppState {
    /// Creates the state for production use, delivering over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the tunnel's HTTP client cannot be built.
    pub fn from_settings(settings: Settings) -> Result<Self, TransportError> {
        let public_dsn = public_dsn(&settings);
        let tunnel_transport = HttpTransport::new(&HttpTransportConfig {
            timeout: settings.timeout(),
            proxy: public_dsn
                .as_ref()
                .and_then(|dsn| settings.proxy.for_dsn(dsn))
                .map(ToString::to_string),
        })?;
        let tunnel = Tunnel::new(
            public_dsn,
            Arc::new(tunnel_transport),
            settings.http_compression,
        );
        Ok(Self {
            client: Client::init(settings),
            tunnel: Arc::new(tunnel),
        })
    }

    /// Creates the state with one transport for both the client and the
    /// tunnel.
    ///
    /// This is useful for development and testing.
    #[must_use]
    pub fn with_transport(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        let tunnel = Tunnel::new(
            public_dsn(&settings),
            Arc::clone(&transport),
            settings.http_compression,
        );
        let client = match Client::with_transport(settings, transport) {
            Ok(client) => Some(Arc::new(client)),
            Err(ClientError::MissingDsn) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Telemetry client disabled");
                None
            }
        };
        Self {
            client,
            tunnel: Arc::new(tunnel),
        }
    }

    /// Returns the telemetry client, if telemetry is enabled.
    #[must_use]
    pub fn client(&self) -> Option<&Arc<Client>> {
        self.client.as_ref()
    }

    /// Returns the envelope tunnel.
    #[must_use]
    pub fn tunnel(&self) -> &Tunnel {
        self.tunnel.as_ref()
    }
}

fn public_dsn(settings: &Settings) -> Option<shared::dsn::Dsn> {
    settings.public_dsn().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring invalid public DSN");
        None
    })
}
