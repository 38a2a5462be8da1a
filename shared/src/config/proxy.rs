//! Outbound proxy selection.

use crate::dsn::Dsn;
use serde::{Deserialize, Serialize};

/// Proxy servers per scheme plus a bypass list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Proxy for `http` destinations.
    pub http: Option<String>,
    /// Proxy for `https` destinations.
    pub https: Option<String>,
    /// Hosts that are contacted directly.
    pub no: Vec<String>,
}

impl ProxySettings {
    /// Returns the proxy to reach the collector named by `dsn`, if any.
    #[must_use]
    pub fn for_dsn(&self, dsn: &Dsn) -> Option<&str> {
        let proxy = match dsn.scheme() {
            "http" => self.http.as_deref(),
            "https" => self.https.as_deref(),
            _ => None,
        }
        .filter(|p| !p.is_empty())?;

        if self.no.iter().any(|host| host.eq_ignore_ascii_case(dsn.host())) {
            return None;
        }
        Some(proxy)
    }
}
