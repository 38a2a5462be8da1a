//! Environment overrides for deployment-time injection.

/// Environment variable overriding both DSNs.
pub const DSN_VAR: &str = "SENTRY_DSN";
/// Environment variable overriding the environment name.
pub const ENVIRONMENT_VAR: &str = "SENTRY_ENVIRONMENT";
/// Environment variable overriding the release.
pub const RELEASE_VAR: &str = "SENTRY_RELEASE";

/// Values that take precedence over stored settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// Replaces `client_key` and `public_dsn`.
    pub dsn: Option<String>,
    /// Replaces `environment`.
    pub environment: Option<String>,
    /// Replaces `release`.
    pub release: Option<String>,
}

impl EnvOverrides {
    /// Reads the overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the overrides through `lookup`. Empty values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            dsn: get(DSN_VAR),
            environment: get(ENVIRONMENT_VAR),
            release: get(RELEASE_VAR),
        }
    }
}
