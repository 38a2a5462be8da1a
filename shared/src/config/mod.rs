//! Configuration for the Raven relay.
//!
//! Settings are stored as JSON and can be overridden from the environment at
//! deployment time.

pub mod overrides;
pub mod proxy;
pub mod settings;

pub use overrides::EnvOverrides;
pub use proxy::ProxySettings;
pub use settings::{Settings, SettingsError};
