//! Service configuration
//!
//! Values come from `RBAC_`-prefixed environment variables, e.g.
//! `RBAC_BIND_ADDRESS=127.0.0.1:8080`. Database settings live in
//! [`common::database::DatabaseConfig`].

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds to (default: `0.0.0.0:3002`)
    pub bind_address: String,
    /// Per-request timeout in seconds (default: 30)
    pub request_timeout_secs: u64,
    /// Apply pending migrations at start-up (default: true)
    pub run_migrations: bool,
}

impl ServerConfig {
    /// Load the configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("bind_address", "0.0.0.0:3002")?
            .set_default("request_timeout_secs", 30)?
            .set_default("run_migrations", true)?
            .add_source(Environment::with_prefix("RBAC").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
