//! Layered configuration for Fleetvest services: built-in defaults, an
//! optional TOML file, then `FLEETVEST_*` environment overrides.

use std::net::SocketAddr;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use fleetvest_core::Policy;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid listen address {addr}: {reason}")]
    ListenAddr { addr: String, reason: String },
    #[error("webhook secret is not set (gateway.secret or FLEETVEST_GATEWAY__SECRET)")]
    MissingSecret,
}

/// Top-level service configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub policy: Policy,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite vault file.
    pub path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GatewayConfig {
    /// Listen address, e.g. `127.0.0.1:8787`.
    pub listen: String,
    pub webhook_path: String,
    /// Shared secret for the provider's HMAC signature. Usually supplied
    /// via the environment rather than the file.
    #[serde(default)]
    pub secret: String,
}

impl GatewayConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen.parse().map_err(|err| ConfigError::ListenAddr {
            addr: self.listen.clone(),
            reason: format!("{err}"),
        })
    }
}

impl AppConfig {
    /// Load configuration, layering `path` (when given) and the
    /// environment over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("database.path", "fleetvest.db")?
            .set_default("gateway.listen", "127.0.0.1:8787")?
            .set_default("gateway.webhook_path", "/webhooks/paystack")?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let config = builder
            .add_source(Environment::with_prefix("FLEETVEST").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// As [`load`], but fails when no webhook secret was provided. Use
    /// this on paths that actually start the gateway.
    pub fn load_for_gateway(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        if config.gateway.secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.database.path, "fleetvest.db");
        assert_eq!(config.gateway.webhook_path, "/webhooks/paystack");
        assert!(config.gateway.listen_addr().is_ok());
        assert_eq!(config.policy.term_months, 12);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
path = "/var/lib/fleetvest/vault.db"

[gateway]
listen = "0.0.0.0:9000"
webhook_path = "/hooks/pay"
secret = "whsec_file"

[policy]
min_withdrawal = "250"
"#
        )
        .unwrap();

        let config = AppConfig::load_for_gateway(Some(file.path())).unwrap();
        assert_eq!(config.database.path, "/var/lib/fleetvest/vault.db");
        assert_eq!(config.gateway.secret, "whsec_file");
        assert_eq!(
            config.gateway.listen_addr().unwrap().port(),
            9000
        );
        assert_eq!(config.policy.min_withdrawal.to_string(), "250");
    }

    #[test]
    fn gateway_load_requires_a_secret() {
        let err = AppConfig::load_for_gateway(None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret));
    }
}
