//! Server configuration, read once from the environment at startup.
//! The encryption key is redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use ghost_crypto::{EncryptionKey, KeyError};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

/// 30 minutes.
pub const DEFAULT_ROOM_TTL_SECS: u64 = 1800;

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 1;

#[derive(Clone)]
pub struct Config {
    pub encryption_key: EncryptionKey,
    pub host: String,
    pub port: u16,
    pub room_ttl_secs: u64,
    pub sweep_interval: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("encryption_key", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("room_ttl_secs", &self.room_ttl_secs)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("GHOST_ENCRYPTION_KEY must be 64 hex characters: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Invalid bind address {0}")]
    InvalidAddress(String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let raw_key = vars
            .get("GHOST_ENCRYPTION_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("GHOST_ENCRYPTION_KEY".to_string()))?;
        let encryption_key = EncryptionKey::from_hex(raw_key)?;

        let host = vars
            .get("GHOST_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = parse_or(vars, "GHOST_PORT", DEFAULT_PORT)?;

        let room_ttl_secs = parse_or(vars, "GHOST_ROOM_TTL_SECS", DEFAULT_ROOM_TTL_SECS)?;
        if room_ttl_secs == 0 {
            return Err(invalid("GHOST_ROOM_TTL_SECS", "must be greater than zero"));
        }

        let sweep_secs = parse_or(vars, "GHOST_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
        if sweep_secs == 0 {
            return Err(invalid("GHOST_SWEEP_INTERVAL_SECS", "must be greater than zero"));
        }

        Ok(Self {
            encryption_key,
            host,
            port,
            room_ttl_secs,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }

    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }
}

fn parse_or<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match vars.get(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
            invalid(name, &format!("expected a number, got '{}': {}", raw, e))
        }),
        None => Ok(default),
    }
}

fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
