//! Runtime configuration.
//!
//! Values come from an optional JSON file named by `RGA_CONFIG`, then from
//! individual environment variables, then from the defaults below.

use std::env;
use std::net::SocketAddr;

use serde::Deserialize;

use crate::causal::mailbox::DEFAULT_SYNC_BATCH_SIZE;
use crate::error::{Error, Result};

/// Settings shared by the relay binary and replica sessions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the relay server listens on
    pub bind_addr: SocketAddr,
    /// Operations per history sync batch
    pub sync_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8443)),
            sync_batch_size: DEFAULT_SYNC_BATCH_SIZE,
        }
    }
}

impl Config {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()
    }

    /// Loads `RGA_CONFIG` (if set) and applies `RGA_BIND_ADDR`, `PORT` and
    /// `RGA_SYNC_BATCH_SIZE` on top.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var("RGA_CONFIG") {
            Ok(path) => Self::from_json(&std::fs::read_to_string(path)?)?,
            Err(_) => Config::default(),
        };

        if let Ok(addr) = env::var("RGA_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|e| Error::Config(format!("RGA_BIND_ADDR={addr}: {e}")))?;
        } else if let Ok(port) = env::var("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|e| Error::Config(format!("PORT={port}: {e}")))?;
            config.bind_addr.set_port(port);
        }

        if let Ok(size) = env::var("RGA_SYNC_BATCH_SIZE") {
            config.sync_batch_size = size
                .parse()
                .map_err(|e| Error::Config(format!("RGA_SYNC_BATCH_SIZE={size}: {e}")))?;
        }

        config.validate()
    }

    pub fn with_sync_batch_size(mut self, sync_batch_size: usize) -> Self {
        self.sync_batch_size = sync_batch_size;
        self
    }

    fn validate(self) -> Result<Self> {
        if self.sync_batch_size == 0 {
            return Err(Error::Config("sync_batch_size must be positive".into()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr.port(), 8443);
        assert_eq!(config.sync_batch_size, 1000);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"sync_batch_size": 50}"#).unwrap();
        assert_eq!(config.sync_batch_size, 50);
        assert_eq!(config.bind_addr, Config::default().bind_addr);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = Config::from_json(r#"{"sync_batch_size": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
