//! Process configuration.

use std::net::SocketAddr;

pub const HOST_VAR: &str = "HTTP_HOST";
pub const PORT_VAR: &str = "HTTP_PORT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a port number, got `{value}`")]
    InvalidPort { var: &'static str, value: String },

    #[error("`{host}:{port}` is not a valid listen address")]
    InvalidAddr { host: String, port: u16 },
}

/// Where the HTTP server listens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: DEFAULT_HOST.to_owned(), port: DEFAULT_PORT }
    }
}

impl ServerConfig {
    /// Reads `HTTP_HOST` and `HTTP_PORT`, falling back to `0.0.0.0:5000`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup(HOST_VAR).filter(|h| !h.is_empty()) {
            config.host = host;
        }
        if let Some(port) = lookup(PORT_VAR).filter(|p| !p.is_empty()) {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort { var: PORT_VAR, value: port })?;
        }

        Ok(config)
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        // Bracket bare IPv6 hosts so `::1` parses.
        let joined = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        };
        joined
            .parse()
            .map_err(|_| ConfigError::InvalidAddr { host: self.host.clone(), port: self.port })
    }
}
