//! API server configuration.
//!
//! - `ALMA_API_BIND`: bind host (default: 0.0.0.0)
//! - `PORT` or `ALMA_API_PORT`: bind port (default: 3000), `PORT` wins
//! - `ALMA_LOG_FORMAT`: `json` for structured output, anything else for text

use std::net::SocketAddr;

use crate::error::{ApiError, ApiResult};

pub const ENV_API_BIND: &str = "ALMA_API_BIND";
pub const ENV_PORT: &str = "PORT";
pub const ENV_API_PORT: &str = "ALMA_API_PORT";
pub const ENV_LOG_FORMAT: &str = "ALMA_LOG_FORMAT";

const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_PORT: &str = "3000";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_host: String,
    /// Raw port value, validated by [`ApiConfig::socket_addr`].
    pub port: String,
    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            bind_host: lookup(ENV_API_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: lookup(ENV_PORT)
                .or_else(|| lookup(ENV_API_PORT))
                .unwrap_or_else(|| DEFAULT_PORT.to_string()),
            log_format: lookup(ENV_LOG_FORMAT)
                .map(|raw| LogFormat::parse(&raw))
                .unwrap_or_default(),
        }
    }

    /// Resolve the listen address.
    pub fn socket_addr(&self) -> ApiResult<SocketAddr> {
        let port = self.port.trim().parse::<u16>().map_err(|_| {
            ApiError::invalid_input(format!("Invalid port value: {}", self.port))
        })?;

        let addr = format!("{}:{}", self.bind_host, port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }
}
