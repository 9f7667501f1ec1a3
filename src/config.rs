/* src/config.rs */

use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_GEO_URL: &str = "http://ip-api.com/json";
pub const DEFAULT_PUBLIC_IP_URL: &str = "https://api.ipify.org?format=json";
pub const DEFAULT_LOG_FILTER: &str = "iplog=info";

/// How `/log-ip` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// `Your IP: <address>` as plain text.
    #[default]
    Plain,
    /// The geolocation record for the address, as JSON.
    Enriched,
}

impl std::str::FromStr for ResponseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "enriched" => Ok(Self::Enriched),
            other => Err(Error::Config(format!("unknown IPLOG_MODE: {}", other))),
        }
    }
}

/// Logging setup, applied once at startup and handed to the request handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directives.
    pub filter: String,
    /// Microsecond precision for timestamps, otherwise seconds.
    pub micros: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            micros: true,
        }
    }
}

/// Service configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Listen port.
    pub port: u16,
    pub mode: ResponseMode,
    /// Geolocation base URL; the address is appended as a path segment.
    pub geo_url: String,
    pub public_ip_url: String,
    /// Outbound request timeout. `None` leaves the transport default in place.
    pub http_timeout: Option<Duration>,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            mode: ResponseMode::default(),
            geo_url: DEFAULT_GEO_URL.to_string(),
            public_ip_url: DEFAULT_PUBLIC_IP_URL.to_string(),
            http_timeout: None,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match var("PORT") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid PORT: {}", v)))?,
            None => defaults.port,
        };

        let mode = match var("IPLOG_MODE") {
            Some(v) => v.parse()?,
            None => defaults.mode,
        };

        let geo_url = var("IPLOG_GEO_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.geo_url);

        let public_ip_url = var("IPLOG_PUBLIC_IP_URL").unwrap_or(defaults.public_ip_url);

        let http_timeout = match var("IPLOG_HTTP_TIMEOUT_SECS") {
            Some(v) => Some(Duration::from_secs(v.trim().parse().map_err(|_| {
                Error::Config(format!("invalid IPLOG_HTTP_TIMEOUT_SECS: {}", v))
            })?)),
            None => None,
        };

        let micros = var("IPLOG_LOG_MICROS")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(defaults.log.micros);

        let filter = var("RUST_LOG").unwrap_or(defaults.log.filter);

        Ok(Self {
            port,
            mode,
            geo_url,
            public_ip_url,
            http_timeout,
            log: LogConfig { filter, micros },
        })
    }
}
