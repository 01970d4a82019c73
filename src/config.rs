//! Runtime configuration.
//!
//! Settings are read from the process environment, after loading a
//! `.env` file from the working directory when one exists.

use crate::explain::ExplainerKind;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_DISCLAIMER: &str = "NOTICE: these figures are provided for information only and the tool is still under development. \
They may be inaccurate or miss details of your situation. This service is not official tax advice and does not replace a professional accountant. \
You remain responsible for paying your taxes correctly and on time. Always check against official sources (the Tax Code of the Republic of Kazakhstan, kgd.gov.kz) or consult a specialist.";

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub rates: RatesConfig,
    pub explainer: ExplainerKind,
    pub disclaimer: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SALYQ_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match lookup("SALYQ_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => 8080,
        };

        let log_level = lookup("SALYQ_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let table_dir = lookup("SALYQ_RATE_TABLE_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        let default_year = lookup("SALYQ_FISCAL_YEAR")
            .map(|raw| {
                raw.trim()
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidYear(raw))
            })
            .transpose()?;

        let explainer = match lookup("SALYQ_EXPLAINER") {
            Some(raw) => ExplainerKind::parse(&raw).ok_or(ConfigError::InvalidExplainer(raw))?,
            None => ExplainerKind::Template,
        };

        let disclaimer = lookup("SALYQ_DISCLAIMER")
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DISCLAIMER.to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            rates: RatesConfig {
                table_dir,
                default_year,
            },
            explainer,
            disclaimer,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost {
                host: self.host.clone(),
                source,
            })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where rate tables come from and which year applies by default.
#[derive(Debug, Clone, Default)]
pub struct RatesConfig {
    pub table_dir: Option<PathBuf>,
    pub default_year: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SALYQ_PORT must be a valid u16, got {0:?}")]
    InvalidPort(String),
    #[error("SALYQ_HOST must parse to an IPv4 or IPv6 address, got {host:?}")]
    InvalidHost {
        host: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("SALYQ_FISCAL_YEAR must be a year such as 2024, got {0:?}")]
    InvalidYear(String),
    #[error("SALYQ_EXPLAINER must be one of template, disabled; got {0:?}")]
    InvalidExplainer(String),
}
