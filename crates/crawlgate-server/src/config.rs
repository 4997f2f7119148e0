use std::fmt;
use std::str::FromStr;

use crawlgate_core::{AppError, GatewayConfig};

/// Which crawler the server drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Plain reqwest fetch, no JavaScript.
    #[default]
    Http,
    /// Headless Chromium. Needs the `browser` feature.
    Browser,
}

impl FromStr for Backend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "browser" => Ok(Self::Browser),
            other => Err(AppError::ConfigError(format!(
                "Unknown backend '{other}' (expected 'http' or 'browser')"
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Browser => f.write_str("browser"),
        }
    }
}

/// Process-level settings for the gateway server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_level: String,
    pub backend: Backend,
    pub browser_headless: bool,
    pub browser_verbose: bool,
    pub gateway: GatewayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            backend: Backend::default(),
            browser_headless: true,
            browser_verbose: false,
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from environment variables.
    ///
    /// - `CRAWLGATE_HOST` (defaults to `0.0.0.0`)
    /// - `CRAWLGATE_PORT` (defaults to 8000)
    /// - `CRAWLGATE_LOG_LEVEL` (defaults to `info`)
    /// - `CRAWLGATE_BACKEND` `http` or `browser` (defaults to `http`)
    /// - `CRAWLGATE_BROWSER_HEADLESS` (defaults to true)
    /// - `CRAWLGATE_BROWSER_VERBOSE` (defaults to false)
    /// - plus everything [`GatewayConfig::from_env`] reads
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let port = match lookup("CRAWLGATE_PORT") {
            None => defaults.port,
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                AppError::ConfigError(format!("Invalid CRAWLGATE_PORT '{raw}': must be a port number"))
            })?,
        };

        let backend = match lookup("CRAWLGATE_BACKEND") {
            None => defaults.backend,
            Some(raw) => raw.parse()?,
        };

        Ok(Self {
            host: lookup("CRAWLGATE_HOST").unwrap_or(defaults.host),
            port,
            log_level: lookup("CRAWLGATE_LOG_LEVEL")
                .map(|level| level.to_ascii_lowercase())
                .unwrap_or(defaults.log_level),
            backend,
            browser_headless: parse_bool(
                "CRAWLGATE_BROWSER_HEADLESS",
                lookup("CRAWLGATE_BROWSER_HEADLESS"),
                defaults.browser_headless,
            )?,
            browser_verbose: parse_bool(
                "CRAWLGATE_BROWSER_VERBOSE",
                lookup("CRAWLGATE_BROWSER_VERBOSE"),
                defaults.browser_verbose,
            )?,
            gateway: GatewayConfig::from_lookup(&lookup)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(name: &str, raw: Option<String>, default: bool) -> Result<bool, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::ConfigError(format!(
            "Invalid {name} '{raw}': expected true or false"
        ))),
    }
}
