use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::marketplace::rate_limit::DEFAULT_MAX_TRACKED_KEYS;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub marketplace: MarketplaceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let marketplace = MarketplaceConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            marketplace,
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
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Business dials for the ledger and the lead intake endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceConfig {
    /// Balance at or below which a company is told to top up.
    pub low_credit_threshold: Decimal,
    pub submissions_per_window: u32,
    pub submission_window: Duration,
    /// Hard cap on distinct client keys the submission limiter keeps windows for.
    pub max_tracked_clients: usize,
}

pub const DEFAULT_LOW_CREDIT_THRESHOLD: Decimal = Decimal::TEN;

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            low_credit_threshold: DEFAULT_LOW_CREDIT_THRESHOLD,
            submissions_per_window: 5,
            submission_window: Duration::from_secs(3600),
            max_tracked_clients: DEFAULT_MAX_TRACKED_KEYS,
        }
    }
}

impl MarketplaceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let low_credit_threshold = match env::var("LOW_CREDIT_THRESHOLD") {
            Ok(raw) => Decimal::from_str(raw.trim())
                .ok()
                .filter(|value| !value.is_sign_negative())
                .ok_or(ConfigError::InvalidLowCreditThreshold)?,
            Err(_) => defaults.low_credit_threshold,
        };

        let submissions_per_window = match env::var("LEAD_SUBMISSIONS_PER_WINDOW") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidRateLimit("LEAD_SUBMISSIONS_PER_WINDOW"))?,
            Err(_) => defaults.submissions_per_window,
        };

        let submission_window = match env::var("LEAD_SUBMISSION_WINDOW_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidRateLimit("LEAD_SUBMISSION_WINDOW_SECS"))?,
            Err(_) => defaults.submission_window,
        };

        let max_tracked_clients = match env::var("LEAD_RATE_LIMIT_MAX_CLIENTS") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidRateLimit("LEAD_RATE_LIMIT_MAX_CLIENTS"))?,
            Err(_) => defaults.max_tracked_clients,
        };

        Ok(Self {
            low_credit_threshold,
            submissions_per_window,
            submission_window,
            max_tracked_clients,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLowCreditThreshold,
    InvalidRateLimit(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLowCreditThreshold => {
                write!(f, "LOW_CREDIT_THRESHOLD must be a non-negative decimal")
            }
            ConfigError::InvalidRateLimit(variable) => {
                write!(f, "{variable} must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLowCreditThreshold
            | ConfigError::InvalidRateLimit(_) => None,
        }
    }
}
