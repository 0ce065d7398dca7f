use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;

use crate::evaluation::{EngineConfig, MatrixConfig, OverridePolicy, ReadinessConfig};

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
    pub scoring: ScoringConfig,
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

        let scoring = ScoringConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scoring,
        })
    }

    pub fn engine(&self) -> EngineConfig {
        self.scoring.engine()
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Engine thresholds, all overridable through `SCORING_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub matrix_ttl_minutes: i64,
    pub variance_low: f64,
    pub variance_high: f64,
    pub must_have_min_pass: f64,
    pub ready_threshold: f64,
    pub conditional_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let overrides = OverridePolicy::default();
        let readiness = ReadinessConfig::default();
        Self {
            matrix_ttl_minutes: 60,
            variance_low: overrides.variance_low,
            variance_high: overrides.variance_high,
            must_have_min_pass: overrides.must_have_min_pass,
            ready_threshold: readiness.ready_threshold,
            conditional_threshold: readiness.conditional_threshold,
        }
    }
}

impl ScoringConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let matrix_ttl_minutes = match env::var("SCORING_MATRIX_TTL_MINUTES") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|minutes| *minutes > 0)
                .ok_or(ConfigError::InvalidNumber {
                    key: "SCORING_MATRIX_TTL_MINUTES",
                    value: raw,
                })?,
            Err(_) => defaults.matrix_ttl_minutes,
        };

        let config = Self {
            matrix_ttl_minutes,
            variance_low: number_var("SCORING_VARIANCE_LOW", defaults.variance_low)?,
            variance_high: number_var("SCORING_VARIANCE_HIGH", defaults.variance_high)?,
            must_have_min_pass: number_var(
                "SCORING_MUST_HAVE_MIN_PASS",
                defaults.must_have_min_pass,
            )?,
            ready_threshold: number_var("SCORING_READY_THRESHOLD", defaults.ready_threshold)?,
            conditional_threshold: number_var(
                "SCORING_CONDITIONAL_THRESHOLD",
                defaults.conditional_threshold,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = self.engine();
        engine
            .overrides
            .validate()
            .and_then(|_| engine.readiness.validate())
            .map_err(ConfigError::InvalidThresholds)
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            matrix: MatrixConfig {
                staleness_window: Duration::minutes(self.matrix_ttl_minutes),
            },
            overrides: OverridePolicy {
                variance_low: self.variance_low,
                variance_high: self.variance_high,
                must_have_min_pass: self.must_have_min_pass,
            },
            readiness: ReadinessConfig {
                ready_threshold: self.ready_threshold,
                conditional_threshold: self.conditional_threshold,
                ..ReadinessConfig::default()
            },
        }
    }
}

fn number_var(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or(ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidThresholds(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a positive number, got '{value}'")
            }
            ConfigError::InvalidThresholds(detail) => {
                write!(f, "invalid scoring thresholds: {detail}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidThresholds(_) => None,
        }
    }
}
