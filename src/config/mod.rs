use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::scoring::{RegistryDefaults, ScoreBounds, ScoringSettings, TriggerPolicy};

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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scoring: ScoringConfig::from_env()?,
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

/// Scoring knobs, all hot-adjustable through the environment and the
/// optional JSON rules file.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub settings: ScoringSettings,
    /// JSON document holding the weight/decay/confidence tables and tier
    /// bands; reloaded on every run. Absent means built-in tables.
    pub rules_path: Option<PathBuf>,
}

impl ScoringConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = ScoringSettings::default();

        let lookback_days = parse_var("SCORING_LOOKBACK_DAYS", defaults.lookback_days)?;
        let dedup_window_hours = parse_var(
            "SCORING_DEDUP_WINDOW_HOURS",
            defaults.policy.dedup_window_hours,
        )?;
        let daily_increase_cap =
            parse_var("SCORING_DAILY_CAP", defaults.policy.daily_increase_cap)?;
        let floor = parse_var("SCORING_SCORE_FLOOR", defaults.bounds.floor)?;
        let ceiling = parse_var("SCORING_SCORE_CEILING", defaults.bounds.ceiling)?;
        let default_weight =
            parse_var("SCORING_DEFAULT_WEIGHT", defaults.defaults.default_weight)?;
        let fallback_confidence = parse_var(
            "SCORING_FALLBACK_CONFIDENCE",
            defaults.defaults.fallback_confidence,
        )?;

        let run_budget = match env::var("SCORING_RUN_BUDGET_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                    key: "SCORING_RUN_BUDGET_SECS",
                    value: raw.clone(),
                })?;
                Some(std::time::Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let rules_path = env::var("SCORING_RULES_PATH").ok().map(PathBuf::from);

        Ok(Self {
            settings: ScoringSettings {
                lookback_days,
                run_budget,
                policy: TriggerPolicy {
                    dedup_window_hours,
                    daily_increase_cap,
                },
                bounds: ScoreBounds { floor, ceiling },
                defaults: RegistryDefaults {
                    default_weight,
                    fallback_confidence,
                },
            },
            rules_path,
        })
    }
}

fn parse_var<T: FromStr + Copy>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} has unparseable value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
