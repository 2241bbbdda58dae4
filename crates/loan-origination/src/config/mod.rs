use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::workflows::origination::{PipelineConfig, UnderwritingConfig};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_label(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

pub const DEFAULT_ASSISTANT_BASE_URL: &str = "https://ai.gateway.lovable.dev";
pub const DEFAULT_ASSISTANT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_SANCTION_LETTER_BASE_URL: &str = "http://localhost:54321";

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub database: DatabaseConfig,
    pub assistant: AssistantConfig,
    pub origination: OriginationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_label(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let database = DatabaseConfig {
            url: optional_var("DATABASE_URL"),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
        };

        let assistant = AssistantConfig {
            api_key: optional_var("ASSISTANT_API_KEY"),
            base_url: optional_var("ASSISTANT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ASSISTANT_BASE_URL.to_string()),
            model: optional_var("ASSISTANT_MODEL")
                .unwrap_or_else(|| DEFAULT_ASSISTANT_MODEL.to_string()),
            timeout_secs: parse_var("ASSISTANT_TIMEOUT_SECS", 20)?,
        };

        let bureau_seed = optional_var("BUREAU_SEED")
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                    key: "BUREAU_SEED",
                    value: raw,
                })
            })
            .transpose()?;

        let default_monthly_income = parse_var(
            "DEFAULT_MONTHLY_INCOME",
            UnderwritingConfig::default().default_monthly_income,
        )?;
        if default_monthly_income == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "DEFAULT_MONTHLY_INCOME",
                value: "0".to_string(),
            });
        }

        let origination = OriginationConfig {
            sanction_letter_base_url: optional_var("SANCTION_LETTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SANCTION_LETTER_BASE_URL.to_string()),
            bureau_seed,
            default_monthly_income,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            database,
            assistant,
            origination,
        })
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
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

/// Relational store. Without a URL the service keeps everything in process memory.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

/// Chat-completions endpoint used for assistant replies.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_ASSISTANT_BASE_URL.to_string(),
            model: DEFAULT_ASSISTANT_MODEL.to_string(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OriginationConfig {
    pub sanction_letter_base_url: String,
    pub bureau_seed: Option<u64>,
    pub default_monthly_income: u64,
}

impl OriginationConfig {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            underwriting: UnderwritingConfig {
                default_monthly_income: self.default_monthly_income,
                ..UnderwritingConfig::default()
            },
            sanction_letter_base_url: self.sanction_letter_base_url.clone(),
        }
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
                write!(f, "{key} must be a positive integer (got '{value}')")
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

/// Serializes tests that read or mutate process environment variables.
#[cfg(test)]
pub(crate) fn env_guard() -> &'static std::sync::Mutex<()> {
    static GUARD: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    GUARD.get_or_init(|| std::sync::Mutex::new(()))
}
