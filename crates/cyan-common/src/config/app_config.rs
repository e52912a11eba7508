//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub bot: BotConfig,
    pub gateway: GatewaySettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Sandbox,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "sandbox" => Some(Self::Sandbox),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Bot credentials and the OpenAPI endpoint they authenticate against
#[derive(Clone, Deserialize)]
pub struct BotConfig {
    pub app_id: String,
    pub token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl BotConfig {
    /// Value of the `Authorization` header, also used as the gateway token.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Bot {}.{}", self.app_id, self.token)
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("app_id", &self.app_id)
            .field("token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Gateway reconnection tuning
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_resume_attempts")]
    pub max_resume_attempts: u32,
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_resume_attempts: default_max_resume_attempts(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "cyan".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_base_url() -> String {
    "https://api.sgroup.qq.com".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_max_resume_attempts() -> u32 {
    5
}

fn default_close_timeout_ms() -> u64 {
    5_000
}

/// Parse an optional numeric variable, rejecting values that are present but malformed.
fn parse_var<T: FromStr>(name: &'static str, default: fn() -> T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(default()),
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let env = match env::var("APP_ENV") {
            Ok(raw) => Environment::parse(&raw).ok_or(ConfigError::InvalidValue("APP_ENV", raw))?,
            Err(_) => default_env(),
        };

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env,
            },
            bot: BotConfig {
                app_id: required_var("CYAN_APP_ID")?,
                token: required_var("CYAN_TOKEN")?,
                api_base_url: env::var("CYAN_API_BASE_URL")
                    .unwrap_or_else(|_| default_api_base_url()),
            },
            gateway: GatewaySettings {
                reconnect_delay_ms: parse_var("CYAN_RECONNECT_DELAY_MS", default_reconnect_delay_ms)?,
                max_resume_attempts: parse_var(
                    "CYAN_MAX_RESUME_ATTEMPTS",
                    default_max_resume_attempts,
                )?,
                close_timeout_ms: parse_var("CYAN_CLOSE_TIMEOUT_MS", default_close_timeout_ms)?,
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
