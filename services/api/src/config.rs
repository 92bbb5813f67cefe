//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. Provider credentials are deliberately
//! optional here: a missing key is reported per request as an immediate 500
//! by the owning adapter, without ever calling the provider.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which LLM backend serves the two routes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    VolcEngine,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub provider: Provider,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub volcengine_api_key: Option<String>,
    pub volcengine_api_secret: Option<String>,
    pub volcengine_api_endpoint: String,
    pub volcengine_model: String,
    /// True when `NODE_ENV=development`; gates the mock chat reply path.
    pub dev_mode: bool,
    /// True when `NODE_ENV=production`; hides raw diagnostics from responses.
    pub production: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Provider Selection ---
        let provider_str =
            std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "volcengine" => Provider::VolcEngine,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not a known provider", other),
                ))
            }
        };

        // --- Load API Keys (as optional) ---
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        let volcengine_api_key = std::env::var("VOLCENGINE_API_KEY").ok();
        let volcengine_api_secret = std::env::var("VOLCENGINE_API_SECRET").ok();

        // --- Load Adapter-specific Settings ---
        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let volcengine_api_endpoint = std::env::var("VOLCENGINE_API_ENDPOINT")
            .unwrap_or_else(|_| "https://ark.cn-beijing.volces.com/api/v3".to_string());
        let volcengine_model = std::env::var("VOLCENGINE_MODEL")
            .unwrap_or_else(|_| "doubao-seed-1-6-flash".to_string());

        let node_env = std::env::var("NODE_ENV").unwrap_or_else(|_| "production".to_string());

        Ok(Self {
            bind_address,
            log_level,
            provider,
            gemini_api_key,
            gemini_model,
            volcengine_api_key,
            volcengine_api_secret,
            volcengine_api_endpoint,
            volcengine_model,
            dev_mode: node_env == "development",
            production: node_env == "production",
        })
    }
}
