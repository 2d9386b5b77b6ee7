//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::{FixedOffset, Offset};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which backend is tried first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimaryBackend {
    OpenAi,
    Gemini,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_models: Vec<String>,
    pub gemini_models: Vec<String>,
    pub gemini_api_versions: Vec<String>,
    pub gemini_base_url: String,
    pub primary_backend: PrimaryBackend,
    pub backend_timeout: Duration,
    pub backend_moderation: bool,
    pub utc_offset: FixedOffset,
}

/// Reads a variable, treating an unset or blank value as absent.
fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn list_var(name: &str, default: &str) -> Vec<String> {
    var(name)
        .unwrap_or_else(|| default.to_string())
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_primary_backend(value: &str) -> Result<PrimaryBackend, ConfigError> {
    match value.to_lowercase().as_str() {
        "openai" => Ok(PrimaryBackend::OpenAi),
        "gemini" => Ok(PrimaryBackend::Gemini),
        other => Err(ConfigError::InvalidValue(
            "STORY_PRIMARY_BACKEND".to_string(),
            format!("'{}' is not one of openai, gemini", other),
        )),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", value),
        )),
    }
}

fn parse_utc_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || {
        ConfigError::InvalidValue(
            "STORY_UTC_OFFSET_HOURS".to_string(),
            format!("'{}' is not an offset between -12 and 14 hours", value),
        )
    };
    let hours = value.parse::<i32>().map_err(|_| invalid())?;
    if !(-12..=14).contains(&hours) {
        return Err(invalid());
    }
    FixedOffset::east_opt(hours * 3600).ok_or_else(invalid)
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

        // --- Load Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = var("OPENAI_API_KEY");
        let gemini_api_key = var("GEMINI_API_KEY");

        // --- Load Backend Settings ---
        let openai_models = list_var("STORY_OPENAI_MODELS", "gpt-4o-mini,gpt-4o");
        let gemini_models = list_var("STORY_GEMINI_MODELS", "gemini-1.5-flash,gemini-pro");
        let gemini_api_versions = list_var("GEMINI_API_VERSIONS", "v1beta,v1");
        let gemini_base_url = var("GEMINI_BASE_URL")
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());

        let primary_backend = var("STORY_PRIMARY_BACKEND")
            .map(|v| parse_primary_backend(&v))
            .transpose()?
            .unwrap_or(PrimaryBackend::OpenAi);

        let backend_timeout = match var("BACKEND_TIMEOUT_SECS") {
            Some(v) => {
                let secs = v.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "BACKEND_TIMEOUT_SECS".to_string(),
                        format!("'{}' is not a positive number of seconds", v),
                    )
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(45),
        };

        let backend_moderation = var("BACKEND_MODERATION")
            .map(|v| parse_bool("BACKEND_MODERATION", &v))
            .transpose()?
            .unwrap_or(false);

        let utc_offset = var("STORY_UTC_OFFSET_HOURS")
            .map(|v| parse_utc_offset(&v))
            .transpose()?
            .unwrap_or_else(|| chrono::Utc.fix());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            gemini_api_key,
            openai_models,
            gemini_models,
            gemini_api_versions,
            gemini_base_url,
            primary_backend,
            backend_timeout,
            backend_moderation,
            utc_offset,
        })
    }
}
