use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub store: StoreConfig,
    pub assistant: AssistantConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Location of the static quiz catalog
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

/// Durable key-value store backing progress, leaderboard and autosaves
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub url: String,
}

/// Upstream AI gateway used by the assistant proxy
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    pub gateway_url: String,
    pub model: String,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            server: ServerConfig::from_env()?,
            catalog: CatalogConfig::from_env(),
            store: StoreConfig::from_env(),
            assistant: AssistantConfig::from_env(),
            logging: LoggingConfig::from_env(),
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    fn log_configuration_summary(&self) {
        info!(
            server_address = %self.server_address(),
            catalog_path = %self.catalog.path.display(),
            store_url_masked = %mask_sensitive_data(&self.store.url),
            assistant_key = %self.assistant.api_key.as_deref().map(mask_sensitive_data).unwrap_or_else(|| "<unset>".to_string()),
            assistant_model = %self.assistant.model,
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.store.url.starts_with("sqlite:") {
            return Err(anyhow!("STORE_URL must start with 'sqlite:'"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.assistant.api_key.is_none() {
            warn!("ASSISTANT_API_KEY is not set - the AI assistant endpoint will return errors");
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
        {
            warn!("Unrecognised log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let port = port_str
            .parse::<u16>()
            .map_err(|_| anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str))?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl CatalogConfig {
    fn from_env() -> Self {
        let path = env::var("QUIZ_CATALOG_PATH").unwrap_or_else(|_| "data/quizzes.json".to_string());
        CatalogConfig { path: PathBuf::from(path) }
    }
}

impl StoreConfig {
    fn from_env() -> Self {
        let url = env::var("STORE_URL").unwrap_or_else(|_| "sqlite:quiz_progress.db".to_string());
        StoreConfig { url }
    }
}

impl AssistantConfig {
    fn from_env() -> Self {
        let api_key = env::var("ASSISTANT_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        let gateway_url = env::var("ASSISTANT_GATEWAY_URL")
            .unwrap_or_else(|_| "https://ai.gateway.lovable.dev/v1".to_string());
        let model = env::var("ASSISTANT_MODEL").unwrap_or_else(|_| "google/gemini-2.5-flash".to_string());

        AssistantConfig {
            api_key,
            gateway_url,
            model,
        }
    }
}

impl LoggingConfig {
    fn from_env() -> Self {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info,quiz_engine=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .ok()
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(true);
        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .ok()
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        }
    }
}

/// Mask sensitive data in configuration for safe logging
pub fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
