//! Configuration infrastructure
//!
//! Contains configuration loading and management for the resync service.
//!
//! Configuration is organized into sections:
//! 1. HTTP server (bind address, auth token)
//! 2. Status database
//! 3. Table operation adapter endpoint
//! 4. Resync scheduling policy
//! 5. Logging

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

use crate::application::orchestrator::OrchestratorSettings;
use crate::application::scheduler_guard::{GuardSettings, InitialRunPolicy};

/// Default values for configuration
pub mod defaults {
    pub const BIND_ADDRESS: &str = "127.0.0.1:8787";
    pub const ADAPTER_BASE_URL: &str = "http://127.0.0.1:3000/api/admin/resync";
    pub const ADAPTER_TIMEOUT_SECONDS: u64 = 120;

    pub const MIN_TRIGGER_SPACING_SECONDS: u64 = 10;
    pub const STARTUP_COOLDOWN_SECONDS: u64 = 60 * 60;
    pub const MAX_RUN_DURATION_SECONDS: u64 = 10 * 60;
    pub const PROGRESS_RETENTION_SECONDS: u64 = 10 * 60;
    pub const DEFAULT_INTERVAL_MINUTES: u32 = 24 * 60;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_FILE_PREFIX: &str = "storefront-resync.log";
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub resync: ResyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,

    /// Bearer token required by the `/api` routes; `None` disables auth
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite:///var/lib/resync/status.db`
    pub url: String,
}

/// Remote service that performs the per-table delete/insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub base_url: String,
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncConfig {
    pub min_trigger_spacing_seconds: u64,
    pub startup_cooldown_seconds: u64,
    pub max_run_duration_seconds: u64,
    pub progress_retention_seconds: u64,
    #[serde(default)]
    pub initial_run_policy: InitialRunPolicy,
    /// Interval written when the status row is first created
    pub default_interval_minutes: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to `logs/` next to the executable
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Module-specific log level filters (e.g., "sqlx": "warn", "hyper": "info")
    #[serde(default)]
    pub module_filters: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: defaults::BIND_ADDRESS.to_string(),
            auth_token: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = ConfigManager::get_app_data_dir()
            .map(|dir| dir.join("database").join("resync_status.db"))
            .unwrap_or_else(|_| PathBuf::from("resync_status.db"));
        Self {
            url: format!("sqlite://{}", path.display()),
        }
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::ADAPTER_BASE_URL.to_string(),
            request_timeout_seconds: defaults::ADAPTER_TIMEOUT_SECONDS,
            api_key: None,
        }
    }
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            min_trigger_spacing_seconds: defaults::MIN_TRIGGER_SPACING_SECONDS,
            startup_cooldown_seconds: defaults::STARTUP_COOLDOWN_SECONDS,
            max_run_duration_seconds: defaults::MAX_RUN_DURATION_SECONDS,
            progress_retention_seconds: defaults::PROGRESS_RETENTION_SECONDS,
            initial_run_policy: InitialRunPolicy::Defer,
            default_interval_minutes: defaults::DEFAULT_INTERVAL_MINUTES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("tower_http".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl ResyncConfig {
    #[must_use]
    pub const fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            guard: GuardSettings {
                min_trigger_spacing: Duration::from_secs(self.min_trigger_spacing_seconds),
                startup_cooldown: Duration::from_secs(self.startup_cooldown_seconds),
                initial_run_policy: self.initial_run_policy,
            },
            max_run_duration: Duration::from_secs(self.max_run_duration_seconds),
            progress_retention: Duration::from_secs(self.progress_retention_seconds),
        }
    }
}

impl AppConfig {
    /// Environment variables win over the file
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RESYNC_BIND_ADDRESS") {
            self.server.bind_address = v;
        }
        if let Some(v) = lookup("RESYNC_DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = lookup("RESYNC_ADAPTER_URL") {
            self.adapter.base_url = v;
        }
        if let Some(v) = lookup("RESYNC_AUTH_TOKEN") {
            self.server.auth_token = Some(v);
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("storefront-resync");

        Ok(config_dir)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join("storefront-resync");

        Ok(data_dir)
    }

    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join("resync_config.json");
        Ok(Self { config_path })
    }

    #[must_use]
    pub const fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration file could not be parsed: {}", parse_error);

                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;

                info!("✅ Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path
    #[must_use]
    pub const fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}
