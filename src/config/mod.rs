// Configuration module for hotel-auth

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_AUTH_ENDPOINT: &str =
    "https://functions.poehali.dev/6aa2f63e-5ec4-4c47-b4ad-82d7858a3081";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppConfig {
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,

    #[serde(default)]
    pub google_client_id: String,

    #[serde(default)]
    pub telegram_bot_username: String,

    #[serde(default)]
    pub vk_app_id: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Port of the loopback widget host, 0 picks a free one
    #[serde(default)]
    pub widget_port: u16,

    #[serde(default = "default_widget_timeout_secs")]
    pub widget_timeout_secs: u64,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auth_endpoint: default_auth_endpoint(),
            google_client_id: String::new(),
            telegram_bot_username: String::new(),
            vk_app_id: String::new(),
            data_dir: default_data_dir(),
            widget_port: 0,
            widget_timeout_secs: default_widget_timeout_secs(),
            server: ServerConfig::default(),
        }
    }
}

fn default_auth_endpoint() -> String {
    DEFAULT_AUTH_ENDPOINT.to_string()
}

fn default_data_dir() -> String {
    "~/.hotel-auth".to_string()
}

fn default_widget_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub telegram_bot_token: String,

    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            telegram_bot_token: String::new(),
            session_ttl_days: default_session_ttl_days(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8418
}

fn default_database() -> String {
    "auth.db".to_string()
}

fn default_session_ttl_days() -> i64 {
    30
}

impl AppConfig {
    /// Data directory with a leading `~` expanded
    pub fn resolve_data_dir(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }

    /// Database path; relative paths live under the data directory
    pub fn resolve_database_path(&self) -> PathBuf {
        let db = expand_home(&self.server.database);
        if db.is_absolute() {
            db
        } else {
            self.resolve_data_dir().join(db)
        }
    }

    pub fn session_file(&self) -> PathBuf {
        self.resolve_data_dir().join("session.json")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                self.server.telegram_bot_token = token;
            }
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    PathBuf::from(path)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hotel-auth")
        .join("config.yaml")
}

/// Read the config file, writing the defaults out when it does not exist yet
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)?
    } else {
        let default_config = AppConfig::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(&default_config)?;
        std::fs::write(path, content)?;
        default_config
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Load the config from `path`, or from the default location
pub fn init_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = path.unwrap_or_else(default_config_path);
    let config = load_config(&config_path)?;

    tracing::info!("Config initialized from {:?}", config_path);
    Ok(config)
}
