use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use url::Url;

use crate::models::{IdentityKey, SourceKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub telegram: TelegramConfig,
    pub dashboard: DashboardConfig,
    pub alerts: AlertsConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub decryption: DecryptionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub max_concurrent_per_origin: usize,
    pub request_timeout: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub jitter_ms: u64,
    pub user_agent: String,
    pub accept_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between the end of one cycle and the start of the next.
    pub check_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub state_path: PathBuf,
    pub targets_path: PathBuf,
    pub templates_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
    pub poll_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Maximum page body length, in characters.
    pub max_page_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    pub stale_after_cycles: u32,
    pub failure_threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub html: IdentityKey,
    pub api: IdentityKey,
}

impl IdentityConfig {
    pub fn key_for(&self, kind: SourceKind) -> IdentityKey {
        match kind {
            SourceKind::HtmlSelector => self.html,
            SourceKind::EncryptedApi => self.api,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecryptionConfig {
    pub key_hex: Option<String>,
    pub iv_hex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
    pub filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig {
                max_concurrent_per_origin: 10,
                request_timeout: 20,
                retry_attempts: 3,
                retry_delay_ms: 1000,
                jitter_ms: 1500,
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
            },
            scheduler: SchedulerConfig { check_interval: 60 },
            storage: StorageConfig {
                state_path: PathBuf::from("data/stock_status.json"),
                targets_path: PathBuf::from("data/products.json"),
                templates_path: PathBuf::from("config/sites.toml"),
            },
            telegram: TelegramConfig {
                bot_token: None,
                chat_id: None,
                api_base: "https://api.telegram.org".to_string(),
                poll_timeout: 60,
            },
            dashboard: DashboardConfig { max_page_length: 3800 },
            alerts: AlertsConfig {
                stale_after_cycles: 60,
                failure_threshold: 5,
            },
            identity: IdentityConfig {
                html: IdentityKey::NameUrl,
                api: IdentityKey::NameSite,
            },
            decryption: DecryptionConfig::default(),
            logging: LoggingConfig {
                directory: None,
                filter: "stock_watcher=info".to_string(),
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_dir("config")
    }

    pub fn from_dir(dir: &str) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(&format!("{}/default", dir)))
            // Add environment-specific config
            .add_source(File::with_name(&format!("{}/{}", dir, run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name(&format!("{}/local", dir)).required(false))
            // Add environment variables with prefix "WATCHER_"
            .add_source(Environment::with_prefix("WATCHER").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Bare bot credentials, as commonly kept in .env
        if config.telegram.bot_token.is_none() {
            config.telegram.bot_token = env::var("TELEGRAM_BOT_TOKEN").ok().filter(|v| !v.is_empty());
        }
        if config.telegram.chat_id.is_none() {
            config.telegram.chat_id = env::var("TELEGRAM_CHAT_ID").ok().filter(|v| !v.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scraper.max_concurrent_per_origin == 0 {
            return Err(ConfigError::Message("Scraper max_concurrent_per_origin must be greater than 0".into()));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scheduler.check_interval == 0 {
            return Err(ConfigError::Message("Scheduler check_interval must be greater than 0".into()));
        }

        if self.dashboard.max_page_length < 200 {
            return Err(ConfigError::Message("Dashboard max_page_length must be at least 200".into()));
        }

        if self.alerts.stale_after_cycles == 0 || self.alerts.failure_threshold == 0 {
            return Err(ConfigError::Message("Alert thresholds must be greater than 0".into()));
        }

        if Url::parse(&self.telegram.api_base).is_err() {
            return Err(ConfigError::Message("Invalid telegram api_base URL".into()));
        }

        if let Some(key) = &self.decryption.key_hex {
            if !is_hex_of_len(key, 32) {
                return Err(ConfigError::Message("Decryption key_hex must be 64 hex characters".into()));
            }
        }

        if let Some(iv) = &self.decryption.iv_hex {
            if !is_hex_of_len(iv, 16) {
                return Err(ConfigError::Message("Decryption iv_hex must be 32 hex characters".into()));
            }
        }

        Ok(())
    }
}

fn is_hex_of_len(value: &str, bytes: usize) -> bool {
    hex::decode(value).map(|b| b.len() == bytes).unwrap_or(false)
}
