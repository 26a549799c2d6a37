use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub prefs: PrefsConfig,
}

/// Remote station directory endpoints and request policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory API root, no trailing slash.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Base for constructed stream URLs (`<stream_base>/<id>/channel.mp3`).
    #[serde(default = "default_stream_base")]
    pub stream_base: String,
    /// The directory rejects bare clients; send a browser-like UA.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_referer")]
    pub referer: String,
    /// Query used when the caller searches with an empty string — the
    /// default browsing view.
    #[serde(default = "default_query")]
    pub default_query: String,
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,
    /// Size of the random "featured" sample derived from search results.
    #[serde(default = "default_featured_count")]
    pub featured_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefsConfig {
    /// Durable user-preference file (favorites, history, last station).
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            stream_base: default_stream_base(),
            user_agent: default_user_agent(),
            referer: default_referer(),
            default_query: default_query(),
            search_timeout_secs: default_search_timeout_secs(),
            featured_count: default_featured_count(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for PrefsConfig {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
        }
    }
}

fn default_api_base() -> String {
    "https://radio.garden/api".to_string()
}

fn default_stream_base() -> String {
    "https://radio.garden/api/ara/content/listen".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_referer() -> String {
    "https://radio.garden/".to_string()
}

fn default_query() -> String {
    "RRI".to_string()
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_featured_count() -> usize {
    8
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

fn default_settings_file() -> PathBuf {
    platform::data_dir().join("radio_settings.json")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
