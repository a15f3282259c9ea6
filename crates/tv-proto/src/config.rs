use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub quick_select: QuickSelectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_favorites_file")]
    pub favorites_file: PathBuf,
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

/// Where channel lists and country metadata come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Locale hint (e.g. `en-US`) used when the system settings carry none.
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Extra groups fetched in the background after startup and after the
    /// cursor steps past the last known group.
    #[serde(default = "default_background_prefetch")]
    pub background_prefetch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickSelectConfig {
    #[serde(default = "default_auto_commit_ms")]
    pub auto_commit_ms: u64,
    /// Growth starts once the selection is this close to the end of the matches.
    #[serde(default = "default_growth_window")]
    pub growth_window: usize,
    /// Follow-up fetches after the first blocking one.
    #[serde(default = "default_growth_batch")]
    pub growth_batch: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            favorites_file: default_favorites_file(),
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

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            locale: None,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            background_prefetch: default_background_prefetch(),
        }
    }
}

impl Default for QuickSelectConfig {
    fn default() -> Self {
        Self {
            auto_commit_ms: default_auto_commit_ms(),
            growth_window: default_growth_window(),
            growth_batch: default_growth_batch(),
        }
    }
}

fn default_favorites_file() -> PathBuf {
    platform::data_dir().join("favorites.json")
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

fn default_base_url() -> String {
    "https://iptv-mirror.pages.dev".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_background_prefetch() -> usize {
    4
}

fn default_auto_commit_ms() -> u64 {
    3000
}

fn default_growth_window() -> usize {
    5
}

fn default_growth_batch() -> usize {
    5
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

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            http: HttpConfig::default(),
            catalog: CatalogConfig::default(),
            navigation: NavigationConfig::default(),
            quick_select: QuickSelectConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.http.enabled);
        assert_eq!(config.http.port, 8990);
        assert_eq!(config.http.bind_address, "127.0.0.1");
        assert!(config.catalog.base_url.starts_with("https://"));
        assert_eq!(config.navigation.background_prefetch, 4);
        assert_eq!(config.quick_select.auto_commit_ms, 3000);
        assert!(config
            .daemon
            .favorites_file
            .ends_with("tvsurf/favorites.json"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [catalog]
            locale = "en-GB"

            [quick_select]
            auto_commit_ms = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.catalog.locale.as_deref(), Some("en-GB"));
        assert_eq!(config.catalog.request_timeout_secs, 15);
        assert_eq!(config.quick_select.auto_commit_ms, 1500);
        assert_eq!(config.quick_select.growth_window, 5);
        assert_eq!(config.http.port, 8990);
    }
}
