//! Client configuration persisted as JSON in the app data directory

use crate::models::CATAAS_BASE_URL;
use crate::paths::get_config_path;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Number of records requested per feed page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_tag_cache_ttl_secs")]
    pub tag_cache_ttl_secs: i64,
    /// How many related images the detail screen shows per tag
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,
}

fn default_base_url() -> String {
    CATAAS_BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_tag_cache_ttl_secs() -> i64 {
    86_400
}

fn default_related_limit() -> usize {
    4
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            tag_cache_ttl_secs: default_tag_cache_ttl_secs(),
            related_limit: default_related_limit(),
        }
    }
}

impl ClientConfig {
    /// Loads the config from the default location, falling back to defaults
    pub fn load() -> Result<Self, String> {
        Self::load_from(&get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, String> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read client config: {}", e))?;
        let mut config: ClientConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse client config: {}", e))?;

        // A zero page size would mark every feed exhausted immediately
        if config.page_size == 0 {
            log::warn!("[config] page_size 0 is invalid, using {}", default_page_size());
            config.page_size = default_page_size();
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<(), String> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), String> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory: {}", e))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize client config: {}", e))?;
        std::fs::write(config_path, content)
            .map_err(|e| format!("Failed to save client config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ClientConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.page_size, 10);
        assert_eq!(config.tag_cache_ttl_secs, 86_400);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"page_size": 0, "base_url": "http://localhost:3000"}"#).unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.related_limit, 4);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ClientConfig {
            page_size: 25,
            ..ClientConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(ClientConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ClientConfig::load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse client config"));
    }
}
