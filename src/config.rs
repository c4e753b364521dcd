//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! identity service URL, its publishable API key, and an optional override
//! for where session bookkeeping is stored.
//!
//! Configuration is stored at `~/.config/plateful/config.json`; environment
//! variables (`PLATEFUL_SERVICE_URL`, `PLATEFUL_ANON_KEY`) and a `.env` file
//! take precedence over the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/storage directory paths
const APP_NAME: &str = "plateful";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub service_url: Option<String>,
    pub anon_key: Option<String>,
    pub storage_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var("PLATEFUL_SERVICE_URL") {
            config.service_url = Some(url);
        }
        if let Ok(key) = std::env::var("PLATEFUL_ANON_KEY") {
            config.anon_key = Some(key);
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the session store, defaulting to the platform cache
    /// location.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let cache_dir =
            dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_storage_dir_wins() {
        let config = Config {
            storage_dir: Some(PathBuf::from("/tmp/plateful-test")),
            ..Config::default()
        };
        assert_eq!(
            config.storage_dir().unwrap(),
            PathBuf::from("/tmp/plateful-test")
        );
    }
}
