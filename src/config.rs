use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_recommendation_limit")]
    pub recommendation_limit: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_camera_device")]
    pub camera_device: String,

    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    #[serde(default)]
    pub autoplay_on_advance: bool,
}

fn default_api_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_recommendation_limit() -> u32 {
    20
}

fn default_request_timeout() -> u64 {
    30
}

fn default_camera_device() -> String {
    "/dev/video0".to_string()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_initial_volume() -> f32 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            recommendation_limit: default_recommendation_limit(),
            request_timeout_secs: default_request_timeout(),
            camera_device: default_camera_device(),
            ffmpeg_path: default_ffmpeg_path(),
            initial_volume: default_initial_volume(),
            autoplay_on_advance: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/moodtune/config.json)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `config_path`, writing defaults if it is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Save configuration to `config_path`
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Directory holding the config and session files
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("moodtune"))
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            return Err(anyhow::anyhow!("api_url cannot be empty"));
        }

        if !(1..=100).contains(&self.recommendation_limit) {
            return Err(anyhow::anyhow!(
                "recommendation_limit must be between 1 and 100"
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("request_timeout_secs must be positive"));
        }

        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(anyhow::anyhow!("initial_volume must be between 0.0 and 1.0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moodtune").join("config.json");

        let config = Config::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.recommendation_limit, 20);
        assert_eq!(config.api_url, "http://localhost:5000/api");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_url": "https://mood.example/api", "autoplay_on_advance": true}"#)
            .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.api_url, "https://mood.example/api");
        assert!(config.autoplay_on_advance);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.camera_device, "/dev/video0");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            recommendation_limit: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            initial_volume: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            api_url: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "[1, 2").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
