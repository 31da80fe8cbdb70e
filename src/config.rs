use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub access: AccessConfig,
}

/// Tunables for the biometric access rate limit.
///
/// The 10-per-60s defaults mirror the policy this layer replaces. They are
/// placeholders rather than calibrated security controls, which is why they
/// live in config instead of in code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Maximum biometric access attempts per caller inside the window.
    #[serde(default = "default_max_attempts")]
    pub max_biometric_attempts: u32,

    /// Trailing window, in seconds, the attempts are counted over.
    #[serde(default = "default_attempt_window_secs")]
    pub attempt_window_secs: u32,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_attempt_window_secs() -> u32 {
    60
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            max_biometric_attempts: default_max_attempts(),
            attempt_window_secs: default_attempt_window_secs(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crowdpix")
        .join("crowdpix.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            access: AccessConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crowdpix")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.access.max_biometric_attempts, 10);
        assert_eq!(config.access.attempt_window_secs, 60);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("[access]\nmax_biometric_attempts = 3\n").unwrap();
        assert_eq!(config.access.max_biometric_attempts, 3);
        assert_eq!(config.access.attempt_window_secs, 60);
        assert!(config.db_path.ends_with("crowdpix.db"));
    }
}
