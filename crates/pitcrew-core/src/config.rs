//! Pitcrew configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PitcrewError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PitcrewConfig {
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub notify: NotifySettings,
    #[serde(default)]
    pub job: JobConfig,
}

impl PitcrewConfig {
    /// Load config from the default path (~/.pitcrew/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PitcrewError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PitcrewError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PitcrewError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Pitcrew home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pitcrew")
    }
}

/// SMTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_from_address() -> String {
    "pitcrew@localhost".into()
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_address: default_from_address(),
            display_name: None,
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    /// Base URL action links are built against.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Explicit action-token secret; a machine-derived key is used when unset.
    #[serde(default)]
    pub token_secret: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8080".into()
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_secret: None,
        }
    }
}

/// Background job intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Seconds between maintenance batch passes.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Seconds between analytics-cache sweeps.
    #[serde(default = "default_sweep_interval")]
    pub cache_sweep_interval_secs: u64,
}

fn default_check_interval() -> u64 {
    3600
}
fn default_sweep_interval() -> u64 {
    900
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            cache_sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PitcrewConfig::default();
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.job.check_interval_secs, 3600);
        assert!(config.notify.token_secret.is_none());
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[notify]\nbase_url = \"https://pits.example.com\"\n\n[smtp]\nhost = \"mail.example.com\"\n",
        )
        .unwrap();

        let config = PitcrewConfig::load_from(&path).unwrap();
        assert_eq!(config.notify.base_url, "https://pits.example.com");
        assert_eq!(config.smtp.host, "mail.example.com");
        // Untouched sections fall back to defaults
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.job.cache_sweep_interval_secs, 900);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid [toml").unwrap();
        assert!(PitcrewConfig::load_from(&path).is_err());
    }
}
