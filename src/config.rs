//! Application configuration
//!
//! Persists the tunable analysis thresholds as TOML. Everything has a code
//! default; a missing config file is not an error.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analytics::AnalyticsSettings;
use crate::events::SEARCH_WINDOWS;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Orchestrator thresholds and gates
    pub analysis: AnalyticsSettings,

    /// Event-impact defaults
    pub events: EventSettings,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Defaults for the life-event impact view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSettings {
    /// Post-event window size in days
    pub default_window_days: u32,

    /// Whether the event day itself joins the window
    pub include_same_day: bool,
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            default_window_days: 7,
            include_same_day: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();
        AppConfig {
            metadata: ConfigMetadata {
                version: "1".to_string(),
                created_at: now,
                updated_at: now,
            },
            analysis: AnalyticsSettings::default(),
            events: EventSettings::default(),
        }
    }
}

impl AppConfig {
    /// Default config file location under the platform config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitalrs")
            .join("config.toml")
    }

    /// Load from a TOML file; defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Persist to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut config = self.clone();
        config.metadata.updated_at = Utc::now();
        let content = toml::to_string_pretty(&config).context("serializing config")?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Reject settings that would make analyses meaningless.
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if !(0.0..0.5).contains(&a.winsorize_pct) {
            anyhow::bail!("winsorize_pct must be in [0, 0.5), got {}", a.winsorize_pct);
        }
        if a.recipe_duration_minutes <= 0.0 {
            anyhow::bail!("recipe_duration_minutes must be positive");
        }
        if !(0.0..=1.0).contains(&a.recipe_stage_share) {
            anyhow::bail!("recipe_stage_share must be in [0, 1]");
        }
        if self.events.default_window_days == 0 {
            anyhow::bail!("default_window_days must be positive");
        }
        if !SEARCH_WINDOWS.contains(&self.events.default_window_days) {
            anyhow::bail!(
                "default_window_days must be one of {:?}",
                SEARCH_WINDOWS
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.analysis.min_correlation_pairs = 25;
        config.events.default_window_days = 15;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.analysis.min_correlation_pairs, 25);
        assert_eq!(loaded.events.default_window_days, 15);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.events, EventSettings::default());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut config = AppConfig::default();
        config.analysis.winsorize_pct = 0.9;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.events.default_window_days = 11;
        assert!(config.validate().is_err());
    }
}
