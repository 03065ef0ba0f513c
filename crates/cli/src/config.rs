//! Configuration management for the CLI

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thermal_engine::settings::{SettingValue, StaticSettings};

use crate::output::OutputFormat;

/// Overrides the config file location
pub const CONFIG_ENV: &str = "TWCTL_CONFIG";

const DEFAULT_DB: &str = "thermwatch.db";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// SQLite database used when `--db` is not given
    pub db_path: Option<PathBuf>,
    /// Default output format
    pub default_format: Option<String>,
    /// Threshold settings by category and key
    #[serde(default)]
    pub settings: HashMap<String, HashMap<String, SettingValue>>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Read a config file; a missing file is an empty config
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// `$TWCTL_CONFIG`, else `~/.config/twctl/config.json`
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("twctl").join("config.json"))
    }

    /// Database path: command line (or `TWCTL_DB`), then config, then the default
    pub fn resolve_db_path(&self, cli_override: Option<PathBuf>) -> PathBuf {
        cli_override
            .or_else(|| self.db_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB))
    }

    pub fn resolve_format(&self, cli_override: Option<OutputFormat>) -> OutputFormat {
        cli_override
            .or_else(|| {
                self.default_format
                    .as_deref()
                    .and_then(|f| OutputFormat::from_str(f, true).ok())
            })
            .unwrap_or_default()
    }

    pub fn set_setting(&mut self, category: &str, key: &str, value: SettingValue) {
        self.settings
            .entry(category.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Remove a setting; returns false if it was not set
    pub fn unset_setting(&mut self, category: &str, key: &str) -> bool {
        let Some(keys) = self.settings.get_mut(category) else {
            return false;
        };
        let removed = keys.remove(key).is_some();
        if keys.is_empty() {
            self.settings.remove(category);
        }
        removed
    }

    pub fn settings_provider(&self) -> StaticSettings {
        StaticSettings::from_table(&self.settings)
    }
}

/// Parse a setting from the command line: `true`/`false` or an integer
pub fn parse_setting_value(raw: &str) -> Result<SettingValue> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => Ok(SettingValue::Bool(true)),
        "false" | "off" | "no" => Ok(SettingValue::Bool(false)),
        other => other
            .parse::<i64>()
            .map(SettingValue::Int)
            .with_context(|| format!("Expected true, false or an integer, got {raw:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermal_engine::settings::{CATEGORY_TEMPERATURE, KEY_WARNING};
    use thermal_engine::Thresholds;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.resolve_db_path(None), PathBuf::from(DEFAULT_DB));
        assert_eq!(config.resolve_format(None), OutputFormat::Table);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config {
            db_path: Some(PathBuf::from("/srv/temps.db")),
            default_format: Some("json".to_string()),
            ..Default::default()
        };
        config.set_setting(CATEGORY_TEMPERATURE, KEY_WARNING, SettingValue::Int(40));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.resolve_format(None), OutputFormat::Json);
        assert_eq!(
            loaded.resolve_db_path(Some(PathBuf::from("other.db"))),
            PathBuf::from("other.db")
        );
        assert_eq!(Thresholds::load(&loaded.settings_provider()).warning, 40);
    }

    #[test]
    fn test_unset_setting() {
        let mut config = Config::default();
        config.set_setting(CATEGORY_TEMPERATURE, KEY_WARNING, SettingValue::Int(40));
        assert!(config.unset_setting(CATEGORY_TEMPERATURE, KEY_WARNING));
        assert!(!config.unset_setting(CATEGORY_TEMPERATURE, KEY_WARNING));
        assert!(config.settings.is_empty());
    }

    #[test]
    fn test_parse_setting_value() {
        assert_eq!(parse_setting_value("42").unwrap(), SettingValue::Int(42));
        assert_eq!(parse_setting_value("False").unwrap(), SettingValue::Bool(false));
        assert!(parse_setting_value("warm").is_err());
    }
}
