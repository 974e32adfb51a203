use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::ConfigError,
    model::{Location, default_locations},
};

/// Default history file, relative to the working directory.
pub const DEFAULT_HISTORY_FILE: &str = "weather_history.json";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// openweather_api_key = "..."
/// sendgrid_api_key = "..."
/// recipients = ["me@example.com"]
///
/// [[locations]]
/// name = "Houston, TX"
/// lat = 29.76
/// lon = -95.36
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub openweather_api_key: Option<String>,
    pub sendgrid_api_key: Option<String>,

    #[serde(default)]
    pub recipients: Vec<String>,

    /// Verified sender address. Falls back to the first recipient.
    pub sender: Option<String>,

    #[serde(default = "default_locations")]
    pub locations: Vec<Location>,

    pub history_path: Option<PathBuf>,

    /// Custom HTML template; the bundled one is used when absent.
    pub template_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openweather_api_key: None,
            sendgrid_api_key: None,
            recipients: Vec::new(),
            sender: None,
            locations: default_locations(),
            history_path: None,
            template_path: None,
        }
    }
}

/// Validated configuration for a single run. Every required value is present.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openweather_api_key: String,
    pub sendgrid_api_key: String,
    pub recipients: Vec<String>,
    pub sender: String,
    pub locations: Vec<Location>,
    pub history_path: PathBuf,
    pub template_path: Option<PathBuf>,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    /// Load config from an explicit path; a missing file yields the default.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-mail", "weather-mail")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`; empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("OPENWEATHER_API_KEY") {
            self.openweather_api_key = Some(key);
        }
        if let Some(key) = get("SENDGRID_API_KEY") {
            self.sendgrid_api_key = Some(key);
        }
        if let Some(list) = get("RECIPIENT_EMAIL") {
            self.recipients = parse_recipients(&list);
        }
        if let Some(sender) = get("SENDER_EMAIL") {
            self.sender = Some(sender);
        }
        if let Some(path) = get("WEATHER_HISTORY_FILE") {
            self.history_path = Some(PathBuf::from(path));
        }
    }

    /// Check required values and produce run settings.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let openweather_api_key =
            non_empty(&self.openweather_api_key).ok_or(ConfigError::MissingWeatherKey)?;
        let sendgrid_api_key =
            non_empty(&self.sendgrid_api_key).ok_or(ConfigError::MissingEmailKey)?;

        let recipients: Vec<String> = self
            .recipients
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        let first = recipients.first().cloned().ok_or(ConfigError::NoRecipients)?;

        if self.locations.is_empty() {
            return Err(ConfigError::NoLocations);
        }

        Ok(Settings {
            openweather_api_key,
            sendgrid_api_key,
            sender: non_empty(&self.sender).unwrap_or(first),
            recipients,
            locations: self.locations.clone(),
            history_path: self
                .history_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE)),
            template_path: self.template_path.clone(),
        })
    }
}

/// Split a comma-separated recipient list, dropping blanks.
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
