//! Dissector settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use fiveco_engine::DissectorConfig;
use serde::{Deserialize, Serialize};

/// Output format of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Summary lines and indented decode trees
    #[default]
    Text,
    /// One JSON document
    Json,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Engine configuration
    #[serde(default)]
    pub dissector: DissectorConfig,
    /// Report format
    #[serde(default)]
    pub format: OutputFormat,
    /// Print decode trees, not only summary lines
    #[serde(default = "default_true")]
    pub show_trees: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dissector: DissectorConfig::default(),
            format: OutputFormat::Text,
            show_trees: true,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for fiveco-dissect
    /// Uses $XDG_CONFIG_HOME/fiveco-dissect, falls back to ~/.config/fiveco-dissect
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("fiveco-dissect"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("fiveco-dissect"))
    }

    /// Get the default settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings
    ///
    /// An explicit path must exist and parse. Without one, the default file
    /// is used when present, and defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::settings_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.dissector.validate()?;
        Ok(settings)
    }

    /// Save settings to `path`, or to the default settings file
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, String> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::settings_path()
                .ok_or_else(|| "Could not determine settings path".to_string())?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(&path, json).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(path)
    }
}
