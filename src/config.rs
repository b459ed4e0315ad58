//! Configuration for the window client core
//!
//! Loads configuration from TOML file at `~/.config/area/client.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::wm::placement::PlacementPolicy;
use crate::wm::visibility::HiddenPreviews;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub behavior: BehaviorConfig,
    pub desktops: DesktopConfig,
    pub decorations: DecorationConfig,
    pub sync: SyncConfig,
    pub compositor: CompositorConfig,
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            // Auto-generate default config file
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        info!("Configuration loaded from {:?}", path);
        debug!("Config: {:?}", config);
        Ok(config)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("area");
        Ok(config_dir.join("client.toml"))
    }

    /// Save default configuration to file
    pub fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;
        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Window behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Milliseconds before an unanswered ping escalates; 0 disables pinging
    pub kill_ping_timeout_ms: u64,
    pub hidden_previews: HiddenPreviews,
    /// Leave remote host names out of window captions
    pub condensed_title: bool,
    pub placement: PlacementPolicy,
    pub focus_stealing_prevention: bool,
    pub separate_screen_focus: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            kill_ping_timeout_ms: 5000,
            hidden_previews: HiddenPreviews::Shown,
            condensed_title: false,
            placement: PlacementPolicy::Smart,
            focus_stealing_prevention: true,
            separate_screen_focus: false,
        }
    }
}

/// Virtual desktop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    pub count: u32,
    pub names: Vec<String>,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            count: 4,
            names: (1..=4).map(|n| format!("Desktop {}", n)).collect(),
        }
    }
}

/// Window decoration geometry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorationConfig {
    pub titlebar_height: u16,
    pub border_width: u16,
    /// Invisible grab margin outside the borders
    pub resize_border: u16,
}

impl Default for DecorationConfig {
    fn default() -> Self {
        Self {
            titlebar_height: 32,
            border_width: 2,
            resize_border: 0,
        }
    }
}

/// Resize synchronization timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub failsafe_timeout_ms: u64,
    /// Failsafe before the window painted for the first time
    pub initial_failsafe_timeout_ms: u64,
    /// How long an interactive resize waits for the client
    pub resize_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            failsafe_timeout_ms: 10_000,
            initial_failsafe_timeout_ms: 1000,
            resize_timeout_ms: 250,
        }
    }
}

/// Compositor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Assume a compositing manager is running at startup
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("area").join("client.toml");
        Config::save_default(&path).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.behavior.kill_ping_timeout_ms, 5000);
        assert_eq!(config.desktops.count, 4);
        assert_eq!(config.sync.initial_failsafe_timeout_ms, 1000);
        assert_eq!(config.behavior.hidden_previews, HiddenPreviews::Shown);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        fs::write(
            &path,
            "[behavior]\nkill_ping_timeout_ms = 0\nhidden_previews = \"always\"\n\n[desktops]\ncount = 2\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.behavior.kill_ping_timeout_ms, 0);
        assert_eq!(config.behavior.hidden_previews, HiddenPreviews::Always);
        assert_eq!(config.behavior.placement, PlacementPolicy::Smart);
        assert_eq!(config.desktops.count, 2);
        assert_eq!(config.decorations.titlebar_height, 32);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        fs::write(&path, "[behavior\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
