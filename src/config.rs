//! Startup configuration
//!
//! The configuration is read exactly once when the process starts. A missing
//! file is not an error: every section falls back to its defaults so the
//! keyboard stays usable on a fresh machine. Nothing is ever written back.

use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/padboard";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_ENV: &str = "PADBOARD_CONFIG";

/// Complete application configuration
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub orientation: Orientation,
    pub device: DeviceConfig,
}

/// Controller source and analog tuning
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// evdev node of the controller
    pub controller_path: PathBuf,

    /// Deadzone in raw analog units, shared by navigation and mouse motion
    pub deadzone: i32,

    /// Multiplier applied after normalisation
    pub sensitivity: f32,

    /// Device units per frame at full deflection
    pub mouse_speed: i32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            controller_path: PathBuf::from("/dev/input/event2"),
            deadzone: 400,
            sensitivity: 1.0,
            mouse_speed: 10,
        }
    }
}

/// Sign and axis corrections between the physical stick and the outputs.
///
/// The defaults reproduce the orientation of the reference pad: navigation
/// moves opposite to the raw stick sign, and mouse motion swaps X/Y and
/// inverts both. Other hardware can flip these without touching code.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Orientation {
    pub invert_navigation: bool,
    pub swap_motion_axes: bool,
    pub invert_motion: bool,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            invert_navigation: true,
            swap_motion_axes: true,
            invert_motion: true,
        }
    }
}

/// Identity of the virtual input device
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Padboard Virtual Input".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from `$PADBOARD_CONFIG` or the default location.
    pub async fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => default_config_path(),
        };
        Self::load_from(&path).await
    }

    /// Loads and validates the file at `path`, using defaults if it does not exist.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check config file {}: {}", path.display(), e))?;

        let config = if exists {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
            let config = Self::parse(&content)
                .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
            info!("Loaded configuration from {}", path.display());
            config
        } else {
            warn!(
                "Config file {} does not exist, using defaults",
                path.display()
            );
            Config::default()
        };

        config.validate()?;
        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("{}", e))
    }

    pub fn validate(&self) -> Result<()> {
        let input = &self.input;
        if input.deadzone < 0 {
            return Err(eyre!("deadzone must not be negative, got {}", input.deadzone));
        }
        if !input.sensitivity.is_finite() || input.sensitivity <= 0.0 {
            return Err(eyre!(
                "sensitivity must be a positive number, got {}",
                input.sensitivity
            ));
        }
        if input.mouse_speed < 0 {
            return Err(eyre!(
                "mouse_speed must not be negative, got {}",
                input.mouse_speed
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    });
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.input.deadzone, 400);
        assert_eq!(config.input.mouse_speed, 10);
        assert!(config.orientation.invert_navigation);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::parse(
            r#"
            [input]
            deadzone = 250
            sensitivity = 1.5

            [orientation]
            invert_motion = false
            "#,
        )
        .unwrap();

        assert_eq!(config.input.deadzone, 250);
        assert_eq!(config.input.sensitivity, 1.5);
        assert_eq!(config.input.mouse_speed, 10);
        assert_eq!(
            config.input.controller_path,
            PathBuf::from("/dev/input/event2")
        );
        assert!(!config.orientation.invert_motion);
        assert!(config.orientation.swap_motion_axes);
        assert_eq!(config.device.name, "Padboard Virtual Input");
    }

    #[test]
    fn validation_rejects_bad_tunables() {
        let mut config = Config::default();
        config.input.sensitivity = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.input.deadzone = -1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.input.mouse_speed = -3;
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("padboard-missing-config-test.toml");
        let _ = std::fs::remove_file(&path);
        let config = Config::load_from(&path).await.unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn invalid_file_is_reported() {
        let path = std::env::temp_dir().join(format!(
            "padboard-invalid-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[input]\nsensitivity = -2.0\n").unwrap();
        let result = Config::load_from(&path).await;
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }
}
