//! Configuration file handling
//!
//! All settings live in one TOML file, by default `~/.config/arkpad/config.toml`.
//! A commented default is written on first start. Values are read once when a
//! session is created; editing the file mid-session has no effect on it.

use crate::link::{Endpoint, READ_TIMEOUT};
use crate::mapping::{AxisSettings, ButtonMapping};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/arkpad";
const CONFIG_FILE: &str = "config.toml";

/// Timing of the link and its two periodic loops
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Maximum wait for any reply
    pub read_timeout_ms: u64,
    /// Period of DATA frames (20 ms ≈ 50 Hz)
    pub transmission_interval_ms: u64,
    /// Pause between keepalive pings
    pub keepalive_interval_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let read_timeout_ms = READ_TIMEOUT.as_millis() as u64;
        Self {
            read_timeout_ms,
            transmission_interval_ms: 20,
            keepalive_interval_ms: read_timeout_ms,
        }
    }
}

impl LinkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn transmission_interval(&self) -> Duration {
        Duration::from_millis(self.transmission_interval_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }
}

/// Gamepad input settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadConfig {
    /// Fraction of stick/trigger travel ignored around rest
    pub deadzone: f32,
    /// Flip the tilt direction
    pub invert_tilt: bool,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            deadzone: 0.05,
            invert_tilt: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub device: Endpoint,
    pub link: LinkConfig,
    pub buttons: ButtonMapping,
    pub brake: AxisSettings,
    pub throttle: AxisSettings,
    pub gamepad: GamepadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: Endpoint::new("192.168.4.1", 4210),
            link: LinkConfig::default(),
            buttons: ButtonMapping::default(),
            brake: AxisSettings::brake(),
            throttle: AxisSettings::throttle(),
            gamepad: GamepadConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.host.trim().is_empty() {
            return Err(eyre!("Device host must not be empty"));
        }
        if self.device.port == 0 {
            return Err(eyre!("Device port must not be 0"));
        }
        if self.link.read_timeout_ms == 0 {
            return Err(eyre!("read_timeout_ms must be greater than 0"));
        }
        if self.link.transmission_interval_ms == 0 {
            return Err(eyre!("transmission_interval_ms must be greater than 0"));
        }
        if self.link.keepalive_interval_ms == 0 {
            return Err(eyre!("keepalive_interval_ms must be greater than 0"));
        }
        if !(0.0..1.0).contains(&self.gamepad.deadzone) {
            return Err(eyre!(
                "Gamepad deadzone must be within 0.0..1.0, got {}",
                self.gamepad.deadzone
            ));
        }
        Ok(())
    }

    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Writes the default configuration if no file exists at `path`
    pub async fn ensure_default_config(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            debug!("Config file {} exists", path.display());
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = Config::default().to_toml()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write default config file: {}", e))?;

        info!("Wrote default config to {}", path.display());
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        debug!("Config: {:?}", config);
        Ok(config)
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{EasingType, KeyCode};

    #[test]
    fn default_config_round_trips() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = Config::from_toml(
            r#"
            [device]
            host = "10.0.0.7"
            port = 9000

            [buttons]
            auto_clutch = false
            handbrake = "NORTH"

            [throttle]
            easing = "fast_out_linear_in"
            sustain_ms = 0
            release_ms = 150
            "#,
        )
        .unwrap();

        assert_eq!(config.device, Endpoint::new("10.0.0.7", 9000));
        assert!(!config.buttons.auto_clutch);
        assert_eq!(config.buttons.handbrake, KeyCode::North);
        assert_eq!(config.buttons.shift_up, KeyCode::Tl);
        assert_eq!(config.throttle.easing, EasingType::FastOutLinearIn);
        assert_eq!(config.brake, AxisSettings::brake());
        assert_eq!(config.link.read_timeout(), READ_TIMEOUT);
        assert_eq!(config.link.transmission_interval(), Duration::from_millis(20));
    }

    #[test]
    fn unknown_key_code_is_rejected() {
        let result = Config::from_toml(
            r#"
            [buttons]
            clutch = "SELECT"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let result = Config::from_toml(
            r#"
            [link]
            transmission_interval_ms = 0
            "#,
        );
        assert!(result.is_err());

        let mut config = Config::default();
        config.device.port = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn default_file_is_written_once() {
        let dir = std::env::temp_dir().join(format!("arkpad-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = tokio::fs::remove_dir_all(&dir).await;

        Config::ensure_default_config(&path).await.unwrap();
        assert_eq!(Config::load(&path).await.unwrap(), Config::default());

        tokio::fs::write(&path, "[device]\nhost = \"pedals.local\"\nport = 7000\n")
            .await
            .unwrap();
        Config::ensure_default_config(&path).await.unwrap();
        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.device, Endpoint::new("pedals.local", 7000));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
