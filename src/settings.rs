// src/settings.rs
//
// Gateway settings, stored as TOML. Every field has a default so a partial
// file (or none at all) still yields a usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::serial::{LineSettings, Parity, SerialTransport, DEFAULT_BAUD_RATE};
use crate::io::TransportError;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GatewaySettings {
    #[serde(default)]
    pub serial: SerialSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default)]
    pub verbose: bool, // log every frame sent and received
    #[serde(default = "default_data_bits")]
    pub data_bits: u8, // 5-8
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8, // 1 or 2
    #[serde(default)]
    pub parity: Parity, // "none" | "odd" | "even"
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_speed() -> u32 {
    DEFAULT_BAUD_RATE
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            speed: default_speed(),
            verbose: false,
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::None,
        }
    }
}

impl SerialSettings {
    pub fn line(&self) -> LineSettings {
        LineSettings {
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity.clone(),
        }
    }

    /// Open the configured port. The transport is not listening yet.
    pub fn open_transport(&self) -> Result<SerialTransport, TransportError> {
        SerialTransport::open_with(&self.port, self.speed, &self.line(), self.verbose)
    }
}

impl GatewaySettings {
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Load settings from `path`. On first run (no file) the defaults are
/// written out and returned.
pub fn load_settings(path: &Path) -> Result<GatewaySettings, SettingsError> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let settings = GatewaySettings::from_toml_str(&content).map_err(|e| {
            tlog!("[settings] Failed to parse {}: {}", path.display(), e);
            e
        })?;
        Ok(settings)
    } else {
        let settings = GatewaySettings::default();
        tlog!("[settings] {} not found, writing defaults", path.display());
        save_settings(path, &settings)?;
        Ok(settings)
    }
}

pub fn save_settings(path: &Path, settings: &GatewaySettings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, settings.to_toml_string()?)?;
    Ok(())
}
