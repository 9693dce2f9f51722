// src/settings.rs
//
// Persisted UDP CAN settings (bridge target, local port, wire layout).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::io::udp::{DEFAULT_SERVER_IP, DEFAULT_SERVER_PORT};
use crate::io::{UdpCanConfig, WireLayout};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no platform configuration directory")]
    NoConfigDir,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UdpCanSettings {
    #[serde(default = "default_server_ip")]
    pub server_ip: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// 0 = ephemeral
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    #[serde(default)]
    pub layout: WireLayout, // "compact" | "fixed"
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_server_ip() -> String {
    DEFAULT_SERVER_IP.to_string()
}
fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}
fn default_local_port() -> u16 {
    DEFAULT_SERVER_PORT // cannelloni binds the bridge port on both ends
}
fn default_read_timeout_ms() -> u64 {
    100
}

impl Default for UdpCanSettings {
    fn default() -> Self {
        Self {
            server_ip: default_server_ip(),
            server_port: default_server_port(),
            local_port: default_local_port(),
            layout: WireLayout::default(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl UdpCanSettings {
    /// Transport configuration for these settings.
    pub fn to_config(&self) -> UdpCanConfig {
        UdpCanConfig {
            server_ip: self.server_ip.clone(),
            server_port: self.server_port,
            local_port: self.local_port,
            layout: self.layout,
            read_timeout: Duration::from_millis(self.read_timeout_ms.max(1)),
        }
    }
}

/// `<config dir>/udpcan/settings.json`
pub fn get_settings_path() -> Result<PathBuf, SettingsError> {
    let config_dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
    Ok(config_dir.join("udpcan").join("settings.json"))
}

/// Load settings, falling back to defaults when the file does not exist.
pub fn load_settings_from(path: &Path) -> Result<UdpCanSettings, SettingsError> {
    if !path.exists() {
        return Ok(UdpCanSettings::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| SettingsError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn save_settings_to(path: &Path, settings: &UdpCanSettings) -> Result<(), SettingsError> {
    let io_err = |e| SettingsError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_string_pretty(settings).map_err(|e| SettingsError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, json).map_err(io_err)
}

/// Load from the platform settings path.
pub fn load_settings() -> Result<UdpCanSettings, SettingsError> {
    load_settings_from(&get_settings_path()?)
}

/// Save to the platform settings path.
pub fn save_settings(settings: &UdpCanSettings) -> Result<(), SettingsError> {
    save_settings_to(&get_settings_path()?, settings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("udpcan-settings-{}-{}", name, std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn test_defaults() {
        let settings = UdpCanSettings::default();
        assert_eq!(settings.server_ip, "192.168.1.100");
        assert_eq!(settings.server_port, 20000);
        assert_eq!(settings.local_port, 20000);
        assert_eq!(settings.layout, WireLayout::Compact);
        assert_eq!(settings.read_timeout_ms, 100);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: UdpCanSettings =
            serde_json::from_str(r#"{ "server_ip": "10.0.0.5", "layout": "fixed" }"#).unwrap();
        assert_eq!(settings.server_ip, "10.0.0.5");
        assert_eq!(settings.server_port, 20000);
        assert_eq!(settings.layout, WireLayout::Fixed);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = temp_path("missing");
        assert_eq!(load_settings_from(&path).unwrap(), UdpCanSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("save");
        let settings = UdpCanSettings {
            server_ip: "172.16.0.9".to_string(),
            server_port: 3333,
            local_port: 0,
            layout: WireLayout::Fixed,
            read_timeout_ms: 50,
        };
        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), settings);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_parse_error_names_file() {
        let path = temp_path("broken");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_settings_from(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("settings.json"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_to_config_clamps_timeout() {
        let settings = UdpCanSettings {
            read_timeout_ms: 0,
            ..UdpCanSettings::default()
        };
        let config = settings.to_config();
        assert_eq!(config.read_timeout, Duration::from_millis(1));
        assert_eq!(config.server_port, 20000);
    }
}
