//! JSON-based configuration persistence for the peer daemon (§6).
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows: `%APPDATA%\KVMOverIP\config.json`
//! - Linux:   `~/.config/kvmoverip/config.json`
//! - macOS:   `~/Library/Application Support/KVMOverIP/config.json`
//!
//! This is a binary/infrastructure-layer concern only: the core crate's
//! types take an already-parsed `AppConfig` at construction and never read
//! files themselves.

use std::path::PathBuf;

use kvm_core::domain::Position;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub machine_id: String,
    #[serde(default = "default_machine_name")]
    pub machine_name: String,
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub peers: Vec<PeerConfigEntry>,
    #[serde(default)]
    pub clipboard: ClipboardConfig,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// One configured peer, mirroring `kvm_core::domain::PeerRecord::from_config`'s
/// constructor arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerConfigEntry {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub position: Position,
    #[serde(default)]
    pub offset_x: i32,
    #[serde(default)]
    pub offset_y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClipboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_machine_name() -> String {
    gethostname()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_local_port() -> u16 {
    24800
}

fn default_discovery_port() -> u16 {
    24801
}

fn gethostname() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "kvm-peer".to_string())
}

impl AppConfig {
    /// A fresh configuration for first run: a random machine id, no
    /// configured peers, clipboard sync on.
    pub fn new_default(machine_id: String) -> Self {
        Self {
            machine_id,
            machine_name: default_machine_name(),
            local_port: default_local_port(),
            discovery_port: default_discovery_port(),
            enabled: true,
            peers: Vec::new(),
            clipboard: ClipboardConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// Resolves the platform-appropriate config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("KVMOverIP"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("kvmoverip"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("KVMOverIP")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json"))
}

/// Loads `AppConfig` from disk, generating a fresh default (with a new
/// random machine id) if the file does not yet exist.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(AppConfig::new_default(uuid::Uuid::new_v4().to_string()))
        }
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk, creating the config directory if needed.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_default_has_expected_ports() {
        let cfg = AppConfig::new_default("m1".to_string());
        assert_eq!(cfg.local_port, 24800);
        assert_eq!(cfg.discovery_port, 24801);
        assert!(cfg.enabled);
        assert!(cfg.peers.is_empty());
        assert!(cfg.clipboard.enabled);
    }

    #[test]
    fn app_config_serializes_and_deserializes_round_trip() {
        let mut cfg = AppConfig::new_default("m1".to_string());
        cfg.peers.push(PeerConfigEntry {
            id: "m2".to_string(),
            name: "desk-right".to_string(),
            address: "192.168.1.50".to_string(),
            port: 24800,
            position: Position::Right,
            offset_x: 0,
            offset_y: 0,
        });

        let json = serde_json::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(cfg, restored);
    }

    #[test]
    fn deserialize_minimal_json_uses_defaults() {
        let json = r#"{"machine_id": "m1"}"#;
        let cfg: AppConfig = serde_json::from_str(json).expect("deserialize minimal");

        assert_eq!(cfg.local_port, 24800);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.peers.is_empty());
        assert!(cfg.clipboard.enabled);
    }

    #[test]
    fn deserialize_invalid_json_returns_parse_error() {
        let bad_json = "{ not valid json";
        let result: Result<AppConfig, serde_json::Error> = serde_json::from_str(bad_json);
        assert!(result.is_err());
    }

    #[test]
    fn config_file_path_ends_with_config_json() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.json"));
        }
    }
}
