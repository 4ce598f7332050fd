// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Every section is optional. Any invalid field results in a
//! HardValidationError that prevents the daemon from starting.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HardValidationError, SecretKeeperError, SecretKeeperResult};
use crate::types::{Capacity, DEFAULT_CAPACITY};

/// Raw device section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawDeviceConfig {
    #[serde(default = "default_device_name")]
    name: String,
    #[serde(default = "default_capacity")]
    capacity: usize,
}

fn default_device_name() -> String {
    "secret".to_string()
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for RawDeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            capacity: default_capacity(),
        }
    }
}

/// Raw server section.
#[derive(Debug, Deserialize)]
struct RawServerConfig {
    #[serde(default = "default_socket_path")]
    socket_path: String,
    #[serde(default = "default_socket_mode")]
    socket_mode: u32,
}

fn default_socket_path() -> String {
    "/tmp/secretkeeper/secret.sock".to_string()
}

fn default_socket_mode() -> u32 {
    0o666 // Any local user may connect; the slot enforces ownership
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            socket_mode: default_socket_mode(),
        }
    }
}

/// Raw checkpoint section.
#[derive(Debug, Deserialize)]
struct RawCheckpointConfig {
    #[serde(default = "default_checkpoint_path")]
    path: String,
}

fn default_checkpoint_path() -> String {
    "/tmp/secretkeeper/state.json".to_string()
}

impl Default for RawCheckpointConfig {
    fn default() -> Self {
        Self {
            path: default_checkpoint_path(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    device: RawDeviceConfig,
    #[serde(default)]
    server: RawServerConfig,
    #[serde(default)]
    checkpoint: RawCheckpointConfig,
}

/// Validated device configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub name: String,
    pub capacity: Capacity,
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    pub socket_mode: u32,
}

/// Validated checkpoint configuration.
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    pub path: PathBuf,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub device: DeviceConfig,
    pub server: ServerConfig,
    pub checkpoint: CheckpointConfig,
}

impl Default for Config {
    fn default() -> Self {
        // Defaults always validate.
        Self {
            device: DeviceConfig {
                name: default_device_name(),
                capacity: Capacity::default(),
            },
            server: ServerConfig {
                socket_path: PathBuf::from(default_socket_path()),
                socket_mode: default_socket_mode(),
            },
            checkpoint: CheckpointConfig {
                path: PathBuf::from(default_checkpoint_path()),
            },
        }
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> SecretKeeperResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SecretKeeperError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SecretKeeperError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> SecretKeeperResult<Config> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }
        Self::load_file(path)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> SecretKeeperResult<Config> {
        // An empty document means "all defaults".
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| SecretKeeperError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> SecretKeeperResult<Config> {
        Ok(Config {
            device: Self::validate_device(raw.device)?,
            server: Self::validate_server(raw.server)?,
            checkpoint: Self::validate_checkpoint(raw.checkpoint)?,
        })
    }

    fn validate_device(raw: RawDeviceConfig) -> SecretKeeperResult<DeviceConfig> {
        if raw.name.is_empty() || raw.name.len() > 64 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "device.name",
                value: raw.name.clone(),
                reason: "Must be between 1 and 64 characters".to_string(),
            }
            .into());
        }

        if !raw
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "device.name",
                value: raw.name,
                reason: "Must contain only alphanumeric characters, hyphens, and underscores"
                    .to_string(),
            }
            .into());
        }

        let capacity = Capacity::new(raw.capacity)?;

        Ok(DeviceConfig {
            name: raw.name,
            capacity,
        })
    }

    fn validate_server(raw: RawServerConfig) -> SecretKeeperResult<ServerConfig> {
        if raw.socket_path.is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "server.socket_path",
                value: raw.socket_path,
                reason: "Socket path cannot be empty".to_string(),
            }
            .into());
        }

        if raw.socket_mode > 0o777 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "server.socket_mode",
                value: format!("{:#o}", raw.socket_mode),
                reason: "Only permission bits (<= 0o777) are allowed".to_string(),
            }
            .into());
        }

        Ok(ServerConfig {
            socket_path: PathBuf::from(raw.socket_path),
            socket_mode: raw.socket_mode,
        })
    }

    fn validate_checkpoint(raw: RawCheckpointConfig) -> SecretKeeperResult<CheckpointConfig> {
        if raw.path.is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "checkpoint.path",
                value: raw.path,
                reason: "Checkpoint path cannot be empty".to_string(),
            }
            .into());
        }

        Ok(CheckpointConfig {
            path: PathBuf::from(raw.path),
        })
    }
}
