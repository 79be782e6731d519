//! Chainmesh Configuration System
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./chainmesh.yaml` (current directory - highest priority)
//! 2. `~/.config/chainmesh/chainmesh.yaml` (user config directory)
//! 3. `/etc/chainmesh/chainmesh.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority files.
//!
//! # YAML Structure
//!
//! ```yaml
//! node:
//!   identity:
//!     name: "alice-phone"
//!   limits:
//!     max_links: 2
//!   connect:
//!     invite_timeout_secs: 10
//!     handshake_timeout_secs: 30
//! ```

mod node;

use crate::{IdentityError, PeerIdentity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use node::{BuffersConfig, ConnectConfig, LimitsConfig, NodeConfig};

/// Default config filename.
const CONFIG_FILENAME: &str = "chainmesh.yaml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),
}

/// Identity configuration (`node.identity.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Display name announced to the mesh (`node.identity.name`).
    /// If not specified, a random `node-xxxx` name is generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Node configuration (`node.*`).
    #[serde(default)]
    pub node: NodeConfig,
}

impl Config {
    /// Create a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Returns a tuple of (config, paths_loaded) where paths_loaded contains
    /// the paths that were successfully loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System config (lowest priority)
        paths.push(PathBuf::from("/etc/chainmesh").join(CONFIG_FILENAME));

        // User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("chainmesh").join(CONFIG_FILENAME));
        }

        // Current directory (highest priority)
        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when they differ from
    /// the defaults.
    pub fn merge(&mut self, other: Config) {
        let defaults = NodeConfig::default();

        if other.node.identity.name.is_some() {
            self.node.identity.name = other.node.identity.name;
        }
        if other.node.limits != defaults.limits {
            self.node.limits = other.node.limits;
        }
        if other.node.connect.invite_timeout_secs != defaults.connect.invite_timeout_secs {
            self.node.connect.invite_timeout_secs = other.node.connect.invite_timeout_secs;
        }
        if other.node.connect.handshake_timeout_secs != defaults.connect.handshake_timeout_secs {
            self.node.connect.handshake_timeout_secs = other.node.connect.handshake_timeout_secs;
        }
        if other.node.buffers.event_channel != defaults.buffers.event_channel {
            self.node.buffers.event_channel = other.node.buffers.event_channel;
        }
        if other.node.buffers.command_channel != defaults.buffers.command_channel {
            self.node.buffers.command_channel = other.node.buffers.command_channel;
        }
        if other.node.tick_interval_secs != defaults.tick_interval_secs {
            self.node.tick_interval_secs = other.node.tick_interval_secs;
        }
    }

    /// Create the local identity from this configuration.
    ///
    /// Uses the configured name if present, otherwise generates one.
    pub fn create_identity(&self) -> Result<PeerIdentity, ConfigError> {
        match &self.node.identity.name {
            Some(name) => Ok(PeerIdentity::new(name.clone())?),
            None => Ok(PeerIdentity::generate()),
        }
    }

    /// Check if an identity is configured (vs. will be generated).
    pub fn has_identity(&self) -> bool {
        self.node.identity.name.is_some()
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
