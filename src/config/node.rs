//! Node configuration subsections.
//!
//! All the `node.*` configuration parameters: identity, link limits,
//! connection timing and internal buffers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::IdentityConfig;

// ============================================================================
// Node Configuration Subsections
// ============================================================================

/// Resource limits (`node.limits.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Max simultaneous neighbor links (`node.limits.max_links`).
    #[serde(default = "LimitsConfig::default_max_links")]
    pub max_links: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_links: Self::default_max_links(),
        }
    }
}

impl LimitsConfig {
    fn default_max_links() -> usize { 2 }
}

/// Link establishment timing (`node.connect.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Timeout handed to the transport with each invitation
    /// (`node.connect.invite_timeout_secs`).
    #[serde(default = "ConnectConfig::default_invite_timeout_secs")]
    pub invite_timeout_secs: u64,
    /// How long one link may hold the node-wide connecting flag before it
    /// is torn down (`node.connect.handshake_timeout_secs`).
    #[serde(default = "ConnectConfig::default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            invite_timeout_secs: Self::default_invite_timeout_secs(),
            handshake_timeout_secs: Self::default_handshake_timeout_secs(),
        }
    }
}

impl ConnectConfig {
    fn default_invite_timeout_secs() -> u64 { 10 }
    fn default_handshake_timeout_secs() -> u64 { 30 }

    /// Invitation timeout as a Duration.
    pub fn invite_timeout(&self) -> Duration {
        Duration::from_secs(self.invite_timeout_secs)
    }

    /// Handshake timeout in milliseconds.
    pub fn handshake_timeout_ms(&self) -> u64 {
        self.handshake_timeout_secs.saturating_mul(1000)
    }
}

/// Internal channel sizes (`node.buffers.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffersConfig {
    /// Transport event channel capacity (`node.buffers.event_channel`).
    #[serde(default = "BuffersConfig::default_event_channel")]
    pub event_channel: usize,
    /// Command channel capacity (`node.buffers.command_channel`).
    #[serde(default = "BuffersConfig::default_command_channel")]
    pub command_channel: usize,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            event_channel: Self::default_event_channel(),
            command_channel: Self::default_command_channel(),
        }
    }
}

impl BuffersConfig {
    fn default_event_channel() -> usize { 256 }
    fn default_command_channel() -> usize { 32 }
}

// ============================================================================
// Node Configuration (Root)
// ============================================================================

/// Node configuration (`node.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identity configuration (`node.identity.*`).
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Resource limits (`node.limits.*`).
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Link establishment timing (`node.connect.*`).
    #[serde(default)]
    pub connect: ConnectConfig,

    /// Internal buffers (`node.buffers.*`).
    #[serde(default)]
    pub buffers: BuffersConfig,

    /// Housekeeping tick interval in seconds (`node.tick_interval_secs`).
    #[serde(default = "NodeConfig::default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            limits: LimitsConfig::default(),
            connect: ConnectConfig::default(),
            buffers: BuffersConfig::default(),
            tick_interval_secs: Self::default_tick_interval_secs(),
        }
    }
}

impl NodeConfig {
    fn default_tick_interval_secs() -> u64 { 1 }
}
