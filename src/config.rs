//! Configuration for the engine runtime and the TCP server.
//!
//! Every field has a default, so an empty TOML file (or none at all) is a
//! valid configuration:
//!
//! ```toml
//! listen = "127.0.0.1:8000"
//! max_sessions = 256
//!
//! [engine]
//! arena_capacity = 100000
//! pin_to_core = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::error::ConfigError;

/// Engine runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of order records the arena holds.
    pub arena_capacity: u32,

    /// Let the arena grow past `arena_capacity` instead of rejecting.
    pub growable_arena: bool,

    /// Depth of the bounded instruction queue in front of the engine.
    pub queue_depth: usize,

    /// Pin the engine thread to the last CPU core.
    pub pin_to_core: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            arena_capacity: 1_000_000,
            growable_arena: false,
            queue_depth: 65_535,
            pin_to_core: false,
        }
    }
}

impl EngineConfig {
    /// Small fixed arena, for tests.
    pub fn with_capacity(arena_capacity: u32) -> Self {
        Self {
            arena_capacity,
            ..Self::default()
        }
    }

    pub(crate) fn build_arena(&self) -> Arena {
        if self.growable_arena {
            Arena::growable(self.arena_capacity)
        } else {
            Arena::new(self.arena_capacity)
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub listen: String,

    /// Maximum number of simultaneously connected sessions.
    pub max_sessions: usize,

    /// Notifications queued per session before further ones are dropped.
    pub outbound_depth: usize,

    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            max_sessions: 1024,
            outbound_depth: 4096,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}
