//! Engine and plugin lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum EngineState {
    Stopped = 0,
    Running = 1,
    Paused = 2,
    Error = 3,
}

impl EngineState {
    /// Decode the value stored in the engine's atomic state cell.
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => EngineState::Stopped,
            1 => EngineState::Running,
            2 => EngineState::Paused,
            _ => EngineState::Error,
        }
    }

    pub fn accepts_tasks(&self) -> bool {
        matches!(self, EngineState::Running)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "STOPPED"),
            EngineState::Running => write!(f, "RUNNING"),
            EngineState::Paused => write!(f, "PAUSED"),
            EngineState::Error => write!(f, "ERROR"),
        }
    }
}

/// Point-in-time engine status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub worker_count: usize,
    /// Time since the last successful `start`, zero when stopped.
    pub uptime: Duration,
}

/// Plugin lifecycle state.
///
/// ```text
/// Registered ──initialize──► Initialized ──activate──► Active
///      │                          ▲  ◄──deactivate──     │
///      │                          └──────shutdown────────┴──► ShutDown
///      └──── failed hook ──► Failed
/// ```
///
/// `Failed` is terminal: a plugin whose `initialize` or `shutdown` hook
/// errored can only be unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Registered,
    Initialized,
    Active,
    ShutDown,
    Failed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginState::Registered => write!(f, "registered"),
            PluginState::Initialized => write!(f, "initialized"),
            PluginState::Active => write!(f, "active"),
            PluginState::ShutDown => write!(f, "shut down"),
            PluginState::Failed => write!(f, "failed"),
        }
    }
}

/// Metadata about a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub state: PluginState,
}

impl PluginDescriptor {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            author: author.into(),
            description: String::new(),
            state: PluginState::Registered,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_state_roundtrips_through_u8() {
        for state in [
            EngineState::Stopped,
            EngineState::Running,
            EngineState::Paused,
            EngineState::Error,
        ] {
            assert_eq!(EngineState::from_u8(state as u8), state);
        }
        assert!(EngineState::Running.accepts_tasks());
        assert!(!EngineState::Paused.accepts_tasks());
    }

    #[test]
    fn test_descriptor_starts_registered() {
        let descriptor = PluginDescriptor::new("echo", "1.0.0", "NexusEngine Team");
        assert_eq!(descriptor.state, PluginState::Registered);
        assert!(descriptor.description.is_empty());
    }
}
