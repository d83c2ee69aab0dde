//! Session configuration

use serde::Deserialize;

/// How handlers of one dispatch pass are run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Handlers run in list order on the dispatching thread; a slow handler
    /// holds up the rest of the pass and the next event
    Sync,
    /// Each handler runs as its own blocking task on the tokio runtime
    #[default]
    Concurrent,
}

/// Pub/sub bridging of events between processes
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Subscribe to the fabric as handlers get registered
    pub enabled: bool,
    /// Queue group shared by every process that should split the stream
    pub queue_group: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            enabled: false,
            queue_group: "herald".to_string(),
        }
    }
}

/// Herald session configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub dispatch_mode: DispatchMode,
    /// Feed events into a state cache before user handlers
    pub track_state: bool,
    pub bridge: BridgeConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            dispatch_mode: DispatchMode::default(),
            track_state: true,
            bridge: BridgeConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    /// Shorthand for [`DispatchMode::Sync`]
    pub fn sync_events(self) -> Self {
        self.with_dispatch_mode(DispatchMode::Sync)
    }

    pub fn with_state_tracking(mut self, enabled: bool) -> Self {
        self.track_state = enabled;
        self
    }

    pub fn with_bridge(mut self, queue_group: impl Into<String>) -> Self {
        self.bridge = BridgeConfig {
            enabled: true,
            queue_group: queue_group.into(),
        };
        self
    }
}
