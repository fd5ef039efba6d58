//! Application State
//!
//! Shared state accessible by all handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::config::ServerConfig;
use crate::websocket::{HubConfig, PresenceHub};
use std::sync::Arc;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Presence hub every WebSocket connection registers with
    pub hub: PresenceHub,
    /// Server configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create state around an already running hub
    pub fn new(hub: PresenceHub, config: ServerConfig) -> Self {
        Self {
            hub,
            config: Arc::new(config),
        }
    }

    /// Spawn a fresh hub and wrap it
    pub fn with_hub_config(config: ServerConfig, hub_config: HubConfig) -> Self {
        Self::new(PresenceHub::spawn(hub_config), config)
    }
}
