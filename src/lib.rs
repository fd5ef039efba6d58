//! # Presence Relay
//!
//! Real-time presence and location broadcast relay. Clients connect over
//! WebSocket with a user id, push location updates, and receive every
//! other user's online/offline status and location as it changes.
//!
//! ## Modules
//!
//! - [`websocket`]: Connection registry, presence hub, and wire protocol
//! - [`api`]: HTTP server with Axum (page, static assets, `/ws`)
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use presence_relay::websocket::{HubConfig, Location, PresenceHub};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = PresenceHub::spawn(HubConfig::default());
//!
//!     let (alice_tx, _alice_rx) = hub.outbound_channel();
//!     let (bob_tx, mut bob_rx) = hub.outbound_channel();
//!
//!     let alice = hub.connect("alice", alice_tx)?;
//!     hub.connect("bob", bob_tx)?;
//!     hub.location_update("alice", &alice, Location::new(52.52, 13.40, 1_700_000_000_000i64))?;
//!
//!     // bob sees the update; alice does not receive its own update
//!     while let Some(event) = bob_rx.recv().await {
//!         println!("bob received {}", event.event_name());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod websocket;

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{
    websocket_handler, ClientMessage, ConnectParams, HubConfig, HubError, Location,
    LocationUpdated, PresenceHub, Registry, ServerMessage, Session, SessionSnapshot, Timestamp,
};

pub use config::{Config, ConfigError, HubSettings, LoadedConfig, LoggingConfig, ServerConfig};
