//! Presence Hub
//!
//! Tracks which users are connected and fans out presence and location
//! events. A single worker task owns the [`Registry`]; connection handlers
//! talk to it through the cloneable [`PresenceHub`] handle, so connect,
//! update, and disconnect events are applied one at a time in arrival order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::messages::{Location, LocationUpdated, ServerMessage};
use super::registry::{ConnectionId, Registry, Session};

/// Configuration for the presence hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-connection outbound queue size. Pushes to a full queue are dropped.
    pub outbound_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
        }
    }
}

/// Point-in-time copy of a registered session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub user_id: String,
    pub connection_id: ConnectionId,
    pub latest_location: Option<Location>,
    pub connected_at: DateTime<Utc>,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            connection_id: session.connection_id.clone(),
            latest_location: session.latest_location.clone(),
            connected_at: session.connected_at,
        }
    }
}

enum HubCommand {
    Connect {
        user_id: String,
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    },
    LocationUpdate {
        user_id: String,
        connection_id: ConnectionId,
        location: Location,
    },
    Disconnect {
        user_id: String,
        connection_id: ConnectionId,
    },
    OnlineUsers {
        reply: oneshot::Sender<Vec<String>>,
    },
    Session {
        user_id: String,
        reply: oneshot::Sender<Option<SessionSnapshot>>,
    },
}

/// Handle to the hub worker. Cheap to clone.
#[derive(Clone)]
pub struct PresenceHub {
    commands: mpsc::UnboundedSender<HubCommand>,
    config: HubConfig,
}

impl PresenceHub {
    /// Start the hub worker on the current tokio runtime
    pub fn spawn(config: HubConfig) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let worker = HubWorker {
            registry: Registry::new(),
            commands: rx,
        };
        tokio::spawn(worker.run());

        Self { commands, config }
    }

    /// Create the outbound queue for a new connection
    pub fn outbound_channel(
        &self,
    ) -> (mpsc::Sender<ServerMessage>, mpsc::Receiver<ServerMessage>) {
        mpsc::channel(self.config.outbound_capacity.max(1))
    }

    /// Register an identified connection and announce it to everyone else.
    ///
    /// Returns the connection id that later updates and the disconnect must
    /// carry.
    pub fn connect(
        &self,
        user_id: &str,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<ConnectionId, HubError> {
        if user_id.is_empty() {
            return Err(HubError::MissingIdentity);
        }

        let connection_id = Uuid::new_v4().to_string();
        self.send(HubCommand::Connect {
            user_id: user_id.to_string(),
            connection_id: connection_id.clone(),
            sender,
        })?;
        Ok(connection_id)
    }

    /// Record a new position and relay it to everyone else
    pub fn location_update(
        &self,
        user_id: &str,
        connection_id: &str,
        location: Location,
    ) -> Result<(), HubError> {
        self.send(HubCommand::LocationUpdate {
            user_id: user_id.to_string(),
            connection_id: connection_id.to_string(),
            location,
        })
    }

    /// Deregister a connection and announce the user as offline
    pub fn disconnect(&self, user_id: &str, connection_id: &str) -> Result<(), HubError> {
        self.send(HubCommand::Disconnect {
            user_id: user_id.to_string(),
            connection_id: connection_id.to_string(),
        })
    }

    /// Currently registered user ids, sorted.
    ///
    /// Answered after every previously enqueued command has been applied.
    pub async fn online_users(&self) -> Result<Vec<String>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::OnlineUsers { reply })?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn online_count(&self) -> Result<usize, HubError> {
        Ok(self.online_users().await?.len())
    }

    pub async fn session(&self, user_id: &str) -> Result<Option<SessionSnapshot>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Session {
            user_id: user_id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| HubError::Closed)
    }

    fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands.send(command).map_err(|_| HubError::Closed)
    }
}

/// Owns the registry and applies commands sequentially
struct HubWorker {
    registry: Registry,
    commands: mpsc::UnboundedReceiver<HubCommand>,
}

impl HubWorker {
    async fn run(mut self) {
        tracing::debug!("Presence hub started");

        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }

        tracing::debug!(sessions = self.registry.len(), "Presence hub stopped");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect {
                user_id,
                connection_id,
                sender,
            } => self.on_connect(user_id, connection_id, sender),
            HubCommand::LocationUpdate {
                user_id,
                connection_id,
                location,
            } => self.on_location_update(&user_id, &connection_id, location),
            HubCommand::Disconnect {
                user_id,
                connection_id,
            } => self.on_disconnect(&user_id, &connection_id),
            HubCommand::OnlineUsers { reply } => {
                let _ = reply.send(self.registry.user_ids());
            }
            HubCommand::Session { user_id, reply } => {
                let _ = reply.send(self.registry.get(&user_id).map(SessionSnapshot::from));
            }
        }
    }

    fn on_connect(
        &mut self,
        user_id: String,
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        let session = Session::new(user_id.clone(), connection_id.clone(), sender);

        if let Some(previous) = self.registry.put(user_id.clone(), session) {
            tracing::warn!(
                user_id = %user_id,
                previous_connection_id = %previous.connection_id,
                connection_id = %connection_id,
                "User reconnected, replacing existing session"
            );
        }

        tracing::info!(
            user_id = %user_id,
            connection_id = %connection_id,
            online = self.registry.len(),
            "User connected"
        );

        let message = ServerMessage::UserOnline(user_id.clone());
        self.broadcast_except(&user_id, &message);
    }

    fn on_location_update(&mut self, user_id: &str, connection_id: &str, location: Location) {
        tracing::debug!(
            user_id = %user_id,
            latitude = location.latitude,
            longitude = location.longitude,
            timestamp = %location.timestamp,
            "Received location update"
        );

        let message = ServerMessage::UserLocationUpdated(LocationUpdated::new(user_id, &location));

        if !self.registry.update_if_current(user_id, connection_id, location) {
            tracing::debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                "Dropping location update for unregistered session"
            );
            return;
        }

        self.broadcast_except(user_id, &message);
    }

    fn on_disconnect(&mut self, user_id: &str, connection_id: &str) {
        if self.registry.remove_if_current(user_id, connection_id).is_none() {
            tracing::debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                "Connection closed without a registered session"
            );
            return;
        }

        tracing::info!(
            user_id = %user_id,
            connection_id = %connection_id,
            online = self.registry.len(),
            "User disconnected"
        );

        // The departing session is already gone, so "everyone" is everyone else.
        let message = ServerMessage::UserOffline(user_id.to_string());
        self.broadcast_all(&message);
    }

    fn broadcast_except(&self, exclude_user_id: &str, message: &ServerMessage) {
        let mut delivered = 0;
        self.registry.for_each_other_than(exclude_user_id, |session| {
            if push(session, message) {
                delivered += 1;
            }
        });

        tracing::trace!(
            event = message.event_name(),
            recipients = delivered,
            "Broadcast event"
        );
    }

    fn broadcast_all(&self, message: &ServerMessage) {
        let mut delivered = 0;
        self.registry.for_each(|session| {
            if push(session, message) {
                delivered += 1;
            }
        });

        tracing::trace!(
            event = message.event_name(),
            recipients = delivered,
            "Broadcast event"
        );
    }
}

/// Fire-and-forget push to one session. Never blocks.
fn push(session: &Session, message: &ServerMessage) -> bool {
    match session.sender.try_send(message.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(
                user_id = %session.user_id,
                connection_id = %session.connection_id,
                event = message.event_name(),
                "Outbound queue full, dropping event"
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(
                user_id = %session.user_id,
                connection_id = %session.connection_id,
                event = message.event_name(),
                "Outbound queue closed, dropping event"
            );
            false
        }
    }
}

/// Errors that can occur in the presence hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Connection did not supply a userId")]
    MissingIdentity,

    #[error("Presence hub is not running")]
    Closed,
}
