//! Connection Registry
//!
//! Maps each identified user to its live session. The registry is a plain
//! owned value: the hub worker is its only owner, so every operation runs
//! to completion before the next connection event is looked at.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::mpsc;

use super::messages::{Location, ServerMessage};

/// Server-assigned identifier of one transport connection
pub type ConnectionId = String;

/// One connected, identified client
#[derive(Debug, Clone)]
pub struct Session {
    /// Client-supplied identifier, not authenticated
    pub user_id: String,
    /// Transport this session is bound to
    pub connection_id: ConnectionId,
    /// Outbound queue drained by the connection's writer task
    pub sender: mpsc::Sender<ServerMessage>,
    /// Last reported position, `None` until the first update
    pub latest_location: Option<Location>,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        connection_id: impl Into<ConnectionId>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            connection_id: connection_id.into(),
            sender,
            latest_location: None,
            connected_at: Utc::now(),
        }
    }
}

/// user_id -> Session
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<String, Session>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, returning the one it replaced (same user id)
    pub fn put(&mut self, user_id: impl Into<String>, session: Session) -> Option<Session> {
        self.sessions.insert(user_id.into(), session)
    }

    pub fn get(&self, user_id: &str) -> Option<&Session> {
        self.sessions.get(user_id)
    }

    /// Overwrite the latest location. Returns false if the user is absent.
    pub fn update(&mut self, user_id: &str, location: Location) -> bool {
        match self.sessions.get_mut(user_id) {
            Some(session) => {
                session.latest_location = Some(location);
                true
            }
            None => false,
        }
    }

    /// Like [`Registry::update`], but only if the stored session is still
    /// bound to `connection_id`.
    pub fn update_if_current(
        &mut self,
        user_id: &str,
        connection_id: &str,
        location: Location,
    ) -> bool {
        match self.sessions.get_mut(user_id) {
            Some(session) if session.connection_id == connection_id => {
                session.latest_location = Some(location);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, user_id: &str) -> Option<Session> {
        self.sessions.remove(user_id)
    }

    /// Remove the session only if it is still bound to `connection_id`.
    ///
    /// A reconnect under the same user id replaces the session; the old
    /// transport closing afterwards must not evict its replacement.
    pub fn remove_if_current(&mut self, user_id: &str, connection_id: &str) -> Option<Session> {
        match self.sessions.get(user_id) {
            Some(session) if session.connection_id == connection_id => {
                self.sessions.remove(user_id)
            }
            _ => None,
        }
    }

    /// Call `f` for every session whose key differs from `exclude_user_id`.
    /// Iteration order is unspecified.
    pub fn for_each_other_than<F>(&self, exclude_user_id: &str, mut f: F)
    where
        F: FnMut(&Session),
    {
        self.sessions
            .iter()
            .filter(|(user_id, _)| user_id.as_str() != exclude_user_id)
            .for_each(|(_, session)| f(session));
    }

    /// Call `f` for every registered session
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Session),
    {
        self.sessions.values().for_each(f);
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Registered user ids, sorted
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }
}
