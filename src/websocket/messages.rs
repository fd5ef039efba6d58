//! WebSocket Message Types
//!
//! Every frame is a JSON text envelope of the form
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-supplied timestamp, relayed exactly as received.
///
/// Clients send either epoch milliseconds or a formatted string; the relay
/// never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Number(serde_json::Number),
    Text(String),
}

impl From<i32> for Timestamp {
    fn from(value: i32) -> Self {
        Timestamp::Number(value.into())
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Timestamp::Number(value.into())
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Timestamp::Number(value.into())
    }
}

impl From<&str> for Timestamp {
    fn from(value: &str) -> Self {
        Timestamp::Text(value.to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Number(n) => write!(f, "{}", n),
            Timestamp::Text(s) => f.write_str(s),
        }
    }
}

/// A single position report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Timestamp,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, timestamp: impl Into<Timestamp>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: timestamp.into(),
        }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// The client moved
    LocationUpdate(Location),
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Another user connected. Payload is the bare user id.
    UserOnline(String),
    /// Another user reported a new position
    UserLocationUpdated(LocationUpdated),
    /// A user disconnected. Payload is the bare user id.
    UserOffline(String),
}

/// Payload of [`ServerMessage::UserLocationUpdated`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdated {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Timestamp,
}

impl LocationUpdated {
    pub fn new(user_id: &str, location: &Location) -> Self {
        Self {
            user_id: user_id.to_string(),
            latitude: location.latitude,
            longitude: location.longitude,
            timestamp: location.timestamp.clone(),
        }
    }
}

impl ServerMessage {
    /// Event name as it appears on the wire
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::UserOnline(_) => "userOnline",
            ServerMessage::UserLocationUpdated(_) => "userLocationUpdated",
            ServerMessage::UserOffline(_) => "userOffline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_deserialize_location_update() {
        let json = r#"{"event": "locationUpdate", "data": {"latitude": 10, "longitude": 20.5, "timestamp": 100}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        let ClientMessage::LocationUpdate(location) = msg;
        assert_eq!(location.latitude, 10.0);
        assert_eq!(location.longitude, 20.5);
        assert_eq!(location.timestamp, Timestamp::from(100));
    }

    #[test]
    fn test_string_timestamp_is_kept_verbatim() {
        let json = r#"{"event": "locationUpdate", "data": {"latitude": 1, "longitude": 2, "timestamp": "2024-05-01T10:00:00Z"}}"#;
        let ClientMessage::LocationUpdate(location) = serde_json::from_str(json).unwrap();
        assert_eq!(location.timestamp, Timestamp::from("2024-05-01T10:00:00Z"));
    }

    #[test]
    fn test_location_update_missing_field_is_rejected() {
        let json = r#"{"event": "locationUpdate", "data": {"latitude": 1, "timestamp": 5}}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let json = r#"{"event": "teleport", "data": {}}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_server_message_serialize_online() {
        let msg = ServerMessage::UserOnline("u2".to_string());
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, serde_json::json!({"event": "userOnline", "data": "u2"}));
    }

    #[test]
    fn test_server_message_serialize_offline() {
        let msg = ServerMessage::UserOffline("u2".to_string());
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"event":"userOffline","data":"u2"}"#);
    }

    #[test]
    fn test_server_message_serialize_location_updated() {
        let location = Location::new(1.5, 2.25, 5);
        let msg = ServerMessage::UserLocationUpdated(LocationUpdated::new("u2", &location));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "event": "userLocationUpdated",
                "data": {"userId": "u2", "latitude": 1.5, "longitude": 2.25, "timestamp": 5}
            })
        );
        assert_eq!(msg.event_name(), "userLocationUpdated");
    }
}
