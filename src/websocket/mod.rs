//! WebSocket Presence Relay
//!
//! Relays online/offline status and location updates between connected
//! clients.
//!
//! ## Architecture
//!
//! - **Registry**: user id to live session, owned by the hub worker
//! - **PresenceHub**: applies connect/update/disconnect and fans out events
//! - **Handler**: WebSocket upgrade, identification, frame pumping
//! - **Messages**: wire format
//!
//! ## Usage
//!
//! Clients connect to `/ws?userId=<id>`. Connections without a `userId`
//! are closed immediately.
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:3002/ws?userId=alice');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({
//!     event: 'locationUpdate',
//!     data: {latitude: 52.52, longitude: 13.40, timestamp: Date.now()},
//!   }));
//! };
//!
//! ws.onmessage = (event) => {
//!   const {event: name, data} = JSON.parse(event.data);
//!   // name is one of userOnline, userLocationUpdated, userOffline
//! };
//! ```

mod handler;
mod hub;
mod messages;
mod registry;

pub use handler::{identify, websocket_handler, ConnectParams};
pub use hub::{HubConfig, HubError, PresenceHub, SessionSnapshot};
pub use messages::{ClientMessage, Location, LocationUpdated, ServerMessage, Timestamp};
pub use registry::{ConnectionId, Registry, Session};
