//! WebSocket Real-Time Broadcast
//!
//! Pushes every sensor reading to all open client connections.
//!
//! ## Architecture
//!
//! - **Registry**: the live set of registered connections, keyed by connection id
//! - **Hub**: actor that owns the registry; serializes registration and broadcast
//! - **Handler**: WebSocket upgrade and per-connection lifecycle
//! - **Messages**: the `{time, value}` envelope
//!
//! ## Usage
//!
//! Clients connect to `/ws` and send any JSON document to register. From then
//! on they receive every reading:
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8082/ws');
//!
//! ws.onopen = () => ws.send(JSON.stringify({hello: 'hub'}));
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data); // {time: "14:03:27", value: ...}
//!   console.log(msg.time, msg.value);
//! };
//! ```

mod handler;
mod hub;
mod messages;
mod registry;
mod transport;

pub use handler::{websocket_handler, Session, SessionState};
pub use hub::{BroadcastReport, Hub, HubConfig, HubError, HubHandle};
pub use messages::{parse_client_message, Envelope};
pub use registry::{ConnectionEntry, ConnectionId, EquipmentId, FanOut, Registry};
pub use transport::{ChannelTransport, Transport, TransportError};
