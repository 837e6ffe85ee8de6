//! Session and transport layer.
//!
//! Transports are non-blocking and polled; the [`SyncSession`] owns one and
//! runs every inbound payload through the codec, the length filter, the
//! [`RecentIdWindow`] and the coordinate transform.

mod connection;
mod endpoint;
mod session;
mod stats;
pub(crate) mod tracking;
mod transport;
mod websocket;

pub use connection::{DisconnectReason, ProtocolMode, SessionEvent, SessionState};
pub use endpoint::{MAX_DATAGRAM_SIZE, UdpTransport};
pub use session::{SessionError, SyncSession};
pub use stats::SessionStats;
pub use tracking::{DEFAULT_RECENT_WINDOW, MAX_RECENT_WINDOW, RecentIdWindow};
pub use transport::{Connector, DefaultConnector, Transport, TransportError};
pub use websocket::{WsTransport, ws_url};
