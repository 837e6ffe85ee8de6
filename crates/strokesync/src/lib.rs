pub mod codec;
pub mod config;
pub mod net;
pub mod stroke;
pub mod transform;

pub use codec::{CodecError, Envelope, Payload, PayloadWrapper, WireOptions, WireProfile};
pub use config::{ConfigError, SessionConfig};
pub use net::{
    Connector, DefaultConnector, DisconnectReason, ProtocolMode, RecentIdWindow, SessionError,
    SessionEvent, SessionState, SessionStats, SyncSession, Transport, TransportError,
    UdpTransport, WsTransport,
};
pub use stroke::{Color3, Point3, Stroke};
pub use transform::{CoordinateTransform, SpaceTransform};
