use std::io;

use super::connection::ProtocolMode;
use super::endpoint::UdpTransport;
use super::websocket::WsTransport;
use crate::codec::Payload;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("connection closed")]
    Closed,
}

/// A connected, non-blocking message transport.
///
/// `receive` drains whatever has arrived and must return immediately when
/// nothing is pending. A peer-initiated shutdown surfaces as
/// [`TransportError::Closed`].
pub trait Transport: Send {
    fn send(&mut self, payload: &Payload) -> Result<usize, TransportError>;

    fn receive(&mut self) -> Result<Vec<Payload>, TransportError>;

    /// Push out anything buffered by an earlier `send`.
    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self);

    fn describe(&self) -> String;
}

/// Opens transports. Runs on a background thread during the handshake.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        address: &str,
        mode: ProtocolMode,
        local_bind: &str,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

impl Connector for DefaultConnector {
    fn connect(
        &self,
        address: &str,
        mode: ProtocolMode,
        local_bind: &str,
    ) -> Result<Box<dyn Transport>, TransportError> {
        match mode {
            ProtocolMode::Udp => Ok(Box::new(UdpTransport::connect(local_bind, address)?)),
            ProtocolMode::Ws => Ok(Box::new(WsTransport::connect(address)?)),
        }
    }
}
