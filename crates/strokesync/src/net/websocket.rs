use std::io;
use std::net::TcpStream;

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use super::transport::{Transport, TransportError};
use crate::codec::Payload;

/// WebSocket client transport.
///
/// The handshake is blocking; afterwards the TCP stream is switched to
/// non-blocking so `receive` can be polled once per tick.
pub struct WsTransport {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    url: String,
    closed: bool,
}

impl WsTransport {
    pub fn connect(address: &str) -> Result<Self, TransportError> {
        let url = ws_url(address)?;
        let (mut socket, response) = tungstenite::connect(url.as_str())?;

        match socket.get_mut() {
            MaybeTlsStream::Plain(stream) => {
                stream.set_nodelay(true)?;
                stream.set_nonblocking(true)?;
            }
            _ => {
                return Err(TransportError::Unsupported(
                    "only plain ws:// streams are supported".into(),
                ));
            }
        }

        log::debug!("websocket {} upgraded ({})", url, response.status());

        Ok(Self {
            socket,
            url,
            closed: false,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Prefix a bare `host:port` with `ws://`. Secure schemes are rejected.
pub fn ws_url(address: &str) -> Result<String, TransportError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(TransportError::InvalidAddress("empty address".into()));
    }
    if address.starts_with("wss://") {
        return Err(TransportError::Unsupported(
            "wss:// requires a TLS-terminating proxy".into(),
        ));
    }
    if address.starts_with("ws://") {
        return Ok(address.to_string());
    }
    if address.contains("://") {
        return Err(TransportError::InvalidAddress(address.to_string()));
    }
    Ok(format!("ws://{address}"))
}

fn would_block(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
}

impl Transport for WsTransport {
    fn send(&mut self, payload: &Payload) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let len = payload.len();
        let message = match payload {
            Payload::Text(s) => Message::Text(s.clone()),
            Payload::Binary(b) => Message::Binary(b.clone()),
        };

        match self.socket.send(message) {
            Ok(()) => Ok(len),
            // Queued in the write buffer; flushed on the next poll.
            Err(ref e) if would_block(e) => Ok(len),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                self.closed = true;
                Err(TransportError::Closed)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn receive(&mut self) -> Result<Vec<Payload>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let mut payloads = Vec::new();

        loop {
            match self.socket.read() {
                Ok(Message::Text(s)) => payloads.push(Payload::Text(s)),
                Ok(Message::Binary(b)) => payloads.push(Payload::Binary(b)),
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    log::debug!("websocket {} closed by peer: {:?}", self.url, frame);
                    self.closed = true;
                    break;
                }
                Err(ref e) if would_block(e) => break,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    self.closed = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Deliver what arrived before the close; report the close next call.
        if self.closed && payloads.is_empty() {
            return Err(TransportError::Closed);
        }
        Ok(payloads)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        match self.socket.flush() {
            Ok(()) => Ok(()),
            Err(ref e) if would_block(e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.socket.close(None) {
            if !would_block(&e) {
                log::debug!("websocket {} close: {}", self.url, e);
            }
        }
        let _ = self.socket.flush();
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url() {
        assert_eq!(ws_url("localhost:8080").unwrap(), "ws://localhost:8080");
        assert_eq!(ws_url("ws://host:1/path").unwrap(), "ws://host:1/path");
        assert!(matches!(ws_url("wss://host"), Err(TransportError::Unsupported(_))));
        assert!(matches!(ws_url("http://host"), Err(TransportError::InvalidAddress(_))));
        assert!(ws_url("  ").is_err());
    }
}
