//! Wire codecs.
//!
//! - [`geometry`]: fixed-width little-endian point and color blocks.
//! - [`osc`]: OSC 1.0 message/bundle framing for the datagram profile.
//! - [`json`]: JSON shapes for the base64 and event-wrapped profiles.
//! - [`wrapper`]: the profile selector tying the three together.
//!
//! Every decoder is total over arbitrary input: malformed bytes surface as
//! [`CodecError`], never as a panic.

pub mod geometry;
pub mod json;
pub mod osc;
pub mod wrapper;

pub use wrapper::{Envelope, PayloadWrapper, WireOptions, WireProfile};

/// Opaque unit carried by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(s) => s.len(),
            Payload::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(s) => s.as_bytes(),
            Payload::Binary(b) => b,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed geometry: {len} bytes is not a multiple of {width}")]
    MalformedGeometry { len: usize, width: usize },
    #[error("malformed color: block must be exactly 12 bytes, got {len}")]
    MalformedColor { len: usize },
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl CodecError {
    pub(crate) fn payload(msg: impl Into<String>) -> Self {
        CodecError::MalformedPayload(msg.into())
    }
}
