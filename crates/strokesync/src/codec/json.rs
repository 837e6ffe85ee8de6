//! JSON shapes for the text profiles.
//!
//! Field names match the peers already deployed (`index`, `colors`,
//! `points`, `co`, `eventname`), so renames here are wire-breaking.

use serde::{Deserialize, Serialize};

/// Base64 profile: both geometry blocks ride as base64 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Base64Stroke {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eventname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub index: i32,
    pub colors: String,
    pub points: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WirePoint {
    pub co: [f32; 3],
}

/// Event-wrapped profile: plain numeric points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStroke {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eventname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f32; 3]>,
    pub points: Vec<WirePoint>,
}

/// Body of an event message: the strokes themselves, or the same array
/// pre-serialized into a string by the emitter.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EventBody {
    Strokes(Vec<EventStroke>),
    Encoded(String),
}

#[derive(Debug, Deserialize)]
pub struct EventObject {
    pub eventname: String,
    pub data: EventBody,
}

/// Every accepted event-wrapped envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EventEnvelope {
    Batch(Vec<EventStroke>),
    Tagged(String, EventBody),
    Object(EventObject),
    Single(EventStroke),
}

/// Strip the numeric packet-type prefix Socket.IO puts before the JSON
/// (`42["event", ...]`).
pub fn strip_packet_type(text: &str) -> &str {
    text.trim_start()
        .trim_start_matches(|c: char| c.is_ascii_digit())
}

/// Packet type of an Engine.IO / Socket.IO frame that carries no event data
/// (open handshake, ping, pong, namespace connect), or `None` for a data frame.
///
/// Only `42` (event) and `43` (ack) frames carry a body; unprefixed text is
/// treated as data.
pub fn control_frame(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let body = strip_packet_type(trimmed);
    let kind = &trimmed[..trimmed.len() - body.len()];
    if kind.is_empty() {
        return None;
    }
    if body.is_empty() || !(kind.starts_with("42") || kind.starts_with("43")) {
        return Some(kind);
    }
    None
}
