use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::geometry::{self, COLOR_DIVISOR, POINT_DIVISOR};
use super::json::{
    Base64Stroke, EventBody, EventEnvelope, EventStroke, WirePoint, control_frame,
    strip_packet_type,
};
use super::osc::{self, OscArg, OscMessage};
use super::{CodecError, Payload};
use crate::stroke::{Color3, DEFAULT_SOURCE_EVENT, Stroke};

pub const DEFAULT_PEER_ID: &str = "strokesync";
pub const DEFAULT_OSC_ADDRESS: &str = "/latk/stroke";
pub const INBOUND_FRAME_EVENT: &str = "newFrameFromServer";
pub const OUTBOUND_STROKE_EVENT: &str = "clientStrokeToServer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireProfile {
    #[default]
    RawBinaryMulti,
    JsonBase64,
    JsonEventWrapped,
}

impl WireProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            WireProfile::RawBinaryMulti => "raw_binary_multi",
            WireProfile::JsonBase64 => "json_base64",
            WireProfile::JsonEventWrapped => "json_event_wrapped",
        }
    }
}

impl fmt::Display for WireProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "raw_binary_multi" | "osc" => Ok(WireProfile::RawBinaryMulti),
            "json_base64" | "base64" => Ok(WireProfile::JsonBase64),
            "json_event_wrapped" | "events" => Ok(WireProfile::JsonEventWrapped),
            other => Err(format!("unknown wire profile '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WireOptions {
    pub peer_id: String,
    pub osc_address: String,
    pub inbound_event: String,
    pub outbound_event: String,
    pub point_divisor: f32,
    pub color_divisor: f32,
    /// Color given to event-wrapped strokes that carry none.
    pub fallback_color: Color3,
}

impl Default for WireOptions {
    fn default() -> Self {
        Self {
            peer_id: DEFAULT_PEER_ID.to_string(),
            osc_address: DEFAULT_OSC_ADDRESS.to_string(),
            inbound_event: INBOUND_FRAME_EVENT.to_string(),
            outbound_event: OUTBOUND_STROKE_EVENT.to_string(),
            point_divisor: POINT_DIVISOR,
            color_divisor: COLOR_DIVISOR,
            fallback_color: Color3::WHITE,
        }
    }
}

/// A decoded wire message.
///
/// `strokes` is empty when the message belongs to a channel this wrapper
/// does not handle; `event` still carries the channel name.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub profile: WireProfile,
    pub event: String,
    pub peer_id: Option<String>,
    pub strokes: Vec<Stroke>,
}

#[derive(Debug, Clone)]
pub struct PayloadWrapper {
    profile: WireProfile,
    options: WireOptions,
}

impl PayloadWrapper {
    pub fn new(profile: WireProfile, options: WireOptions) -> Self {
        Self { profile, options }
    }

    pub fn profile(&self) -> WireProfile {
        self.profile
    }

    pub fn options(&self) -> &WireOptions {
        &self.options
    }

    pub fn decode(&self, payload: &Payload) -> Result<Envelope, CodecError> {
        match self.profile {
            WireProfile::RawBinaryMulti => self.decode_osc(payload),
            WireProfile::JsonBase64 => self.decode_base64(payload_text(payload)?),
            WireProfile::JsonEventWrapped => self.decode_events(payload_text(payload)?),
        }
    }

    pub fn encode(&self, stroke: &Stroke) -> Result<Payload, CodecError> {
        match self.profile {
            WireProfile::RawBinaryMulti => Ok(self.encode_osc(stroke)),
            WireProfile::JsonBase64 => self.encode_base64(stroke),
            WireProfile::JsonEventWrapped => self.encode_events(stroke),
        }
    }

    fn color_block(&self, color: Color3) -> [u8; geometry::ELEMENT_WIDTH] {
        geometry::encode_color(Color3::from_vec3(
            color.to_vec3() * self.options.color_divisor,
        ))
    }

    fn point_block(&self, stroke: &Stroke) -> Vec<u8> {
        geometry::encode_points(&geometry::scale_points(
            stroke.points(),
            self.options.point_divisor,
        ))
    }

    fn decode_osc(&self, payload: &Payload) -> Result<Envelope, CodecError> {
        let Payload::Binary(bytes) = payload else {
            return Err(CodecError::payload("raw_binary_multi expects a binary payload"));
        };
        let msg = osc::decode_packet(bytes)?;

        let [
            OscArg::Str(peer_id),
            OscArg::Int(index),
            OscArg::Blob(color),
            OscArg::Blob(points),
        ] = msg.args.as_slice()
        else {
            return Err(CodecError::payload(format!(
                "expected (string, int, blob, blob) arguments, got {} argument(s)",
                msg.args.len()
            )));
        };

        let color = geometry::decode_color(color, self.options.color_divisor)?;
        let points = geometry::decode_points(points, self.options.point_divisor)?;
        let stroke = Stroke::new(*index, color, points).with_source_event(msg.address.as_str());

        Ok(Envelope {
            profile: self.profile,
            event: msg.address.clone(),
            peer_id: Some(peer_id.clone()),
            strokes: vec![stroke],
        })
    }

    fn encode_osc(&self, stroke: &Stroke) -> Payload {
        let msg = OscMessage::new(self.options.osc_address.as_str())
            .with_arg(OscArg::Str(self.options.peer_id.clone()))
            .with_arg(OscArg::Int(stroke.index()))
            .with_arg(OscArg::Blob(self.color_block(stroke.color()).to_vec()))
            .with_arg(OscArg::Blob(self.point_block(stroke)));
        Payload::Binary(msg.encode())
    }

    fn decode_base64(&self, text: &str) -> Result<Envelope, CodecError> {
        let wire: Base64Stroke = serde_json::from_str(text)
            .map_err(|e| CodecError::payload(format!("invalid base64 stroke json: {e}")))?;

        let colors = BASE64
            .decode(wire.colors.as_bytes())
            .map_err(|e| CodecError::payload(format!("invalid base64 in colors: {e}")))?;
        let points = BASE64
            .decode(wire.points.as_bytes())
            .map_err(|e| CodecError::payload(format!("invalid base64 in points: {e}")))?;

        let color = geometry::decode_color(&colors, self.options.color_divisor)?;
        let points = geometry::decode_points(&points, self.options.point_divisor)?;

        let event = wire
            .eventname
            .unwrap_or_else(|| DEFAULT_SOURCE_EVENT.to_string());
        let mut stroke = Stroke::new(wire.index, color, points).with_source_event(event.clone());
        if let Some(timestamp) = wire.timestamp {
            stroke = stroke.with_timestamp(timestamp);
        }

        Ok(Envelope {
            profile: self.profile,
            event,
            peer_id: None,
            strokes: vec![stroke],
        })
    }

    fn encode_base64(&self, stroke: &Stroke) -> Result<Payload, CodecError> {
        let wire = Base64Stroke {
            eventname: Some(self.options.outbound_event.clone()),
            timestamp: Some(stroke.timestamp()),
            index: stroke.index(),
            colors: BASE64.encode(self.color_block(stroke.color())),
            points: BASE64.encode(self.point_block(stroke)),
        };
        to_text(&wire)
    }

    fn decode_events(&self, text: &str) -> Result<Envelope, CodecError> {
        if let Some(kind) = control_frame(text) {
            log::trace!("socket.io control frame '{}'", kind);
            return Ok(Envelope {
                profile: self.profile,
                event: format!("control:{kind}"),
                peer_id: None,
                strokes: Vec::new(),
            });
        }

        let envelope: EventEnvelope = serde_json::from_str(strip_packet_type(text))
            .map_err(|e| CodecError::payload(format!("invalid event message: {e}")))?;

        let (event, body) = match envelope {
            EventEnvelope::Batch(strokes) => {
                (self.options.inbound_event.clone(), EventBody::Strokes(strokes))
            }
            EventEnvelope::Tagged(event, body) => (event, body),
            EventEnvelope::Object(obj) => (obj.eventname, obj.data),
            EventEnvelope::Single(stroke) => (
                stroke
                    .eventname
                    .clone()
                    .unwrap_or_else(|| self.options.inbound_event.clone()),
                EventBody::Strokes(vec![stroke]),
            ),
        };

        if event != self.options.inbound_event {
            log::debug!("ignoring event '{}' (routed to '{}')", event, self.options.inbound_event);
            return Ok(Envelope {
                profile: self.profile,
                event,
                peer_id: None,
                strokes: Vec::new(),
            });
        }

        let wire_strokes = match body {
            EventBody::Strokes(strokes) => strokes,
            EventBody::Encoded(inner) => serde_json::from_str::<Vec<EventStroke>>(&inner)
                .map_err(|e| CodecError::payload(format!("invalid encoded stroke batch: {e}")))?,
        };

        let strokes = wire_strokes
            .into_iter()
            .map(|wire| {
                let color = wire.color.map(Color3::from).unwrap_or(self.options.fallback_color);
                let points = wire.points.iter().map(|p| Vec3::from_array(p.co)).collect();
                let stroke = Stroke::new(wire.index, color, points).with_source_event(event.as_str());
                match wire.timestamp {
                    Some(timestamp) => stroke.with_timestamp(timestamp),
                    None => stroke,
                }
            })
            .collect();

        Ok(Envelope {
            profile: self.profile,
            event,
            peer_id: None,
            strokes,
        })
    }

    fn encode_events(&self, stroke: &Stroke) -> Result<Payload, CodecError> {
        let wire = EventStroke {
            eventname: Some(self.options.outbound_event.clone()),
            timestamp: Some(stroke.timestamp()),
            index: stroke.index(),
            color: Some(stroke.color().to_array()),
            points: stroke
                .points()
                .iter()
                .map(|p| WirePoint { co: p.to_array() })
                .collect(),
        };
        to_text(&wire)
    }
}

fn payload_text(payload: &Payload) -> Result<&str, CodecError> {
    match payload {
        Payload::Text(s) => Ok(s),
        Payload::Binary(b) => {
            std::str::from_utf8(b).map_err(|_| CodecError::payload("text profile payload is not UTF-8"))
        }
    }
}

fn to_text<T: Serialize>(wire: &T) -> Result<Payload, CodecError> {
    serde_json::to_string(wire)
        .map(Payload::Text)
        .map_err(|e| CodecError::payload(format!("serialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapper(profile: WireProfile) -> PayloadWrapper {
        PayloadWrapper::new(profile, WireOptions::default())
    }

    /// A peer that accepts what `wrapper` sends.
    fn receiver(profile: WireProfile) -> PayloadWrapper {
        PayloadWrapper::new(
            profile,
            WireOptions {
                inbound_event: OUTBOUND_STROKE_EVENT.to_string(),
                ..Default::default()
            },
        )
    }

    fn triangle() -> Stroke {
        Stroke::new(
            42,
            Color3::new(1.0, 0.0, 0.0),
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 10.0, 0.0),
            ],
        )
    }

    fn assert_same_geometry(a: &Stroke, b: &Stroke, eps: f32) {
        assert_eq!(a.index(), b.index());
        assert_eq!(a.len(), b.len());
        assert!(a.color().to_vec3().abs_diff_eq(b.color().to_vec3(), eps));
        for (p, q) in a.points().iter().zip(b.points()) {
            assert!(p.abs_diff_eq(*q, eps), "{p} != {q}");
        }
    }

    #[test]
    fn test_raw_binary_multi_wire_layout() {
        let Payload::Binary(bytes) = wrapper(WireProfile::RawBinaryMulti).encode(&triangle()).unwrap()
        else {
            panic!("expected binary payload");
        };
        let msg = osc::decode_packet(&bytes).unwrap();
        assert_eq!(msg.address, DEFAULT_OSC_ADDRESS);

        let [OscArg::Str(peer), OscArg::Int(index), OscArg::Blob(color), OscArg::Blob(points)] =
            msg.args.as_slice()
        else {
            panic!("unexpected args {:?}", msg.args);
        };
        assert_eq!(peer, DEFAULT_PEER_ID);
        assert_eq!(*index, 42);

        assert_eq!(color.len(), 12);
        assert_eq!(
            color.as_slice(),
            &geometry::encode_color(Color3::new(255.0, 0.0, 0.0))[..]
        );

        assert_eq!(points.len(), 36);
        let expected = [0.0f32, 0.0, 0.0, 5000.0, 0.0, 0.0, 5000.0, 5000.0, 0.0];
        for (chunk, want) in points.chunks(4).zip(expected) {
            let got = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            assert_eq!(got, want);
            assert_eq!(got.fract(), 0.0);
        }
    }

    #[test]
    fn test_raw_binary_multi_round_trip() {
        let w = wrapper(WireProfile::RawBinaryMulti);
        let stroke = triangle();
        let env = w.decode(&w.encode(&stroke).unwrap()).unwrap();

        assert_eq!(env.peer_id.as_deref(), Some(DEFAULT_PEER_ID));
        assert_eq!(env.event, DEFAULT_OSC_ADDRESS);
        assert_eq!(env.strokes.len(), 1);
        assert_same_geometry(&env.strokes[0], &stroke, 1e-3);
    }

    #[test]
    fn test_raw_binary_multi_accepts_bundle() {
        let w = wrapper(WireProfile::RawBinaryMulti);
        let Payload::Binary(bytes) = w.encode(&triangle()).unwrap() else {
            panic!("expected binary payload");
        };
        let msg = osc::decode_packet(&bytes).unwrap();
        let bundled = Payload::Binary(osc::encode_bundle(&[msg]));

        let env = w.decode(&bundled).unwrap();
        assert_same_geometry(&env.strokes[0], &triangle(), 1e-3);
    }

    #[test]
    fn test_raw_binary_multi_rejects_wrong_fields() {
        let w = wrapper(WireProfile::RawBinaryMulti);
        let msg = OscMessage::new("/latk/stroke")
            .with_arg(OscArg::Str("peer".into()))
            .with_arg(OscArg::Int(1));
        assert!(matches!(
            w.decode(&Payload::Binary(msg.encode())),
            Err(CodecError::MalformedPayload(_))
        ));

        let msg = OscMessage::new("/latk/stroke")
            .with_arg(OscArg::Str("peer".into()))
            .with_arg(OscArg::Int(1))
            .with_arg(OscArg::Blob(vec![0; 12]))
            .with_arg(OscArg::Blob(vec![0; 13]));
        assert!(matches!(
            w.decode(&Payload::Binary(msg.encode())),
            Err(CodecError::MalformedGeometry { len: 13, .. })
        ));

        assert!(w.decode(&Payload::Text("{}".into())).is_err());
    }

    #[test]
    fn test_json_base64_round_trip() {
        let w = wrapper(WireProfile::JsonBase64);
        let stroke = Stroke::new(
            7,
            Color3::new(0.2, 0.4, 0.6),
            (0..1000)
                .map(|i| Vec3::new(i as f32 * 0.01, (i % 7) as f32, -(i as f32) * 0.5))
                .collect(),
        )
        .with_timestamp(1_700_000_000_000);

        let payload = w.encode(&stroke).unwrap();
        assert!(matches!(payload, Payload::Text(_)));

        let env = w.decode(&payload).unwrap();
        let back = &env.strokes[0];
        assert_eq!(back.timestamp(), 1_700_000_000_000);
        assert_eq!(back.source_event(), OUTBOUND_STROKE_EVENT);
        assert_same_geometry(back, &stroke, 1e-3);
    }

    #[test]
    fn test_json_base64_from_legacy_peer() {
        let w = wrapper(WireProfile::JsonBase64);
        let colors = BASE64.encode(geometry::encode_color(Color3::new(0.0, 255.0, 0.0)));
        let points = BASE64.encode(geometry::encode_points(&[
            Vec3::new(500.0, 0.0, 0.0),
            Vec3::new(0.0, 500.0, 0.0),
            Vec3::new(0.0, 0.0, 500.0),
        ]));
        let text = format!(r#"{{"index":3,"colors":"{colors}","points":"{points}"}}"#);

        let env = w.decode(&Payload::Text(text)).unwrap();
        let stroke = &env.strokes[0];
        assert_eq!(stroke.index(), 3);
        assert_eq!(stroke.color(), Color3::new(0.0, 1.0, 0.0));
        assert_eq!(stroke.points(), &[Vec3::X, Vec3::Y, Vec3::Z]);
        assert_eq!(stroke.source_event(), DEFAULT_SOURCE_EVENT);
    }

    #[test]
    fn test_json_base64_rejects_bad_input() {
        let w = wrapper(WireProfile::JsonBase64);
        let bad = [
            "not json",
            r#"{"index":1}"#,
            r#"{"index":"one","colors":"","points":""}"#,
            r#"{"index":1,"colors":"!!!","points":""}"#,
            r#"{"index":1,"colors":"AAAAAAAAAAAAAAAA","points":"AAAA"}"#,
        ];
        for text in bad {
            assert!(w.decode(&Payload::Text(text.into())).is_err(), "{text}");
        }
        assert!(w.decode(&Payload::Binary(vec![0xff, 0xfe])).is_err());
    }

    #[test]
    fn test_event_wrapped_batch() {
        let w = wrapper(WireProfile::JsonEventWrapped);
        let text = r#"42["newFrameFromServer",[
            {"index":5,"points":[{"co":[0,0,0]},{"co":[1,0,0]},{"co":[1,1,0]}]},
            {"index":6,"color":[0,0,1],"points":[{"co":[2,2,2]}]}
        ]]"#;

        let env = w.decode(&Payload::Text(text.into())).unwrap();
        assert_eq!(env.event, INBOUND_FRAME_EVENT);
        assert_eq!(env.strokes.len(), 2);
        assert_eq!(env.strokes[0].index(), 5);
        assert_eq!(env.strokes[0].color(), Color3::WHITE);
        assert_eq!(env.strokes[0].points()[2], Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(env.strokes[1].color(), Color3::new(0.0, 0.0, 1.0));
        assert_eq!(env.strokes[1].source_event(), INBOUND_FRAME_EVENT);
    }

    #[test]
    fn test_event_wrapped_encoded_body() {
        let w = wrapper(WireProfile::JsonEventWrapped);
        let text = r#"["newFrameFromServer","[{\"index\":1,\"points\":[{\"co\":[1,2,3]}]}]"]"#;
        let env = w.decode(&Payload::Text(text.into())).unwrap();
        assert_eq!(env.strokes[0].points(), &[Vec3::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn test_event_wrapped_ignores_other_channels() {
        let w = wrapper(WireProfile::JsonEventWrapped);
        let text = r#"{"eventname":"chat","data":[{"index":1,"points":[]}]}"#;
        let env = w.decode(&Payload::Text(text.into())).unwrap();
        assert_eq!(env.event, "chat");
        assert!(env.strokes.is_empty());
    }

    #[test]
    fn test_event_wrapped_control_frames_are_not_malformed() {
        let w = wrapper(WireProfile::JsonEventWrapped);
        for frame in ["2", "3", "40", r#"0{"sid":"abc","upgrades":[]}"#] {
            let env = w.decode(&Payload::Text(frame.into())).unwrap();
            assert!(env.strokes.is_empty(), "{frame}");
            assert!(env.event.starts_with("control:"));
        }
    }

    #[test]
    fn test_event_wrapped_round_trip() {
        let stroke = triangle().with_timestamp(99);
        let payload = wrapper(WireProfile::JsonEventWrapped).encode(&stroke).unwrap();

        let Payload::Text(text) = &payload else {
            panic!("expected text payload");
        };
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["eventname"], OUTBOUND_STROKE_EVENT);
        assert_eq!(value["timestamp"], 99);
        assert_eq!(value["index"], 42);
        assert_eq!(value["points"][1]["co"][0], 10.0);

        let env = receiver(WireProfile::JsonEventWrapped).decode(&payload).unwrap();
        assert_eq!(env.strokes[0].timestamp(), 99);
        assert_same_geometry(&env.strokes[0], &stroke, 1e-6);
    }

    #[test]
    fn test_event_wrapped_malformed_batch_yields_nothing() {
        let w = wrapper(WireProfile::JsonEventWrapped);
        let text = r#"["newFrameFromServer",[{"index":1,"points":[{"co":[1,2]}]}]]"#;
        assert!(w.decode(&Payload::Text(text.into())).is_err());
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!("json-base64".parse::<WireProfile>(), Ok(WireProfile::JsonBase64));
        assert_eq!("osc".parse::<WireProfile>(), Ok(WireProfile::RawBinaryMulti));
        assert_eq!(
            WireProfile::JsonEventWrapped.to_string().parse::<WireProfile>(),
            Ok(WireProfile::JsonEventWrapped)
        );
        assert!("carrier-pigeon".parse::<WireProfile>().is_err());
    }
}
