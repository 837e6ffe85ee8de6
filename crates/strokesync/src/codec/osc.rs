//! OSC 1.0 framing (panic-free).
//!
//! Only the argument types the stroke datagram uses are supported:
//! `i` (int32), `f` (float32), `s` (string) and `b` (blob). All integers and
//! sizes are big-endian; strings and blobs are zero-padded to 4 bytes.
//! Parsing never indexes past `remaining()`.

use bytes::{Buf, BufMut};

use super::CodecError;

const BUNDLE_TAG: &[u8] = b"#bundle\0";
const IMMEDIATE_TIMETAG: u64 = 1;
const MAX_BUNDLE_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
    Blob(Vec<u8>),
}

impl OscArg {
    fn type_tag(&self) -> u8 {
        match self {
            OscArg::Int(_) => b'i',
            OscArg::Float(_) => b'f',
            OscArg::Str(_) => b's',
            OscArg::Blob(_) => b'b',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: OscArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_str(&mut out, &self.address);

        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        tags.extend(self.args.iter().map(|a| a.type_tag() as char));
        put_str(&mut out, &tags);

        for arg in &self.args {
            match arg {
                OscArg::Int(v) => out.put_i32(*v),
                OscArg::Float(v) => out.put_f32(*v),
                OscArg::Str(s) => put_str(&mut out, s),
                OscArg::Blob(b) => {
                    out.put_i32(b.len() as i32);
                    out.put_slice(b);
                    pad(&mut out);
                }
            }
        }
        out
    }
}

/// Wrap messages in a bundle with the "immediately" time tag.
pub fn encode_bundle(messages: &[OscMessage]) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_slice(BUNDLE_TAG);
    out.put_u64(IMMEDIATE_TIMETAG);
    for msg in messages {
        let element = msg.encode();
        out.put_i32(element.len() as i32);
        out.put_slice(&element);
    }
    out
}

/// Decode a packet. A bundle yields the first message it contains.
pub fn decode_packet(bytes: &[u8]) -> Result<OscMessage, CodecError> {
    decode_packet_at(bytes, 0)
}

fn decode_packet_at(bytes: &[u8], depth: usize) -> Result<OscMessage, CodecError> {
    if !bytes.starts_with(BUNDLE_TAG) {
        return decode_message(bytes);
    }
    if depth >= MAX_BUNDLE_DEPTH {
        return Err(CodecError::payload("OSC bundle nested too deeply"));
    }

    let mut buf = &bytes[BUNDLE_TAG.len()..];
    if buf.remaining() < 8 {
        return Err(CodecError::payload("OSC bundle missing time tag"));
    }
    buf.advance(8);

    if buf.remaining() < 4 {
        return Err(CodecError::payload("empty OSC bundle"));
    }
    let size = read_size(&mut buf)?;
    let rest = buf;
    let element = rest
        .get(..size)
        .ok_or_else(|| CodecError::payload("OSC bundle element truncated"))?;
    decode_packet_at(element, depth + 1)
}

pub fn decode_message(bytes: &[u8]) -> Result<OscMessage, CodecError> {
    let mut buf = bytes;

    let address = read_str(&mut buf)?;
    if !address.starts_with('/') {
        return Err(CodecError::payload(format!(
            "invalid OSC address {address:?}"
        )));
    }

    let tags = read_str(&mut buf)?;
    let Some(tags) = tags.strip_prefix(',') else {
        return Err(CodecError::payload("OSC type tag string missing ','"));
    };

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.bytes() {
        let arg = match tag {
            b'i' => {
                need(&buf, 4, "int32")?;
                OscArg::Int(buf.get_i32())
            }
            b'f' => {
                need(&buf, 4, "float32")?;
                OscArg::Float(buf.get_f32())
            }
            b's' => OscArg::Str(read_str(&mut buf)?),
            b'b' => OscArg::Blob(read_blob(&mut buf)?),
            other => {
                return Err(CodecError::payload(format!(
                    "unsupported OSC type tag '{}'",
                    other as char
                )));
            }
        };
        args.push(arg);
    }

    Ok(OscMessage { address, args })
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.put_slice(s.as_bytes());
    out.put_u8(0);
    pad(out);
}

fn pad(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.put_u8(0);
    }
}

fn padded_len(n: usize) -> usize {
    n.div_ceil(4) * 4
}

fn need(buf: &&[u8], n: usize, what: &str) -> Result<(), CodecError> {
    if buf.remaining() < n {
        return Err(CodecError::payload(format!("OSC {what} truncated")));
    }
    Ok(())
}

fn read_size(buf: &mut &[u8]) -> Result<usize, CodecError> {
    need(buf, 4, "size")?;
    let size = buf.get_i32();
    usize::try_from(size).map_err(|_| CodecError::payload(format!("negative OSC size {size}")))
}

fn read_str(buf: &mut &[u8]) -> Result<String, CodecError> {
    let rest = *buf;
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| CodecError::payload("unterminated OSC string"))?;
    let raw = rest.get(..nul).unwrap_or_default();
    let s = std::str::from_utf8(raw)
        .map_err(|_| CodecError::payload("OSC string is not UTF-8"))?
        .to_string();

    let padded = padded_len(nul + 1);
    need(buf, padded, "string padding")?;
    buf.advance(padded);
    Ok(s)
}

fn read_blob(buf: &mut &[u8]) -> Result<Vec<u8>, CodecError> {
    let len = read_size(buf)?;
    let padded = padded_len(len);
    need(buf, padded, "blob")?;
    let rest = *buf;
    let data = rest.get(..len).unwrap_or_default().to_vec();
    buf.advance(padded);
    Ok(data)
}
