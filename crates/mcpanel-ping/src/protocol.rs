//! Server List Ping wire format
//!
//! Packets are `[length varint][packet id varint][payload]`. A status
//! exchange is one handshake (next state = 1), one empty status request,
//! and one response carrying a JSON document.

use mcpanel_core::{Error, Result};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Protocol version sent in the handshake; -1 asks for no particular version
pub const PROTOCOL_VERSION: i32 = -1;

/// Upper bound on the response body
pub const MAX_RESPONSE_LEN: usize = 1024 * 1024;

pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
}

pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32> {
    let mut value: u32 = 0;
    for position in 0..5 {
        let byte = reader.read_u8().await?;
        value |= ((byte & 0x7F) as u32) << (7 * position);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(Error::ping("VarInt is too big"))
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

fn frame(packet_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 1);
    write_varint(&mut body, packet_id);
    body.extend_from_slice(payload);

    let mut packet = Vec::with_capacity(body.len() + 5);
    write_varint(&mut packet, body.len() as i32);
    packet.extend_from_slice(&body);
    packet
}

/// Handshake followed by the status request, ready to write
pub fn status_request(host: &str, port: u16) -> Vec<u8> {
    let mut handshake = Vec::new();
    write_varint(&mut handshake, PROTOCOL_VERSION);
    write_string(&mut handshake, host);
    handshake.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut handshake, 1);

    let mut bytes = frame(0x00, &handshake);
    bytes.extend_from_slice(&frame(0x00, &[]));
    bytes
}

/// Read one status response packet and return its JSON body
pub async fn read_status_response<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let _length = read_varint(reader).await?;
    let packet_id = read_varint(reader).await?;
    if packet_id != 0x00 {
        return Err(Error::ping(format!("Unexpected packet id {:#x}", packet_id)));
    }

    let json_len = read_varint(reader).await?;
    if json_len < 0 || json_len as usize > MAX_RESPONSE_LEN {
        return Err(Error::ping(format!("Bad response length {}", json_len)));
    }

    let mut body = vec![0u8; json_len as usize];
    reader.read_exact(&mut body).await?;
    String::from_utf8(body).map_err(|e| Error::ping(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    #[serde(default)]
    version: Option<RawVersion>,
    #[serde(default)]
    players: Option<RawPlayers>,
    #[serde(default)]
    description: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawVersion {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawPlayers {
    #[serde(default)]
    online: u32,
    #[serde(default)]
    max: u32,
    #[serde(default)]
    sample: Vec<RawPlayer>,
}

#[derive(Debug, Deserialize)]
struct RawPlayer {
    name: String,
}

/// Live status reported by a server
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PingStatus {
    pub description: String,
    pub version: String,
    pub online: u32,
    pub max: u32,
    pub players: Vec<String>,
}

/// Decode the JSON body of a status response
pub fn parse_status(json: &str) -> Result<PingStatus> {
    let raw: RawStatus = serde_json::from_str(json)?;
    let players = raw.players.unwrap_or(RawPlayers {
        online: 0,
        max: 0,
        sample: Vec::new(),
    });

    Ok(PingStatus {
        description: flatten_text(&raw.description),
        version: raw.version.map(|v| v.name).unwrap_or_default(),
        online: players.online,
        max: players.max,
        players: players.sample.into_iter().map(|p| p.name).collect(),
    })
}

// Descriptions are either a plain string or a chat component tree
fn flatten_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => {
            let mut text = map
                .get("text")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string();
            if let Some(serde_json::Value::Array(extra)) = map.get("extra") {
                for part in extra {
                    text.push_str(&flatten_text(part));
                }
            }
            text
        }
        serde_json::Value::Array(parts) => parts.iter().map(flatten_text).collect(),
        _ => String::new(),
    }
}
