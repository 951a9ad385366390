//! Server List Ping.
//!
//! The status exchange every Java Edition client performs before showing a
//! server in its multiplayer list:
//!
//! ```text
//! C -> S  Handshake      [len][0x00][protocol][host][port][next_state = 1]
//! C -> S  Status Request [len][0x00]
//! S -> C  Status JSON    [len][0x00][string]
//! C -> S  Ping           [len][0x01][i64 payload]
//! S -> C  Pong           [len][0x01][i64 payload]
//! ```
//!
//! Lengths, packet ids and string prefixes are VarInts. Strings are UTF-8.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::StatusError;
use crate::motd;

/// Port used when a server address has none.
pub const DEFAULT_PORT: u16 = 25565;

/// Protocol number sent in the handshake. Servers answer status requests
/// for any version, and -1 is the conventional "just asking" value.
const STATUS_PROTOCOL_VERSION: i32 = -1;

/// Upper bound on an accepted packet, well above any real status payload.
const MAX_PACKET_LEN: usize = 2 * 1024 * 1024;

const PACKET_STATUS: i32 = 0x00;
const PACKET_PING: i32 = 0x01;

/// Player counts reported by a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    pub online: Option<u32>,
    pub max: Option<u32>,
}

/// Parsed status of a reachable server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerStatus {
    pub players: Option<Players>,
    pub version: Option<String>,
    pub motd: Option<String>,
    pub latency_ms: Option<u64>,
}

#[derive(Deserialize)]
struct RawStatus {
    version: Option<RawVersion>,
    players: Option<RawPlayers>,
    description: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawVersion {
    name: Option<String>,
}

#[derive(Deserialize)]
struct RawPlayers {
    online: Option<u32>,
    max: Option<u32>,
}

/// Appends `value` as a VarInt.
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

/// Reads one VarInt.
pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, StatusError> {
    let mut result: u32 = 0;
    for position in 0..5 {
        let byte = reader.read_u8().await?;
        result |= u32::from(byte & 0x7F) << (7 * position);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    Err(StatusError::Protocol("VarInt longer than 5 bytes".to_string()))
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

/// Wraps a packet body (id + fields) with its length prefix.
pub fn frame(body: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(body.len() + 5);
    write_varint(&mut packet, body.len() as i32);
    packet.extend_from_slice(body);
    packet
}

/// Handshake switching the connection into the status state.
pub fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(host.len() + 10);
    write_varint(&mut body, PACKET_STATUS);
    write_varint(&mut body, STATUS_PROTOCOL_VERSION);
    write_string(&mut body, host);
    body.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut body, 1);
    frame(&body)
}

pub fn status_request_packet() -> Vec<u8> {
    frame(&[PACKET_STATUS as u8])
}

pub fn ping_packet(payload: i64) -> Vec<u8> {
    let mut body = vec![PACKET_PING as u8];
    body.extend_from_slice(&payload.to_be_bytes());
    frame(&body)
}

/// Status response packet carrying `json`. Used by test servers.
pub fn status_response_packet(json: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(json.len() + 6);
    write_varint(&mut body, PACKET_STATUS);
    write_string(&mut body, json);
    frame(&body)
}

/// Reads one framed packet and returns its id and remaining payload.
pub async fn read_packet<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<(i32, Vec<u8>), StatusError> {
    let length = read_varint(reader).await?;
    if length <= 0 || length as usize > MAX_PACKET_LEN {
        return Err(StatusError::Protocol(format!("invalid packet length {length}")));
    }

    let mut body = vec![0u8; length as usize];
    reader.read_exact(&mut body).await?;

    let mut cursor = body.as_slice();
    let id = read_varint(&mut cursor).await?;
    let consumed = body.len() - cursor.len();
    body.drain(..consumed);
    Ok((id, body))
}

async fn read_string(payload: &[u8]) -> Result<String, StatusError> {
    let mut cursor = payload;
    let length = read_varint(&mut cursor).await?;
    if length < 0 || length as usize > cursor.len() {
        return Err(StatusError::Protocol("string length exceeds packet".to_string()));
    }
    String::from_utf8(cursor[..length as usize].to_vec())
        .map_err(|e| StatusError::Protocol(format!("status is not UTF-8: {e}")))
}

/// Splits `host[:port]`, defaulting the port to 25565.
pub fn parse_address(address: &str) -> (String, u16) {
    let address = address.trim();
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            (host.to_string(), port.trim().parse().unwrap_or(DEFAULT_PORT))
        }
        _ => (address.to_string(), DEFAULT_PORT),
    }
}

/// Performs a full status exchange with `host:port`.
///
/// The whole exchange, connect included, is bounded by `timeout`. Latency is
/// measured over the ping/pong round trip; servers that hang up after the
/// status response still report their status, just without latency.
pub async fn ping(host: &str, port: u16, timeout: Duration) -> Result<ServerStatus, StatusError> {
    tokio::time::timeout(timeout, exchange(host, port))
        .await
        .map_err(|_| StatusError::Timeout(timeout))?
}

async fn exchange(host: &str, port: u16) -> Result<ServerStatus, StatusError> {
    let mut stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;

    let mut request = handshake_packet(host, port);
    request.extend_from_slice(&status_request_packet());
    stream.write_all(&request).await?;

    let (id, payload) = read_packet(&mut stream).await?;
    if id != PACKET_STATUS {
        return Err(StatusError::Protocol(format!("expected status packet, got 0x{id:02x}")));
    }
    let json = read_string(&payload).await?;
    let raw: RawStatus = serde_json::from_str(&json)?;

    let latency_ms = match measure_latency(&mut stream).await {
        Ok(latency) => Some(latency),
        Err(e) => {
            debug!("Ping to {}:{} answered status but not pong: {}", host, port, e);
            None
        }
    };

    let motd = raw
        .description
        .as_ref()
        .map(motd::flatten)
        .filter(|text| !text.is_empty());

    Ok(ServerStatus {
        players: raw.players.map(|p| Players {
            online: p.online,
            max: p.max,
        }),
        version: raw.version.and_then(|v| v.name),
        motd,
        latency_ms,
    })
}

async fn measure_latency(stream: &mut TcpStream) -> Result<u64, StatusError> {
    let payload = chrono::Utc::now().timestamp_millis();
    let started = Instant::now();
    stream.write_all(&ping_packet(payload)).await?;

    let (id, body) = read_packet(stream).await?;
    if id != PACKET_PING || body.len() != 8 {
        return Err(StatusError::Protocol("malformed pong".to_string()));
    }
    Ok(started.elapsed().as_millis() as u64)
}

/// True when a TCP connection to `host:port` opens within `timeout`.
pub async fn tcp_reachable(host: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}
