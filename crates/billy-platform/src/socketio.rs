//! Socket.IO v4 text protocol over Engine.IO v4.
//!
//! Only the subset a websocket-only client needs:
//!
//! ```text
//! 0{"sid":..,"pingInterval":..}   engine open
//! 2 / 3                           ping / pong
//! 40 | 40/ns,                     namespace connect
//! 40{"sid":..}                    connect acknowledged
//! 44{"message":..}                connect refused
//! 42["event",payload]             event (optional /ns, and ack id)
//! 41                              namespace disconnect
//! ```
//!
//! Binary events (types 5 and 6) are rejected.

use serde::Deserialize;
use serde_json::Value;

use billy_types::{BillyError, Result};

pub const PING: &str = "2";
pub const PONG: &str = "3";
pub const CONNECT: &str = "40";
pub const DISCONNECT: &str = "41";

const DEFAULT_NAMESPACE: &str = "/";

/// Handshake data from the engine open packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
    #[serde(default)]
    pub upgrades: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenPayload),
    Close,
    Ping(String),
    Pong(String),
    /// A Socket.IO packet, still encoded
    Message(String),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String, sid: Option<String> },
    Disconnect { namespace: String },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack { namespace: String, ack_id: u64, args: Vec<Value> },
    ConnectError { namespace: String, message: String },
}

fn protocol(msg: impl Into<String>) -> BillyError {
    BillyError::Protocol(msg.into())
}

pub fn decode_engine(frame: &str) -> Result<EnginePacket> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or_else(|| protocol("empty frame"))?;
    let body = chars.as_str();
    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(body.to_string())),
        '3' => Ok(EnginePacket::Pong(body.to_string())),
        '4' => Ok(EnginePacket::Message(body.to_string())),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(protocol(format!("unknown engine packet type {:?}", other))),
    }
}

pub fn decode_socket(packet: &str) -> Result<SocketPacket> {
    let mut chars = packet.chars();
    let kind = chars.next().ok_or_else(|| protocol("empty socket packet"))?;
    let mut rest = chars.as_str();

    if matches!(kind, '5' | '6') {
        return Err(protocol("binary packets are not supported"));
    }

    let namespace = match rest.strip_prefix('/') {
        Some(_) => {
            // "/ns,<rest>"; a bare namespace has no trailing comma
            let (ns, tail) = rest.split_once(',').unwrap_or((rest, ""));
            rest = tail;
            ns.to_string()
        }
        None => DEFAULT_NAMESPACE.to_string(),
    };

    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    let ack_id = if digits > 0 {
        let id = rest[..digits]
            .parse()
            .map_err(|_| protocol("ack id out of range"))?;
        rest = &rest[digits..];
        Some(id)
    } else {
        None
    };

    match kind {
        '0' => {
            #[derive(Deserialize)]
            struct ConnectData {
                sid: Option<String>,
            }
            let sid = if rest.is_empty() {
                None
            } else {
                serde_json::from_str::<ConnectData>(rest)?.sid
            };
            Ok(SocketPacket::Connect { namespace, sid })
        }
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut args: Vec<Value> = serde_json::from_str(rest)?;
            if args.is_empty() {
                return Err(protocol("event without a name"));
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                other => return Err(protocol(format!("event name is not a string: {}", other))),
            };
            Ok(SocketPacket::Event { namespace, ack_id, name, args })
        }
        '3' => {
            let ack_id = ack_id.ok_or_else(|| protocol("ack without id"))?;
            let args = serde_json::from_str(rest)?;
            Ok(SocketPacket::Ack { namespace, ack_id, args })
        }
        '4' => {
            let message = match serde_json::from_str::<Value>(rest) {
                Ok(Value::String(s)) => s,
                Ok(v) => v
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("connection refused")
                    .to_string(),
                Err(_) => rest.to_string(),
            };
            Ok(SocketPacket::ConnectError { namespace, message })
        }
        other => Err(protocol(format!("unknown socket packet type {:?}", other))),
    }
}

/// Engine message frame carrying a Socket.IO event on the default
/// namespace.
pub fn encode_event<T: serde::Serialize>(name: &str, payload: &T) -> Result<String> {
    let body = serde_json::to_string(&(name, payload))?;
    Ok(format!("42{}", body))
}

/// WebSocket endpoint for an HTTP(S) API base URL.
pub fn socket_url(api_url: &str) -> Result<String> {
    let base = api_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(BillyError::Config(format!("unsupported API URL: {}", api_url)));
    };
    Ok(format!("{}/socket.io/?EIO=4&transport=websocket", ws))
}
