//! Engine.IO v4 and Socket.IO v4 text packet codec.
//!
//! Every websocket text frame is one Engine.IO packet: a single type digit
//! followed by its data. Socket.IO packets ride inside Engine.IO `message`
//! packets as `<type>[<namespace>,][<ack id>][<json>]`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{NetError, Result};

pub const DEFAULT_NAMESPACE: &str = "/";

// ---------------------------------------------------------------------------
// Engine.IO
// ---------------------------------------------------------------------------

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for our pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the connection may stay silent before it is considered dead.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self> {
        let kind = text
            .chars()
            .next()
            .ok_or_else(|| NetError::Codec("empty engine packet".into()))?;
        let data = &text[kind.len_utf8()..];
        let packet = match kind {
            '0' => Self::Open(
                serde_json::from_str(data)
                    .map_err(|e| NetError::Handshake(format!("bad open packet: {e}")))?,
            ),
            '1' => Self::Close,
            '2' => Self::Ping(data.to_string()),
            '3' => Self::Pong(data.to_string()),
            '4' => Self::Message(data.to_string()),
            '5' => Self::Upgrade,
            '6' => Self::Noop,
            other => {
                return Err(NetError::Codec(format!(
                    "unknown engine packet type {other:?}"
                )))
            }
        };
        Ok(packet)
    }

    /// Encode a client-side packet. `Open` is server-only and encodes as its
    /// bare type digit.
    pub fn encode(&self) -> String {
        match self {
            Self::Open(_) => "0".to_string(),
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(data) => format!("4{data}"),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Socket.IO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { sid: Option<String> },
    Disconnect,
    Event {
        name: String,
        args: Vec<Value>,
        ack_id: Option<u64>,
    },
    Ack { id: u64, args: Vec<Value> },
    ConnectError { message: String },
}

/// A decoded Socket.IO packet and the namespace it was addressed to.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketFrame {
    pub namespace: String,
    pub packet: SocketPacket,
}

impl SocketPacket {
    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Event {
            name: name.into(),
            args,
            ack_id: None,
        }
    }

    /// Encode for the default namespace.
    pub fn encode(&self) -> String {
        match self {
            Self::Connect { .. } => "0".to_string(),
            Self::Disconnect => "1".to_string(),
            Self::Event { name, args, ack_id } => {
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                let id = ack_id.map(|id| id.to_string()).unwrap_or_default();
                format!("2{id}{}", Value::Array(array))
            }
            Self::Ack { id, args } => format!("3{id}{}", Value::Array(args.clone())),
            Self::ConnectError { message } => {
                format!("4{}", serde_json::json!({ "message": message }))
            }
        }
    }

    pub fn decode(payload: &str) -> Result<SocketFrame> {
        let kind = payload
            .chars()
            .next()
            .ok_or_else(|| NetError::Codec("empty socket packet".into()))?;
        let mut rest = &payload[kind.len_utf8()..];

        if matches!(kind, '5' | '6') {
            return Err(NetError::Codec("binary packets are not supported".into()));
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let namespace = &rest[..end];
            rest = rest.get(end + 1..).unwrap_or("");
            namespace
        } else {
            DEFAULT_NAMESPACE
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse::<u64>()
                    .map_err(|e| NetError::Codec(format!("bad ack id: {e}")))?,
            )
        } else {
            None
        };
        rest = &rest[digits..];

        let packet = match kind {
            '0' => {
                let sid = if rest.is_empty() {
                    None
                } else {
                    parse_json(rest)?
                        .get("sid")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                };
                Self::Connect { sid }
            }
            '1' => Self::Disconnect,
            '2' => {
                let mut items = match parse_json(rest)? {
                    Value::Array(items) => items.into_iter(),
                    other => {
                        return Err(NetError::Codec(format!(
                            "event payload is not an array: {other}"
                        )))
                    }
                };
                let name = match items.next() {
                    Some(Value::String(name)) => name,
                    _ => return Err(NetError::Codec("event without a name".into())),
                };
                Self::Event {
                    name,
                    args: items.collect(),
                    ack_id,
                }
            }
            '3' => {
                let id = ack_id.ok_or_else(|| NetError::Codec("ack without an id".into()))?;
                let args = match parse_json(rest)? {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                Self::Ack { id, args }
            }
            '4' => {
                let message = match parse_json(rest)? {
                    Value::String(message) => message,
                    value => value
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| value.to_string()),
                };
                Self::ConnectError { message }
            }
            other => {
                return Err(NetError::Codec(format!(
                    "unknown socket packet type {other:?}"
                )))
            }
        };

        Ok(SocketFrame {
            namespace: namespace.to_string(),
            packet,
        })
    }
}

fn parse_json(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| NetError::Codec(format!("bad json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open_handshake() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        match packet {
            EnginePacket::Open(handshake) => {
                assert_eq!(handshake.sid, "abc");
                assert_eq!(handshake.liveness_window(), Duration::from_secs(45));
            }
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[test]
    fn test_ping_is_answered_with_matching_pong() {
        let EnginePacket::Ping(data) = EnginePacket::decode("2heartbeat").unwrap() else {
            panic!("expected ping");
        };
        assert_eq!(EnginePacket::Pong(data).encode(), "3heartbeat");
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
    }

    #[test]
    fn test_unknown_engine_type() {
        assert!(matches!(
            EnginePacket::decode("9"),
            Err(NetError::Codec(_))
        ));
        assert!(matches!(EnginePacket::decode(""), Err(NetError::Codec(_))));
    }

    #[test]
    fn test_event_frame_on_the_wire() {
        let packet = SocketPacket::event("delete_group", vec![json!("c1")]);
        let frame = EnginePacket::Message(packet.encode()).encode();
        assert_eq!(frame, r#"42["delete_group","c1"]"#);
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack() {
        let frame = SocketPacket::decode(r#"2/admin,13["user_blocked","u1","c2"]"#).unwrap();
        assert_eq!(frame.namespace, "/admin");
        assert_eq!(
            frame.packet,
            SocketPacket::Event {
                name: "user_blocked".into(),
                args: vec![json!("u1"), json!("c2")],
                ack_id: Some(13),
            }
        );
    }

    #[test]
    fn test_decode_connect_and_errors() {
        let frame = SocketPacket::decode(r#"0{"sid":"s-1"}"#).unwrap();
        assert_eq!(frame.namespace, DEFAULT_NAMESPACE);
        assert_eq!(
            frame.packet,
            SocketPacket::Connect {
                sid: Some("s-1".into())
            }
        );

        let frame = SocketPacket::decode(r#"4{"message":"Not authorized"}"#).unwrap();
        assert_eq!(
            frame.packet,
            SocketPacket::ConnectError {
                message: "Not authorized".into()
            }
        );

        assert!(SocketPacket::decode(r#"2{"not":"an array"}"#).is_err());
        assert!(SocketPacket::decode(r#"2[42]"#).is_err());
        assert!(SocketPacket::decode(r#"51-["bin",{"_placeholder":true,"num":0}]"#).is_err());
    }
}
