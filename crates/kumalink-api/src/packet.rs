//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Every WebSocket text frame carries one Engine.IO packet. Packet type
//! `4` (message) wraps a Socket.IO packet, which in turn carries an
//! optional namespace, an optional ack id and a JSON payload:
//!
//! ```text
//! 0{"sid":"abc","pingInterval":25000,"pingTimeout":20000}   open
//! 2 / 3                                                      ping / pong
//! 40                                                         connect "/"
//! 42["heartbeat",{...}]                                      event
//! 4217["login",{...}]                                        event expecting ack 17
//! 4317[{"ok":true}]                                          ack 17
//! ```
//!
//! Binary attachments (Socket.IO types 5 and 6) are never used by the
//! monitoring server and are rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

// ── Engine.IO ────────────────────────────────────────────────────────

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for our pong.
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long we may go without hearing a ping before the link is dead.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// One Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping(Option<String>),
    Pong(Option<String>),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

impl Packet {
    /// Decode a single text frame.
    pub fn decode(frame: &str) -> Result<Self, Error> {
        let mut chars = frame.chars();
        let Some(kind) = chars.next() else {
            return Err(Error::Protocol("empty frame".into()));
        };
        let rest = chars.as_str();

        match kind {
            '0' => serde_json::from_str(rest)
                .map(Self::Open)
                .map_err(|e| Error::deserialization("open", &e)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(non_empty(rest))),
            '3' => Ok(Self::Pong(non_empty(rest))),
            '4' => SocketPacket::decode(rest).map(Self::Message),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(Error::Protocol(format!(
                "unknown engine.io packet type '{other}'"
            ))),
        }
    }

    /// Encode into a text frame.
    pub fn encode(&self) -> String {
        match self {
            Self::Open(handshake) => format!(
                "0{}",
                serde_json::to_string(handshake).unwrap_or_default()
            ),
            Self::Close => "1".into(),
            Self::Ping(data) => format!("2{}", data.as_deref().unwrap_or("")),
            Self::Pong(data) => format!("3{}", data.as_deref().unwrap_or("")),
            Self::Message(packet) => format!("4{}", packet.encode()),
            Self::Upgrade => "5".into(),
            Self::Noop => "6".into(),
        }
    }

    /// Shorthand for an event message, with an ack id when a reply is wanted.
    pub fn event(id: Option<u64>, name: &str, args: Vec<Value>) -> Self {
        Self::Message(SocketPacket::Event {
            id,
            name: name.to_owned(),
            args,
        })
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_owned())
}

// ── Socket.IO ────────────────────────────────────────────────────────

/// A Socket.IO packet on the default namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event {
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        id: u64,
        args: Vec<Value>,
    },
    ConnectError(Value),
}

impl SocketPacket {
    fn decode(body: &str) -> Result<Self, Error> {
        let mut chars = body.chars();
        let Some(kind) = chars.next() else {
            return Err(Error::Protocol("empty socket.io packet".into()));
        };
        let mut rest = chars.as_str();

        if rest.starts_with('/') {
            let (nsp, tail) = rest.split_once(',').unwrap_or((rest, ""));
            if nsp != "/" {
                tracing::trace!(nsp, "packet addressed to a non-default namespace");
            }
            rest = tail;
        }

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (id_str, payload) = rest.split_at(digits);
        let id = if id_str.is_empty() {
            None
        } else {
            Some(
                id_str
                    .parse::<u64>()
                    .map_err(|e| Error::Protocol(format!("invalid ack id '{id_str}': {e}")))?,
            )
        };

        match kind {
            '0' => Ok(Self::Connect(parse_optional(payload)?)),
            '1' => Ok(Self::Disconnect),
            '2' => {
                let mut args = parse_array(payload)?.into_iter();
                let Some(Value::String(name)) = args.next() else {
                    return Err(Error::Protocol("event packet without a name".into()));
                };
                Ok(Self::Event {
                    id,
                    name,
                    args: args.collect(),
                })
            }
            '3' => {
                let id = id.ok_or_else(|| Error::Protocol("ack packet without an id".into()))?;
                Ok(Self::Ack {
                    id,
                    args: parse_array(payload)?,
                })
            }
            '4' => Ok(Self::ConnectError(
                parse_optional(payload)?.unwrap_or(Value::Null),
            )),
            '5' | '6' => Err(Error::Protocol(
                "binary socket.io packets are not supported".into(),
            )),
            other => Err(Error::Protocol(format!(
                "unknown socket.io packet type '{other}'"
            ))),
        }
    }

    fn encode(&self) -> String {
        match self {
            Self::Connect(None) => "0".into(),
            Self::Connect(Some(auth)) => format!("0{auth}"),
            Self::Disconnect => "1".into(),
            Self::Event { id, name, args } => {
                let mut payload = Vec::with_capacity(args.len() + 1);
                payload.push(Value::String(name.clone()));
                payload.extend(args.iter().cloned());
                let id = id.map(|i| i.to_string()).unwrap_or_default();
                format!("2{id}{}", Value::Array(payload))
            }
            Self::Ack { id, args } => format!("3{id}{}", Value::Array(args.clone())),
            Self::ConnectError(data) => format!("4{data}"),
        }
    }
}

fn parse_optional(payload: &str) -> Result<Option<Value>, Error> {
    if payload.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(payload)
        .map(Some)
        .map_err(|e| Error::Protocol(format!("invalid packet payload: {e}")))
}

fn parse_array(payload: &str) -> Result<Vec<Value>, Error> {
    match parse_optional(payload)? {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(Error::Protocol(format!(
            "expected a JSON array payload, got {other}"
        ))),
        None => Ok(Vec::new()),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decode_open_handshake() {
        let frame = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        let Packet::Open(hs) = Packet::decode(frame).unwrap() else {
            panic!("expected open packet");
        };
        assert_eq!(hs.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(hs.liveness_window(), Duration::from_secs(45));
        assert_eq!(hs.max_payload, Some(1_000_000));
    }

    #[test]
    fn decode_ping_and_probe() {
        assert_eq!(Packet::decode("2").unwrap(), Packet::Ping(None));
        assert_eq!(
            Packet::decode("3probe").unwrap(),
            Packet::Pong(Some("probe".into()))
        );
        assert_eq!(Packet::Pong(None).encode(), "3");
    }

    #[test]
    fn decode_namespace_connect() {
        let packet = Packet::decode(r#"40{"sid":"wZX3oN0bSVIhsaknAAAI"}"#).unwrap();
        assert_eq!(
            packet,
            Packet::Message(SocketPacket::Connect(Some(json!({"sid": "wZX3oN0bSVIhsaknAAAI"}))))
        );
        assert_eq!(
            Packet::decode("40").unwrap(),
            Packet::Message(SocketPacket::Connect(None))
        );
    }

    #[test]
    fn decode_event_with_multiple_args() {
        let packet = Packet::decode(r#"42["uptime",3,24,0.9987]"#).unwrap();
        assert_eq!(
            packet,
            Packet::Message(SocketPacket::Event {
                id: None,
                name: "uptime".into(),
                args: vec![json!(3), json!(24), json!(0.9987)],
            })
        );
    }

    #[test]
    fn decode_ack_with_id() {
        let packet = Packet::decode(r#"4317[{"ok":true,"token":"abc"}]"#).unwrap();
        assert_eq!(
            packet,
            Packet::Message(SocketPacket::Ack {
                id: 17,
                args: vec![json!({"ok": true, "token": "abc"})],
            })
        );
    }

    #[test]
    fn decode_skips_explicit_default_namespace() {
        let packet = Packet::decode(r#"42/,5["heartbeat",{}]"#).unwrap();
        let Packet::Message(SocketPacket::Event { id, name, .. }) = packet else {
            panic!("expected event");
        };
        assert_eq!(id, Some(5));
        assert_eq!(name, "heartbeat");
    }

    #[test]
    fn encode_event_with_ack_id() {
        let packet = Packet::event(Some(4), "loginByToken", vec![json!("tok")]);
        assert_eq!(packet.encode(), r#"424["loginByToken","tok"]"#);
    }

    #[test]
    fn encode_event_without_ack_id() {
        let packet = Packet::event(None, "logout", vec![]);
        assert_eq!(packet.encode(), r#"42["logout"]"#);
    }

    #[test]
    fn connect_error_carries_message() {
        let packet = Packet::decode(r#"44{"message":"Not authorized"}"#).unwrap();
        assert_eq!(
            packet,
            Packet::Message(SocketPacket::ConnectError(json!({"message": "Not authorized"})))
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(Packet::decode("").is_err());
        assert!(Packet::decode("9").is_err());
        assert!(Packet::decode("42{\"not\":\"array\"}").is_err());
        assert!(Packet::decode("42[1,2]").is_err());
        assert!(Packet::decode("43[]").is_err());
        assert!(Packet::decode("451-[\"bin\",{}]").is_err());
    }
}
