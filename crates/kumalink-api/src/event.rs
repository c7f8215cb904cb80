//! Typed payloads exchanged with the monitoring server.
//!
//! Push events arrive as a Socket.IO event name plus positional JSON
//! arguments; [`PushEvent::from_event`] turns them into typed variants.
//! Records the client only partially understands ([`Monitor`],
//! [`Notification`]) keep every unknown field in `extra`, so nothing the
//! server sends is silently dropped.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ── Identifiers ──────────────────────────────────────────────────────

/// Server-assigned monitor id.
///
/// A JSON number in event arguments, a string key inside the monitor map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(pub u64);

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for MonitorId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for MonitorId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ── Monitor ──────────────────────────────────────────────────────────

/// A monitored target as defined by the server.
///
/// Only `name` is interpreted client-side; everything else passes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Monitor {
    /// Raw field lookup for anything outside the typed surface.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// The monitor type (`http`, `port`, `ping`, `keyword`, ...).
    pub fn kind(&self) -> Option<&str> {
        self.field("type").and_then(Value::as_str)
    }

    /// Whether the monitor is actively checked. Older servers send `0`/`1`.
    pub fn is_active(&self) -> bool {
        match self.field("active") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64() != Some(0),
            _ => true,
        }
    }
}

/// Monitor id → monitor, as pushed by `monitorList`.
pub type MonitorMap = BTreeMap<MonitorId, Monitor>;

// ── Heartbeat ────────────────────────────────────────────────────────

/// Classification of a raw heartbeat status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatStatus {
    Down,
    Up,
    Pending,
    Maintenance,
    Unknown(i64),
}

impl From<i64> for HeartbeatStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Down,
            1 => Self::Up,
            2 => Self::Pending,
            3 => Self::Maintenance,
            other => Self::Unknown(other),
        }
    }
}

/// One health-check result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(rename = "monitorID")]
    pub monitor_id: MonitorId,

    /// `0` down, `1` up, `2` pending, `3` maintenance.
    pub status: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub msg: String,

    /// Live events send a bool, history rows from the database send `0`/`1`.
    #[serde(default, deserialize_with = "bool_or_int")]
    pub important: bool,

    /// Server time, `YYYY-MM-DD HH:MM:SS[.fff]` in UTC.
    pub time: String,

    #[serde(default)]
    pub ping: Option<f64>,

    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Heartbeat {
    pub fn kind(&self) -> HeartbeatStatus {
        HeartbeatStatus::from(self.status)
    }

    pub fn is_up(&self) -> bool {
        self.status == 1
    }

    pub fn is_down(&self) -> bool {
        self.status == 0
    }

    /// Parsed `time`, or `None` when the server sent something unexpected.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_server_time(&self.time)
    }
}

/// Accepts both the database format and RFC 3339.
pub fn parse_server_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|t| t.naive_utc()))
}

// ── Notification ─────────────────────────────────────────────────────

/// A configured notification channel (email, webhook, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Replies ──────────────────────────────────────────────────────────

/// Acknowledgement payload for every request the client makes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,

    #[serde(default)]
    pub msg: Option<String>,

    /// Present on successful `login` replies.
    #[serde(default)]
    pub token: Option<String>,

    /// Present on successful `add` replies.
    #[serde(default, rename = "monitorID")]
    pub monitor_id: Option<MonitorId>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reply {
    /// Decode the first ack argument.
    pub fn from_ack(event: &str, mut args: Vec<Value>) -> Result<Self, Error> {
        if args.is_empty() {
            return Err(Error::Protocol(format!("empty reply to '{event}'")));
        }
        serde_json::from_value(args.swap_remove(0)).map_err(|e| Error::deserialization(event, &e))
    }

    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or("")
    }
}

// ── Push events ──────────────────────────────────────────────────────

/// Every server push the client understands.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    MonitorList(MonitorMap),
    NotificationList(Vec<Notification>),
    Heartbeat(Heartbeat),
    HeartbeatList {
        monitor_id: MonitorId,
        heartbeats: Vec<Heartbeat>,
    },
    ImportantHeartbeatList {
        monitor_id: MonitorId,
        heartbeats: Vec<Heartbeat>,
    },
    AvgPing {
        monitor_id: MonitorId,
        value: Option<f64>,
    },
    Uptime {
        monitor_id: MonitorId,
        period: String,
        value: f64,
    },
    /// Anything else; kept so callers can log or inspect it.
    Other { name: String, args: Vec<Value> },
}

impl PushEvent {
    /// Build a typed event from a Socket.IO event name and its arguments.
    pub fn from_event(name: &str, args: Vec<Value>) -> Result<Self, Error> {
        let mut args = Args {
            event: name,
            inner: args.into_iter(),
        };

        let event = match name {
            "monitorList" => Self::MonitorList(args.take()?),
            "notificationList" => Self::NotificationList(args.take()?),
            "heartbeat" => Self::Heartbeat(args.take()?),
            "heartbeatList" => Self::HeartbeatList {
                monitor_id: args.take()?,
                heartbeats: args.take()?,
            },
            "importantHeartbeatList" => Self::ImportantHeartbeatList {
                monitor_id: args.take()?,
                heartbeats: args.take()?,
            },
            "avgPing" => Self::AvgPing {
                monitor_id: args.take()?,
                value: args.take()?,
            },
            "uptime" => Self::Uptime {
                monitor_id: args.take()?,
                period: args.take_key()?,
                value: args.take()?,
            },
            _ => Self::Other {
                name: name.to_owned(),
                args: args.inner.collect(),
            },
        };

        Ok(event)
    }

    /// The wire name of this event.
    pub fn name(&self) -> &str {
        match self {
            Self::MonitorList(_) => "monitorList",
            Self::NotificationList(_) => "notificationList",
            Self::Heartbeat(_) => "heartbeat",
            Self::HeartbeatList { .. } => "heartbeatList",
            Self::ImportantHeartbeatList { .. } => "importantHeartbeatList",
            Self::AvgPing { .. } => "avgPing",
            Self::Uptime { .. } => "uptime",
            Self::Other { name, .. } => name,
        }
    }
}

/// Positional argument reader for a single event.
struct Args<'a> {
    event: &'a str,
    inner: std::vec::IntoIter<Value>,
}

impl Args<'_> {
    fn take<T: serde::de::DeserializeOwned>(&mut self) -> Result<T, Error> {
        let value = self.inner.next().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| Error::deserialization(self.event, &e))
    }

    /// A map-key style argument that may arrive as a number or a string.
    fn take_key(&mut self) -> Result<String, Error> {
        match self.inner.next() {
            Some(Value::String(s)) => Ok(s),
            Some(Value::Number(n)) => Ok(n.to_string()),
            other => Err(Error::Deserialization {
                event: self.event.to_owned(),
                message: format!("expected a number or string key, got {other:?}"),
            }),
        }
    }
}

// ── Lenient field decoders ───────────────────────────────────────────

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::Number(n)) => Ok(n.as_i64().is_some_and(|v| v != 0)),
        Some(Value::Null) | None => Ok(false),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected bool or integer, got {other}"
        ))),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
