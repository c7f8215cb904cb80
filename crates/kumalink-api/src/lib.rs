// kumalink-api: Socket.IO wire layer for Uptime Kuma style monitoring servers

pub mod emitter;
pub mod error;
pub mod event;
pub mod packet;
pub mod socket;

pub use emitter::Emitter;
pub use error::Error;
pub use event::{
    Heartbeat, HeartbeatStatus, Monitor, MonitorId, MonitorMap, Notification, PushEvent, Reply,
};
pub use socket::{ChannelEvent, ReconnectConfig, SocketHandle};
