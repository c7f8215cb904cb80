// kumalink-core: Live monitoring state and session lifecycle between kumalink-api and consumers.

pub mod auth;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod host;
pub mod session;
pub mod storage;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use auth::AuthState;
pub use command::{Command, ensure_ok};
pub use config::SessionConfig;
pub use connection::ConnectionState;
pub use error::CoreError;
pub use host::{Host, Toast, ToastLevel, ToastTimeout, TracingHost};
pub use session::Session;
pub use storage::{KeyValueStore, MemoryStore, StorageSelector};
pub use store::{LiveState, MonitorStatus};
pub use stream::StateStream;

// Wire types consumers handle directly.
pub use kumalink_api::{Heartbeat, Monitor, MonitorId, Notification, Reply};
