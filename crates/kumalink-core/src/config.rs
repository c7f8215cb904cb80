// ── Runtime session configuration ──
//
// Describes *how* to talk to a monitoring server. Never touches disk;
// the CLI builds a `SessionConfig` from its profile and hands it in.

use std::time::Duration;

use kumalink_api::ReconnectConfig;
use url::Url;

/// Default bound on how long a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for one session against a single server.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server base URL (e.g. `http://localhost:3001`).
    pub server: Url,
    /// How long a request waits for its correlated reply.
    pub request_timeout: Duration,
    /// Transport reconnection policy.
    pub reconnect: ReconnectConfig,
}

impl SessionConfig {
    pub fn new(server: Url) -> Self {
        Self {
            server,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
