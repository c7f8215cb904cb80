use thiserror::Error;

/// Top-level error type for the `kumalink-api` crate.
///
/// Covers every failure mode of the wire layer: URL handling, the
/// WebSocket transport, Engine.IO/Socket.IO framing, payload decoding,
/// and the request/ack correlation. `kumalink-core` maps these into
/// user-facing variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The server URL cannot be turned into a WebSocket endpoint.
    #[error("Unsupported server URL scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    /// WebSocket connection failed or broke mid-stream.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the server.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// A frame that is not valid Engine.IO / Socket.IO.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server refused the Socket.IO namespace connection.
    #[error("Server refused connection: {message}")]
    ConnectRefused { message: String },

    /// JSON payload did not match the expected shape.
    #[error("Deserialization error in '{event}': {message}")]
    Deserialization { event: String, message: String },

    // ── Requests ────────────────────────────────────────────────────
    /// No reply arrived within the request timeout.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The channel is not connected, or dropped before the reply arrived.
    #[error("Channel disconnected")]
    Disconnected,

    /// The socket was shut down while the request was outstanding.
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_) | Self::Timeout { .. } | Self::Disconnected
        )
    }

    pub(crate) fn deserialization(event: &str, err: &serde_json::Error) -> Self {
        Self::Deserialization {
            event: event.to_owned(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        assert!(Error::Disconnected.is_transient());
        assert!(Error::Timeout { timeout_secs: 30 }.is_transient());
        assert!(!Error::Cancelled.is_transient());
        assert!(
            !Error::ConnectRefused {
                message: "nope".into()
            }
            .is_transient()
        );
    }
}
