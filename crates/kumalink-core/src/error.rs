// ── Core error types ──
//
// User-facing errors from kumalink-core. Consumers never see raw frame
// or JSON failures; the `From<kumalink_api::Error>` impl translates
// wire-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Server disconnected")]
    Disconnected,

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Operation rejected by server: {message}")]
    Rejected { message: String },

    #[error("Unknown time zone: {zone}")]
    InvalidTimezone { zone: String },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Local errors ─────────────────────────────────────────────────
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<kumalink_api::Error> for CoreError {
    fn from(err: kumalink_api::Error) -> Self {
        match err {
            kumalink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            kumalink_api::Error::UnsupportedScheme { scheme } => CoreError::Config {
                message: format!("Unsupported server URL scheme '{scheme}' (use http or https)"),
            },
            kumalink_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            kumalink_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            kumalink_api::Error::ConnectRefused { message } => {
                CoreError::AuthenticationFailed { message }
            }
            kumalink_api::Error::Protocol(message) => CoreError::Protocol { message },
            kumalink_api::Error::Deserialization { event, message } => CoreError::Protocol {
                message: format!("unexpected payload for '{event}': {message}"),
            },
            kumalink_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            kumalink_api::Error::Disconnected => CoreError::Disconnected,
            kumalink_api::Error::Cancelled => CoreError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failures_keep_their_kind() {
        assert!(matches!(
            CoreError::from(kumalink_api::Error::Timeout { timeout_secs: 30 }),
            CoreError::Timeout { timeout_secs: 30 }
        ));
        assert!(matches!(
            CoreError::from(kumalink_api::Error::Disconnected),
            CoreError::Disconnected
        ));
        assert!(matches!(
            CoreError::from(kumalink_api::Error::Cancelled),
            CoreError::Cancelled
        ));
    }

    #[test]
    fn refused_namespace_is_an_auth_failure() {
        let err = CoreError::from(kumalink_api::Error::ConnectRefused {
            message: "Not authorized".into(),
        });
        assert_eq!(err.to_string(), "Authentication failed: Not authorized");
    }
}
