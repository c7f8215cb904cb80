// ── Command API ──
//
// Every server request besides login flows through `Command`. Each
// variant maps to one Socket.IO event and its positional arguments; the
// reply comes back verbatim and nothing is mutated locally. The server
// pushes the resulting state changes on its own.

use kumalink_api::{Monitor, MonitorId, Reply};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use strum::IntoStaticStr;

use crate::error::CoreError;

/// All requests a logged-in session can make.
#[derive(Debug, IntoStaticStr)]
pub enum Command {
    // ── Monitors ─────────────────────────────────────────────────────
    #[strum(serialize = "add")]
    AddMonitor { monitor: Monitor },
    #[strum(serialize = "editMonitor")]
    EditMonitor { monitor: Monitor },
    #[strum(serialize = "getMonitor")]
    GetMonitor { id: MonitorId },
    #[strum(serialize = "deleteMonitor")]
    DeleteMonitor { id: MonitorId },
    #[strum(serialize = "pauseMonitor")]
    PauseMonitor { id: MonitorId },
    #[strum(serialize = "resumeMonitor")]
    ResumeMonitor { id: MonitorId },

    // ── Notifications ────────────────────────────────────────────────
    /// Creates when `id` is `None`, updates otherwise.
    #[strum(serialize = "addNotification")]
    AddNotification {
        config: Map<String, Value>,
        id: Option<u64>,
    },
    #[strum(serialize = "deleteNotification")]
    DeleteNotification { id: u64 },
    #[strum(serialize = "testNotification")]
    TestNotification { config: Map<String, Value> },

    // ── Account ──────────────────────────────────────────────────────
    #[strum(serialize = "changePassword")]
    ChangePassword {
        current: SecretString,
        new: SecretString,
    },
}

impl Command {
    /// Wire event name.
    pub fn event(&self) -> &'static str {
        self.into()
    }

    /// Event name plus positional arguments.
    pub fn into_request(self) -> Result<(&'static str, Vec<Value>), CoreError> {
        let event = self.event();
        let args = match self {
            Self::AddMonitor { monitor } | Self::EditMonitor { monitor } => {
                vec![serde_json::to_value(monitor).map_err(|e| CoreError::Internal(e.to_string()))?]
            }
            Self::GetMonitor { id }
            | Self::DeleteMonitor { id }
            | Self::PauseMonitor { id }
            | Self::ResumeMonitor { id } => vec![json!(id)],
            Self::AddNotification { config, id } => vec![Value::Object(config), json!(id)],
            Self::DeleteNotification { id } => vec![json!(id)],
            Self::TestNotification { config } => vec![Value::Object(config)],
            Self::ChangePassword { current, new } => vec![json!({
                "currentPassword": current.expose_secret(),
                "newPassword": new.expose_secret(),
            })],
        };
        Ok((event, args))
    }
}

/// Turn an `ok == false` reply into [`CoreError::Rejected`].
pub fn ensure_ok(reply: Reply) -> Result<Reply, CoreError> {
    if reply.ok {
        Ok(reply)
    } else {
        Err(CoreError::Rejected {
            message: reply.message().to_owned(),
        })
    }
}
