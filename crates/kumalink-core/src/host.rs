// ── Host capabilities ──
//
// Things the embedding application provides: showing a notification,
// guessing the local time zone, and nudging a password manager after a
// successful credential login.

use std::time::Duration;

use strum::{Display, IntoStaticStr};

/// How long a success toast stays up.
pub const SUCCESS_TOAST_TIMEOUT: Duration = Duration::from_secs(20);
/// Auto-dismiss delay for toasts that don't ask for anything else.
pub const DEFAULT_TOAST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastTimeout {
    /// Stays until the user dismisses it.
    Persistent,
    After(Duration),
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    pub timeout: ToastTimeout,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
            timeout: ToastTimeout::After(SUCCESS_TOAST_TIMEOUT),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
            timeout: ToastTimeout::Persistent,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            message: message.into(),
            timeout: ToastTimeout::After(DEFAULT_TOAST_TIMEOUT),
        }
    }
}

/// Capabilities consumed from the embedding application.
pub trait Host: Send + Sync {
    /// Present a notification.
    fn notify(&self, toast: Toast);

    /// IANA name of the local time zone, used when the preference is `auto`.
    fn detect_timezone(&self) -> String {
        detect_system_timezone()
    }

    /// Called after a credential login succeeds.
    fn save_credentials_hint(&self) {}
}

/// Host that only logs. Useful for headless embedding and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHost;

impl Host for TracingHost {
    fn notify(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Error => tracing::warn!(message = %toast.message, "notification"),
            ToastLevel::Success | ToastLevel::Info => {
                tracing::info!(level = %toast.level, message = %toast.message, "notification");
            }
        }
    }
}

// ── Time zone detection ──────────────────────────────────────────────

/// Best-effort local zone: `$TZ` if it names a known zone, then the
/// platform's configured zone. Falls back to `UTC`.
pub fn detect_system_timezone() -> String {
    std::env::var("TZ")
        .ok()
        .map(|tz| tz.trim_start_matches(':').to_owned())
        .filter(|tz| is_known_zone(tz))
        .or_else(|| match iana_time_zone::get_timezone() {
            Ok(zone) if is_known_zone(&zone) => Some(zone),
            Ok(zone) => {
                tracing::debug!(%zone, "platform zone unknown to chrono-tz");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "cannot read platform zone");
                None
            }
        })
        .unwrap_or_else(|| "UTC".to_owned())
}

/// Whether `name` is an IANA zone chrono-tz knows about.
pub fn is_known_zone(name: &str) -> bool {
    name.parse::<chrono_tz::Tz>().is_ok()
}
