//! Terminal implementation of the session's host capabilities.
//!
//! Toasts become coloured lines on stderr, stamped with the local time
//! in the user's display timezone.

use std::sync::OnceLock;

use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use owo_colors::OwoColorize;

use kumalink_core::{Host, Toast, ToastLevel, ToastTimeout};

pub struct TerminalHost {
    color: bool,
    zone: OnceLock<Tz>,
}

impl TerminalHost {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            zone: OnceLock::new(),
        }
    }

    /// Render times in `zone` from now on. Unknown names keep UTC.
    pub fn set_zone(&self, zone: &str) {
        match zone.parse::<Tz>() {
            Ok(tz) => {
                let _ = self.zone.set(tz);
            }
            Err(_) => tracing::debug!(zone, "unknown display zone, using UTC"),
        }
    }

    /// A server timestamp (naive UTC) in the display zone.
    pub fn local_time(&self, utc: NaiveDateTime) -> String {
        let utc = Utc.from_utc_datetime(&utc);
        match self.zone.get() {
            Some(tz) => utc.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string(),
            None => utc.format("%Y-%m-%d %H:%M:%SZ").to_string(),
        }
    }

    pub fn format(&self, toast: &Toast) -> String {
        let stamp = match self.zone.get() {
            Some(tz) => Utc::now().with_timezone(tz).format("%H:%M:%S").to_string(),
            None => Utc::now().format("%H:%M:%SZ").to_string(),
        };
        let tag = match toast.level {
            ToastLevel::Success => "✓",
            ToastLevel::Error => "✗",
            ToastLevel::Info => "•",
        };
        let line = format!("{tag} {}", toast.message);
        let line = if self.color {
            match toast.level {
                ToastLevel::Success => line.green().to_string(),
                ToastLevel::Error => line.red().bold().to_string(),
                ToastLevel::Info => line.cyan().to_string(),
            }
        } else {
            line
        };
        format!("{stamp} {line}")
    }
}

impl Host for TerminalHost {
    fn notify(&self, toast: Toast) {
        tracing::debug!(
            level = %toast.level,
            persistent = matches!(toast.timeout, ToastTimeout::Persistent),
            "toast"
        );
        eprintln!("{}", self.format(&toast));
    }

    fn save_credentials_hint(&self) {
        tracing::info!("credential login succeeded");
    }
}
