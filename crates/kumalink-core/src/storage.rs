// ── Storage selection ──
//
// The auth token lives in durable storage when the user asked to be
// remembered, in process-scoped storage otherwise. The `remember` and
// `timezone` preferences themselves are always durable.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::CoreError;
use crate::host::is_known_zone;

pub const TOKEN_KEY: &str = "token";
pub const REMEMBER_KEY: &str = "remember";
pub const TIMEZONE_KEY: &str = "timezone";

/// Sentinel timezone preference meaning "use the host's zone".
pub const AUTO_TIMEZONE: &str = "auto";

/// String key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;
    fn remove(&self, key: &str) -> Result<(), CoreError>;
}

/// Ephemeral store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Picks durable or ephemeral storage based on the `remember` preference.
///
/// The preference is read on every call, so toggling it takes effect for
/// the very next token operation.
#[derive(Clone)]
pub struct StorageSelector {
    durable: Arc<dyn KeyValueStore>,
    ephemeral: Arc<dyn KeyValueStore>,
}

impl StorageSelector {
    pub fn new(durable: Arc<dyn KeyValueStore>, ephemeral: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, ephemeral }
    }

    /// Both sides in memory; nothing outlives the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub fn durable(&self) -> &Arc<dyn KeyValueStore> {
        &self.durable
    }

    pub fn ephemeral(&self) -> &Arc<dyn KeyValueStore> {
        &self.ephemeral
    }

    // ── Preferences ──────────────────────────────────────────────────

    /// `false` only when durable storage holds exactly `"0"`.
    pub fn remember(&self) -> Result<bool, CoreError> {
        Ok(self.durable.get(REMEMBER_KEY)?.as_deref() != Some("0"))
    }

    pub fn set_remember(&self, remember: bool) -> Result<(), CoreError> {
        self.durable
            .set(REMEMBER_KEY, if remember { "1" } else { "0" })
    }

    /// Stored zone name, or `auto` when unset.
    pub fn timezone_preference(&self) -> Result<String, CoreError> {
        Ok(self
            .durable
            .get(TIMEZONE_KEY)?
            .unwrap_or_else(|| AUTO_TIMEZONE.to_owned()))
    }

    pub fn set_timezone_preference(&self, zone: &str) -> Result<(), CoreError> {
        if zone != AUTO_TIMEZONE && !is_known_zone(zone) {
            return Err(CoreError::InvalidTimezone {
                zone: zone.to_owned(),
            });
        }
        self.durable.set(TIMEZONE_KEY, zone)
    }

    // ── Token ────────────────────────────────────────────────────────

    /// The store token operations currently go to.
    pub fn resolve(&self) -> Result<&Arc<dyn KeyValueStore>, CoreError> {
        Ok(if self.remember()? {
            &self.durable
        } else {
            &self.ephemeral
        })
    }

    pub fn token(&self) -> Result<Option<String>, CoreError> {
        self.resolve()?.get(TOKEN_KEY)
    }

    pub fn set_token(&self, token: &str) -> Result<(), CoreError> {
        self.resolve()?.set(TOKEN_KEY, token)
    }

    pub fn remove_token(&self) -> Result<(), CoreError> {
        self.resolve()?.remove(TOKEN_KEY)
    }
}

impl std::fmt::Debug for StorageSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSelector").finish_non_exhaustive()
    }
}
