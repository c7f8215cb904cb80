// ── File-backed key-value store ──
//
// A flat TOML table of strings. Each write rewrites the whole file via a
// sibling temp file and rename, so a crash never leaves a half-written
// token behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use kumalink_core::{CoreError, KeyValueStore};

use crate::ConfigError;

type Entries = BTreeMap<String, String>;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Entries, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, entries: &Entries) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = toml::to_string(entries)?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, body)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read-modify-write under the store's lock.
    fn update(&self, f: impl FnOnce(&mut Entries) -> bool) -> Result<(), CoreError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| CoreError::storage("state file lock poisoned"))?;
        let mut entries = self.read().map_err(CoreError::storage)?;
        if f(&mut entries) {
            self.write(&entries).map_err(CoreError::storage)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| CoreError::storage("state file lock poisoned"))?;
        let mut entries = self.read().map_err(CoreError::storage)?;
        Ok(entries.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        tracing::debug!(key, path = %self.path.display(), "persisting value");
        self.update(|entries| {
            entries.insert(key.to_owned(), value.to_owned()).as_deref() != Some(value)
        })
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.update(|entries| entries.remove(key).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage_at;
    use pretty_assertions::assert_eq;

    #[test]
    fn values_survive_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("state.toml");

        let store = FileStore::new(&path);
        assert_eq!(store.get("token").unwrap(), None);
        store.set("token", "jwt").unwrap();
        store.set("remember", "1").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("token").unwrap().as_deref(), Some("jwt"));
        reopened.remove("token").unwrap();
        assert_eq!(store.get("token").unwrap(), None);
        assert_eq!(store.get("remember").unwrap().as_deref(), Some("1"));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn removing_a_missing_key_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        FileStore::new(&path).remove("token").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(&path, "token = [not toml").unwrap();
        assert!(matches!(
            FileStore::new(&path).get("token"),
            Err(CoreError::Storage { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn state_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        FileStore::new(&path).set("token", "jwt").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn unremembered_token_stays_out_of_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        let storage = storage_at(path.clone());

        storage.set_remember(false).unwrap();
        storage.set_token("session-only").unwrap();

        let on_disk = FileStore::new(&path);
        assert_eq!(on_disk.get("remember").unwrap().as_deref(), Some("0"));
        assert_eq!(on_disk.get("token").unwrap(), None);
        assert_eq!(storage.token().unwrap().as_deref(), Some("session-only"));
    }
}
