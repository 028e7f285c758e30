//! Session-scoped key/value persistence for the rendered history.
//!
//! A store holds opaque string values under string keys. The history renderer
//! uses one fixed key ([`HISTORY_KEY`]) and writes the whole snapshot on every
//! rendered event. Two backends:
//!
//! - [`MemoryStore`]: lives as long as the value does.
//! - [`SessionFileStore`]: one file per key under `<root>/<session>/`, so a
//!   restarted process with the same session name sees the last snapshot.
//!   Writes go to a temp file that is renamed over the target, a crash mid-write
//!   leaves the previous snapshot intact.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreError;

pub const HISTORY_KEY: &str = "resultDetailsBackup";

pub trait HistoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SessionFileStore {
    dir: PathBuf,
}

impl SessionFileStore {
    /// Store for `session` under `root`. Nothing is touched on disk until the first write.
    pub fn open(root: impl AsRef<Path>, session: &str) -> Result<Self, StoreError> {
        validate_key(session)?;
        Ok(Self {
            dir: root.as_ref().join(session),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Forget everything stored for this session.
    pub fn end_session(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                debug!(dir = %self.dir.display(), "session store cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.dir.clone(),
                source,
            }),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl HistoryStore for SessionFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(value.as_bytes()).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// Keys and session names become path components; keep them to one plain segment.
fn validate_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_overwrites() {
        let mut s = MemoryStore::new();
        assert_eq!(s.get("k").unwrap(), None);
        s.set("k", "one").unwrap();
        s.set("k", "two").unwrap();
        assert_eq!(s.get("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let root = tempfile::tempdir().unwrap();
        let mut s = SessionFileStore::open(root.path(), "lobby").unwrap();
        assert_eq!(s.get(HISTORY_KEY).unwrap(), None);
        s.set(HISTORY_KEY, "snapshot").unwrap();

        let reopened = SessionFileStore::open(root.path(), "lobby").unwrap();
        assert_eq!(reopened.get(HISTORY_KEY).unwrap().as_deref(), Some("snapshot"));

        let other = SessionFileStore::open(root.path(), "hall").unwrap();
        assert_eq!(other.get(HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn end_session_clears_values() {
        let root = tempfile::tempdir().unwrap();
        let mut s = SessionFileStore::open(root.path(), "lobby").unwrap();
        s.set(HISTORY_KEY, "snapshot").unwrap();
        s.end_session().unwrap();
        assert_eq!(s.get(HISTORY_KEY).unwrap(), None);
        // ending twice is fine
        s.end_session().unwrap();
    }

    #[test]
    fn rejects_path_like_names() {
        let root = tempfile::tempdir().unwrap();
        assert!(SessionFileStore::open(root.path(), "../x").is_err());
        assert!(SessionFileStore::open(root.path(), "").is_err());
        let mut s = SessionFileStore::open(root.path(), "ok").unwrap();
        assert!(matches!(s.set("a/b", "v"), Err(StoreError::InvalidKey(_))));
    }
}
