use tracing::{debug, warn};

use crate::decoder::DecodedEvent;
use crate::display::Display;
use crate::error::StoreError;
use crate::history::{HistoryLog, Snapshot};
use crate::store::{HistoryStore, HISTORY_KEY};
use crate::types::{HistoryEntry, SequenceId};

/// Turns decoded events into live-view updates and history units, and mirrors
/// the history into the store after every change.
///
/// The in-memory log is authoritative. A failed store write is logged and
/// dropped; it never undoes the visual update and is not retried.
pub struct HistoryRenderer<S> {
    log: HistoryLog,
    store: S,
}

impl<S: HistoryStore> HistoryRenderer<S> {
    pub fn new(store: S, limit: Option<usize>) -> Self {
        Self {
            log: HistoryLog::new(limit),
            store,
        }
    }

    pub fn log(&self) -> &HistoryLog {
        &self.log
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Load the last snapshot into the log and show it.
    ///
    /// A missing, corrupt or foreign snapshot leaves the log empty. Returns the
    /// number of restored entries.
    pub fn restore(&mut self, display: &mut impl Display) -> usize {
        let limit = self.log.limit();
        self.log = match load_snapshot(&self.store) {
            Ok(Some(snapshot)) => HistoryLog::from_entries(snapshot.entries, limit),
            Ok(None) => HistoryLog::new(limit),
            Err(e) => {
                warn!(error = %e, "ignoring stored history");
                HistoryLog::new(limit)
            }
        };
        debug!(entries = self.log.len(), "history restored");
        display.show_history(&self.log.markup(), self.log.len());
        self.log.len()
    }

    pub fn render(&mut self, display: &mut impl Display, id: SequenceId, event: DecodedEvent) {
        display.show_current(&event.pretty, event.device_count);

        self.log.prepend(HistoryEntry {
            sequence_id: id,
            device_count: event.device_count,
            serialized_result: event.pretty,
        });
        display.show_history(&self.log.markup(), self.log.len());

        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist history");
        }
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.log.snapshot())?;
        self.store.set(HISTORY_KEY, &json)
    }
}

fn load_snapshot(store: &impl HistoryStore) -> Result<Option<Snapshot>, StoreError> {
    let Some(raw) = store.get(HISTORY_KEY)? else {
        return Ok(None);
    };
    let snapshot: Snapshot = serde_json::from_str(&raw)?;
    if snapshot.version != Snapshot::VERSION {
        return Err(StoreError::UnsupportedVersion(snapshot.version));
    }
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::store::MemoryStore;
    use crate::types::StatusView;

    #[derive(Default)]
    struct Screen {
        current: Option<(String, usize)>,
        history: String,
    }

    impl Display for Screen {
        fn show_current(&mut self, text: &str, count: usize) {
            self.current = Some((text.to_string(), count));
        }
        fn show_history(&mut self, markup: &str, _entries: usize) {
            self.history = markup.to_string();
        }
        fn show_status(&mut self, _: &StatusView) {}
    }

    struct FailingStore;

    impl HistoryStore for FailingStore {
        fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }
        fn set(&mut self, key: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::InvalidKey(key.to_string()))
        }
    }

    #[test]
    fn store_failure_keeps_visual_state() {
        let mut r = HistoryRenderer::new(FailingStore, None);
        let mut s = Screen::default();
        r.render(&mut s, "1".into(), decode(r#"{"a":1}"#).unwrap());
        r.render(&mut s, "2".into(), decode(r#"{}"#).unwrap());
        assert_eq!(r.log().len(), 2);
        assert_eq!(s.current, Some(("{}".to_string(), 0)));
    }

    #[test]
    fn corrupt_snapshot_restores_empty() {
        let mut store = MemoryStore::new();
        store.set(HISTORY_KEY, "<details>old markup</details>").unwrap();
        let mut r = HistoryRenderer::new(store, None);
        let mut s = Screen::default();
        assert_eq!(r.restore(&mut s), 0);
        assert_eq!(s.history, "");
    }

    #[test]
    fn unknown_version_restores_empty() {
        let mut store = MemoryStore::new();
        store
            .set(HISTORY_KEY, r#"{"version":99,"entries":[]}"#)
            .unwrap();
        let mut r = HistoryRenderer::new(store, None);
        assert_eq!(r.restore(&mut Screen::default()), 0);
    }

    #[test]
    fn restore_applies_limit() {
        let mut first = HistoryRenderer::new(MemoryStore::new(), None);
        let mut s = Screen::default();
        for id in ["1", "2", "3"] {
            first.render(&mut s, id.into(), decode("{}").unwrap());
        }
        let mut second = HistoryRenderer::new(first.into_store(), Some(2));
        assert_eq!(second.restore(&mut s), 2);
        assert_eq!(second.log().first().unwrap().sequence_id.as_str(), "3");
    }
}
