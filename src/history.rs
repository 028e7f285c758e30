//! The visual history: an append-at-front list of rendered scan events and
//! its markup form.

use std::collections::VecDeque;

use maud::{html, Markup};
use serde::{Deserialize, Serialize};

use crate::types::HistoryEntry;

/// Suffix appended to device counts in the history list ("台" is the counter for machines).
pub const COUNT_SUFFIX: &str = "台";

/// History entries, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    limit: Option<usize>,
}

impl HistoryLog {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Build a log from entries already ordered newest first.
    pub fn from_entries(entries: Vec<HistoryEntry>, limit: Option<usize>) -> Self {
        let mut log = Self {
            entries: entries.into(),
            limit,
        };
        log.enforce_limit();
        log
    }

    /// Put `entry` at the top. Entries beyond the limit fall off the bottom.
    pub fn prepend(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.enforce_limit();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn first(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Markup of the whole container, newest unit first.
    pub fn markup(&self) -> String {
        let markup = html! {
            @for entry in &self.entries {
                (entry_unit(entry))
            }
        };
        markup.into_string()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: Snapshot::VERSION,
            entries: self.entries.iter().cloned().collect(),
        }
    }

    fn enforce_limit(&mut self) {
        if let Some(limit) = self.limit {
            self.entries.truncate(limit);
        }
    }
}

/// Persisted form of a [`HistoryLog`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub version: u32,
    pub entries: Vec<HistoryEntry>,
}

impl Snapshot {
    pub const VERSION: u32 = 1;
}

/// One history unit: `#id` summary, the pretty result and a count.
pub fn render_unit(label: &str, body: &str, count: usize) -> Markup {
    html! {
        details {
            summary { (label) }
            pre { code { (body) } }
            data-count { (count) (COUNT_SUFFIX) }
        }
    }
}

pub fn entry_unit(entry: &HistoryEntry) -> Markup {
    render_unit(
        &entry.sequence_id.label(),
        &entry.serialized_result,
        entry.device_count,
    )
}
