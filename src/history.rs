//! # Transition History
//!
//! Bounded, newest-first list of grid transitions persisted as a JSON array:
//!
//! ```json
//! [{"type": "ON_GRID", "time": "2024-01-01 12:00:00"},
//!  {"type": "OFF_GRID", "time": "2024-01-01 10:00:00"}]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{GridWatchError, Result};

/// Kind of grid transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GridEvent {
    OnGrid,
    OffGrid,
}

impl GridEvent {
    #[must_use]
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            Self::OnGrid
        } else {
            Self::OffGrid
        }
    }
}

impl fmt::Display for GridEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnGrid => f.write_str("ON_GRID"),
            Self::OffGrid => f.write_str("OFF_GRID"),
        }
    }
}

/// A single recorded transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: GridEvent,

    /// Device time of the reading that triggered the transition
    pub time: String,
}

impl HistoryEntry {
    pub fn new(kind: GridEvent, time: impl Into<String>) -> Self {
        Self {
            kind,
            time: time.into(),
        }
    }
}

/// Newest-first transition list holding at most `capacity` entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<HistoryEntry>,
    capacity: usize,
}

impl History {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Build a history from existing entries (newest first)
    ///
    /// Entries beyond `capacity` are dropped from the tail.
    #[must_use]
    pub fn from_entries(mut entries: Vec<HistoryEntry>, capacity: usize) -> Self {
        entries.truncate(capacity);
        Self { entries, capacity }
    }

    /// Insert a new transition at the head, evicting the oldest when full
    pub fn record(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.truncate(self.capacity - 1);
        }
        self.entries.insert(0, entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// File-backed store for [`History`]
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    capacity: usize,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(path: P, capacity: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            capacity,
        }
    }

    /// Load the history, treating a missing or corrupt file as empty
    pub fn load(&self) -> History {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history file at {}", self.path.display());
                return History::with_capacity(self.capacity);
            }
            Err(e) => {
                warn!("Failed to read history file {}: {}", self.path.display(), e);
                return History::with_capacity(self.capacity);
            }
        };

        match serde_json::from_str::<Vec<HistoryEntry>>(&contents) {
            Ok(entries) => History::from_entries(entries, self.capacity),
            Err(e) => {
                warn!(
                    "Ignoring corrupt history file {}: {}",
                    self.path.display(),
                    e
                );
                History::with_capacity(self.capacity)
            }
        }
    }

    /// Write the history as a JSON array, newest first
    ///
    /// # Errors
    ///
    /// Returns `GridWatchError::Persistence` if the file cannot be written
    pub fn save(&self, history: &History) -> Result<()> {
        let contents = serde_json::to_string(history.entries())?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    GridWatchError::Persistence(format!(
                        "Failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        fs::write(&self.path, contents).map_err(|e| {
            GridWatchError::Persistence(format!(
                "Failed to write history file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(
            "Saved {} history entries to {}",
            history.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn on(time: &str) -> HistoryEntry {
        HistoryEntry::new(GridEvent::OnGrid, time)
    }

    fn off(time: &str) -> HistoryEntry {
        HistoryEntry::new(GridEvent::OffGrid, time)
    }

    #[test]
    fn test_record_prepends() {
        let mut history = History::with_capacity(5);
        history.record(off("t1"));
        history.record(on("t2"));

        assert_eq!(history.entries(), &[on("t2"), off("t1")]);
    }

    #[test]
    fn test_record_at_capacity_evicts_oldest() {
        let mut history = History::from_entries(vec![on("t2"), off("t1")], 2);
        history.record(on("t3"));

        assert_eq!(history.entries(), &[on("t3"), on("t2")]);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut history = History::with_capacity(3);
        for i in 0..10 {
            history.record(HistoryEntry::new(
                GridEvent::from_connected(i % 2 == 0),
                format!("t{}", i),
            ));
            assert!(history.len() <= 3);
        }
        assert_eq!(history.entries()[0].time, "t9");
        assert_eq!(history.entries()[2].time, "t7");
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut history = History::with_capacity(0);
        history.record(on("t1"));
        assert!(history.is_empty());
    }

    #[test]
    fn test_from_entries_truncates_to_capacity() {
        let history = History::from_entries(vec![on("t3"), off("t2"), on("t1")], 2);
        assert_eq!(history.entries(), &[on("t3"), off("t2")]);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&[off("2024-01-01 10:00:00")]).unwrap();
        assert_eq!(json, r#"[{"type":"OFF_GRID","time":"2024-01-01 10:00:00"}]"#);
    }

    #[test]
    fn test_store_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"), 5);
        let history = store.load();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 5);
    }

    #[test]
    fn test_store_load_corrupt_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{not json").unwrap();

        assert!(HistoryStore::new(&path, 5).load().is_empty());
    }

    #[test]
    fn test_store_save_load() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"), 5);

        let mut history = store.load();
        history.record(off("t1"));
        history.record(on("t2"));
        store.save(&history).unwrap();

        assert_eq!(store.load(), history);
    }

    #[test]
    fn test_store_reads_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"[{"type": "ON_GRID", "time": "b"}, {"type": "OFF_GRID", "time": "a"}]"#,
        )
        .unwrap();

        let history = HistoryStore::new(&path, 5).load();
        assert_eq!(history.entries(), &[on("b"), off("a")]);
    }
}
