//! # Grid State Store
//!
//! Persists the last-known grid connection flag as a single `True`/`False`
//! text record. The time of the last change is not stored: it is recovered
//! from the file's modification time, which is bumped on every save.

use chrono::{DateTime, Local};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{GridWatchError, Result};

const CONNECTED: &str = "True";
const DISCONNECTED: &str = "False";

/// Last persisted connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedState {
    /// Whether the grid was connected when last saved
    pub connected: bool,

    /// When the state was last written (file modification time)
    pub since: DateTime<Local>,
}

/// File-backed store for [`PersistedState`]
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the persisted state
    ///
    /// Returns `None` when the file is missing, unreadable, or holds anything
    /// other than `True`/`False`.
    pub fn load(&self) -> Option<PersistedState> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state file at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read state file {}: {}", self.path.display(), e);
                return None;
            }
        };

        let connected = match contents.trim() {
            CONNECTED => true,
            DISCONNECTED => false,
            other => {
                warn!(
                    "Ignoring malformed state file {} (content: {:?})",
                    self.path.display(),
                    other
                );
                return None;
            }
        };

        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Failed to stat state file {}: {}", self.path.display(), e);
                return None;
            }
        };

        Some(PersistedState {
            connected,
            since: DateTime::<Local>::from(modified),
        })
    }

    /// Persist the connection flag
    ///
    /// # Errors
    ///
    /// Returns `GridWatchError::Persistence` if the file cannot be written
    pub fn save(&self, connected: bool) -> Result<()> {
        let contents = if connected { CONNECTED } else { DISCONNECTED };

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
                "Failed to write state file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!("Saved grid state {} to {}", contents, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use filetime::FileTime;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state"));

        store.save(false).unwrap();
        let state = store.load().unwrap();
        assert!(!state.connected);

        store.save(true).unwrap();
        let state = store.load().unwrap();
        assert!(state.connected);
    }

    #[test]
    fn test_file_format_is_python_bool_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        let store = StateStore::new(&path);

        store.save(true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "True");

        store.save(false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "False");
    }

    #[test]
    fn test_since_comes_from_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        let store = StateStore::new(&path);
        store.save(false).unwrap();

        let pinned = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        filetime::set_file_mtime(&path, FileTime::from_system_time(pinned)).unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.since, Local.timestamp_opt(1_700_000_000, 0).unwrap());
    }

    #[test]
    fn test_since_tracks_save_time() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state"));

        let before = Local::now() - chrono::Duration::seconds(2);
        store.save(true).unwrap();
        let after = Local::now() + chrono::Duration::seconds(2);

        let since = store.load().unwrap().since;
        assert!(since >= before && since <= after);
    }

    #[test]
    fn test_malformed_content_is_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        fs::write(&path, "maybe").unwrap();

        assert!(StateStore::new(&path).load().is_none());
    }

    #[test]
    fn test_trailing_newline_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        fs::write(&path, "False\n").unwrap();

        assert!(!StateStore::new(&path).load().unwrap().connected);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("nested/dir/state"));
        store.save(true).unwrap();
        assert!(store.load().unwrap().connected);
    }

    #[test]
    fn test_save_to_directory_fails() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        assert!(matches!(
            store.save(true),
            Err(GridWatchError::Persistence(_))
        ));
    }
}
