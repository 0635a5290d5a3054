//! Durable sync state: which source events are mirrored where.
//!
//! The state file is the engine's only memory of prior runs. It maps each
//! source uid to the id the target assigned and the fingerprint that was
//! last written, and records when the last cycle completed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SyncError, SyncResult};

/// Bookkeeping for one mirrored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Id the target system assigned at creation time.
    pub target_id: String,
    /// Fingerprint of the content last successfully written to the target.
    pub fingerprint: String,
}

/// The persisted sync state.
///
/// `records` only ever contains entries for events the engine has
/// successfully created in the target. Entries are inserted, rewritten and
/// removed one at a time as operations succeed, so a crash loses at most the
/// in-flight operation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncState {
    /// Source uid to sync record. BTreeMap keeps iteration and serialization
    /// deterministic.
    pub records: BTreeMap<String, SyncRecord>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Loads and saves [`SyncState`] at a fixed path.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state.
    ///
    /// A missing file means a first run. An unreadable or malformed file is
    /// recovered as an empty state: every currently-mirrored event will be
    /// re-created on the next cycle, which is visible and fixable, unlike
    /// silently refusing to sync. Both recoveries are warned about loudly.
    pub fn load(&self) -> SyncState {
        if !self.path.exists() {
            return SyncState::default();
        }

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "sync state unreadable, starting from empty state; mirrored events will be re-created"
                );
                return SyncState::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "sync state corrupt, starting from empty state; mirrored events will be re-created"
                );
                SyncState::default()
            }
        }
    }

    /// Persist the state as a total overwrite.
    ///
    /// Writes a temp file and renames it over the old one, so a crash
    /// mid-write can never leave a torn state file behind.
    pub fn save(&self, state: &SyncState) -> SyncResult<()> {
        let contents = serde_json::to_string_pretty(state)
            .map_err(|e| SyncError::StatePersist(format!("serialize: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SyncError::StatePersist(format!("create {}: {e}", parent.display()))
                })?;
            }
        }

        let mut temp = self.path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        std::fs::write(&temp, contents)
            .map_err(|e| SyncError::StatePersist(format!("write {}: {e}", temp.display())))?;
        std::fs::rename(&temp, &self.path)
            .map_err(|e| SyncError::StatePersist(format!("rename to {}: {e}", self.path.display())))?;

        Ok(())
    }
}
