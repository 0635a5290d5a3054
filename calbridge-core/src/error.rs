//! Error types for calbridge operations.

use thiserror::Error;

/// Errors that can occur during a sync cycle.
///
/// A corrupt state file is not represented here: the state store recovers
/// from it by starting over with an empty state (see
/// [`crate::state::StateStore::load`]).
#[derive(Error, Debug)]
pub enum SyncError {
    /// The source calendar could not be read. Fatal to the current cycle:
    /// nothing is diffed or applied, and `last_sync` is left untouched.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A single write against the target failed. Recoverable: the affected
    /// event keeps its previous sync state and is retried on the next cycle,
    /// since the diff is recomputed from scratch each time.
    #[error("Write error: {0}")]
    Write(String),

    /// The sync state could not be persisted after a cycle. The in-memory
    /// state reflects what was applied, but the next cycle would redo that
    /// work, so this is surfaced to the caller.
    #[error("Failed to persist sync state: {0}")]
    StatePersist(String),
}

/// Result type alias for calbridge operations.
pub type SyncResult<T> = Result<T, SyncError>;
