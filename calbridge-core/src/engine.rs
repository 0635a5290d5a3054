//! The reconciliation engine.
//!
//! On each cycle the engine takes a fresh full snapshot from the source,
//! diffs it against the persisted sync state, and drives the target through
//! the matching create/update/delete operations. The source exposes no
//! change-log, so the diff is recomputed from scratch every time; that is
//! also what makes failed operations naturally retryable, a uid whose write
//! failed reappears in the same diff set on the next cycle.
//!
//! State is mutated after every successful operation rather than batched at
//! the end, so a crash loses at most the in-flight operation. A failure in
//! one operation never aborts its siblings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::event::NormalizedEvent;
use crate::range::SyncRange;
use crate::state::{StateStore, SyncRecord, SyncState};

/// Read side of a sync: produces the full normalized snapshot for a window.
#[allow(async_fn_in_trait)]
pub trait SourceCalendar {
    /// Fetch every event in the window, deduplicated by uid, with
    /// fingerprints already computed. Failures map to
    /// [`SyncError::Fetch`](crate::SyncError::Fetch) and abort the cycle.
    async fn fetch_events(&self, range: &SyncRange) -> SyncResult<Vec<NormalizedEvent>>;
}

/// Write side of a sync.
///
/// Implementations should attach the source uid and fingerprint as opaque
/// metadata on the created item where the target supports it, so mirrored
/// events can be verified (or state rebuilt) out of band.
#[allow(async_fn_in_trait)]
pub trait TargetCalendar {
    /// Create the event in the target, returning the id the target assigned.
    async fn create_event(&self, event: &NormalizedEvent) -> SyncResult<String>;

    /// Overwrite the target item with the event's current content.
    async fn update_event(&self, target_id: &str, event: &NormalizedEvent) -> SyncResult<()>;

    /// Delete the target item. Implementations MUST treat an already-absent
    /// item as success, deletes are retried across cycles.
    async fn delete_event(&self, target_id: &str) -> SyncResult<()>;
}

/// Counters for one cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub errors: usize,
}

impl RunStats {
    pub fn has_changes(&self) -> bool {
        self.created > 0 || self.updated > 0 || self.deleted > 0
    }
}

/// Snapshot of the engine's bookkeeping, for status reporting.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub total_mirrored: usize,
    pub last_sync: Option<DateTime<Utc>>,
}

/// One-way reconciliation engine between a source and a target calendar.
///
/// Callers must ensure only one cycle runs at a time per state file; the
/// engine performs no locking of its own, and two concurrent cycles against
/// the same state file will corrupt it.
pub struct SyncEngine<S, T> {
    source: S,
    target: T,
    store: StateStore,
    state: SyncState,
}

impl<S: SourceCalendar, T: TargetCalendar> SyncEngine<S, T> {
    /// Build an engine, loading whatever state the store has persisted.
    pub fn new(source: S, target: T, store: StateStore) -> Self {
        let state = store.load();
        SyncEngine {
            source,
            target,
            store,
            state,
        }
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            total_mirrored: self.state.records.len(),
            last_sync: self.state.last_sync,
        }
    }

    /// Run one fetch, diff, apply, persist cycle.
    ///
    /// Individual write failures are counted in `errors` and never abort the
    /// cycle; fetch and persist failures abort it as a whole. When the fetch
    /// fails, state and `last_sync` are left exactly as they were.
    pub async fn run_cycle(&mut self, range: &SyncRange) -> SyncResult<RunStats> {
        let events = self.source.fetch_events(range).await?;

        let snapshot: BTreeMap<String, NormalizedEvent> = events
            .into_iter()
            .map(|event| (event.uid.clone(), event))
            .collect();

        let (to_create, to_update) = self.detect_changes(&snapshot);
        let to_delete = self.detect_deletions(&snapshot);

        debug!(
            create = to_create.len(),
            update = to_update.len(),
            delete = to_delete.len(),
            total = snapshot.len(),
            "computed diff"
        );

        let mut stats = RunStats {
            unchanged: snapshot.len() - to_create.len() - to_update.len(),
            ..RunStats::default()
        };

        // Creates and updates go before deletes, so a uid that changed
        // identity can never leave a window where both copies are gone.
        for uid in &to_create {
            let event = &snapshot[uid];
            match self.target.create_event(event).await {
                Ok(target_id) => {
                    self.state.records.insert(
                        uid.clone(),
                        SyncRecord {
                            target_id,
                            fingerprint: event.fingerprint.clone(),
                        },
                    );
                    stats.created += 1;
                }
                Err(e) => {
                    warn!(uid = %uid, error = %e, "create failed, will retry next cycle");
                    stats.errors += 1;
                }
            }
        }

        for uid in &to_update {
            let event = &snapshot[uid];
            let target_id = self.state.records[uid].target_id.clone();
            match self.target.update_event(&target_id, event).await {
                Ok(()) => {
                    if let Some(record) = self.state.records.get_mut(uid) {
                        record.fingerprint = event.fingerprint.clone();
                    }
                    stats.updated += 1;
                }
                Err(e) => {
                    warn!(uid = %uid, error = %e, "update failed, will retry next cycle");
                    stats.errors += 1;
                }
            }
        }

        for uid in &to_delete {
            let target_id = self.state.records[uid].target_id.clone();
            match self.target.delete_event(&target_id).await {
                Ok(()) => {
                    self.state.records.remove(uid);
                    stats.deleted += 1;
                }
                Err(e) => {
                    warn!(uid = %uid, error = %e, "delete failed, record kept for retry");
                    stats.errors += 1;
                }
            }
        }

        self.state.last_sync = Some(Utc::now());
        self.store.save(&self.state)?;

        Ok(stats)
    }

    /// Split the snapshot into uids to create (unknown to state) and uids to
    /// update (known, but with a different fingerprint).
    fn detect_changes(
        &self,
        snapshot: &BTreeMap<String, NormalizedEvent>,
    ) -> (Vec<String>, Vec<String>) {
        let mut to_create = Vec::new();
        let mut to_update = Vec::new();

        for (uid, event) in snapshot {
            match self.state.records.get(uid) {
                None => to_create.push(uid.clone()),
                Some(record) if record.fingerprint != event.fingerprint => {
                    to_update.push(uid.clone())
                }
                Some(_) => {}
            }
        }

        (to_create, to_update)
    }

    /// Uids mirrored in a previous cycle but absent from the fresh snapshot.
    /// Absence is presumed deletion at the source: the snapshot is the full
    /// window, so anything missing from it no longer exists there.
    fn detect_deletions(&self, snapshot: &BTreeMap<String, NormalizedEvent>) -> Vec<String> {
        self.state
            .records
            .keys()
            .filter(|uid| !snapshot.contains_key(*uid))
            .cloned()
            .collect()
    }
}
