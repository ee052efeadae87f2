//! The serving index: one coarse lock around store, snapshot and stats.
//!
//! Every public operation takes the lock exactly once and runs to completion
//! under it, so searches never see a torn store and writers never interleave.
//! Mutations are persisted before they return; when the snapshot write fails
//! the in-memory change is undone.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::embedding::Embedding;
use crate::error::VectorError;
use crate::index::{SearchResult, VectorIndex};
use crate::rebuild::{self, RebuildReport, RecordSource};
use crate::snapshot::SnapshotStore;
use crate::stats::{IndexLifecycle, IndexStats, StatsCollector};
use crate::store::VectorStore;

/// Why startup had to rebuild instead of loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    /// No snapshot on disk
    Missing,
    /// Snapshot present but rejected
    Corrupt(String),
}

/// Result of [`SharedIndex::load_or_rebuild`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// Snapshot loaded as-is
    Loaded { size: usize },
    /// Snapshot missing or corrupt; rebuilt from the record source
    Rebuilt {
        reason: RebuildReason,
        report: RebuildReport,
    },
    /// The index was already serving; nothing was done
    AlreadyLoaded { size: usize },
}

struct IndexState {
    lifecycle: IndexLifecycle,
    store: Option<VectorStore>,
    snapshot: SnapshotStore,
    stats: StatsCollector,
}

impl IndexState {
    fn serving(&self) -> Result<&VectorStore, VectorError> {
        match (&self.lifecycle, &self.store) {
            (IndexLifecycle::Loaded, Some(store)) => Ok(store),
            _ => Err(VectorError::NotInitialized),
        }
    }

    fn ensure_serving(&self) -> Result<(), VectorError> {
        self.serving().map(|_| ())
    }

    fn upsert(&mut self, id: i64, vector: &[f32]) -> Result<(), VectorError> {
        let IndexState {
            store, snapshot, ..
        } = self;
        let store = store.as_mut().ok_or(VectorError::NotInitialized)?;

        let prior = store.upsert(id, vector)?;
        if let Err(e) = snapshot.save(store) {
            return Err(roll_back(store, snapshot, id, prior, e));
        }
        Ok(())
    }

    fn remove(&mut self, id: i64) -> Result<bool, VectorError> {
        let IndexState {
            store, snapshot, ..
        } = self;
        let store = store.as_mut().ok_or(VectorError::NotInitialized)?;

        let prior = match store.remove(id) {
            Some(prior) => prior,
            // Nothing changed, the snapshot is already current.
            None => return Ok(false),
        };
        if let Err(e) = snapshot.save(store) {
            return Err(roll_back(store, snapshot, id, Some(prior), e));
        }
        Ok(true)
    }
}

/// Undo a mutation whose snapshot write failed.
///
/// If the rename already happened the disk holds the new state, so the
/// restored state is written again; failing that, the entry is reported as
/// unrecoverable instead of retrying.
fn roll_back(
    store: &mut VectorStore,
    snapshot: &SnapshotStore,
    id: i64,
    prior: Option<Embedding>,
    err: VectorError,
) -> VectorError {
    store.restore(id, prior);

    if let VectorError::Persistence { stage, .. } = &err {
        if stage.is_committed() {
            if let Err(resave) = snapshot.save(store) {
                error!(id = id, error = %err, resave_error = %resave, "Rollback failed");
                return VectorError::RollbackFailed {
                    id: Some(id),
                    reason: format!("{}; re-save failed: {}", err, resave),
                };
            }
        }
    }
    err
}

/// Thread-safe persistent vector index.
///
/// Construct it, call [`load_or_rebuild`](Self::load_or_rebuild) once, then
/// share it (e.g. in an `Arc`) with request handlers.
pub struct SharedIndex {
    dimension: usize,
    inner: Mutex<IndexState>,
}

impl SharedIndex {
    /// Create an uninitialized index backed by `snapshot`.
    pub fn new(dimension: usize, snapshot: SnapshotStore) -> Self {
        Self {
            dimension,
            inner: Mutex::new(IndexState {
                lifecycle: IndexLifecycle::Uninitialized,
                store: None,
                snapshot,
                stats: StatsCollector::new(),
            }),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn lock(&self) -> Result<MutexGuard<'_, IndexState>, VectorError> {
        self.inner
            .lock()
            .map_err(|e| VectorError::Lock(format!("Failed to acquire index lock: {}", e)))
    }

    /// Current lifecycle state. Available in every state.
    pub fn lifecycle(&self) -> Result<IndexLifecycle, VectorError> {
        Ok(self.lock()?.lifecycle)
    }

    /// Load the snapshot, or rebuild from `source` when it is missing or
    /// corrupt.
    ///
    /// A snapshot whose dimension differs from the configured one counts as
    /// corrupt. If the rebuild fails too, the index moves to
    /// [`IndexLifecycle::Failed`] and refuses every operation. A corrupt
    /// snapshot is never replaced from a source that is not authoritative;
    /// the file stays on disk and the index fails instead.
    pub fn load_or_rebuild<S: RecordSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<StartupOutcome, VectorError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        if let (IndexLifecycle::Loaded, Some(store)) = (&state.lifecycle, &state.store) {
            return Ok(StartupOutcome::AlreadyLoaded { size: store.len() });
        }

        let reason = match state.snapshot.load() {
            Ok(Some(store)) if store.dimension() == self.dimension => {
                let size = store.len();
                state.store = Some(store);
                state.lifecycle = IndexLifecycle::Loaded;
                info!(vectors = size, "Vector index loaded from snapshot");
                return Ok(StartupOutcome::Loaded { size });
            }
            Ok(Some(store)) => {
                let reason = format!(
                    "snapshot dimension {} does not match configured {}",
                    store.dimension(),
                    self.dimension
                );
                warn!(%reason, "Discarding snapshot");
                RebuildReason::Corrupt(reason)
            }
            Ok(None) => {
                info!("No snapshot found, rebuilding from source");
                RebuildReason::Missing
            }
            Err(e) => {
                warn!(error = %e, "Snapshot corrupt, rebuilding from source");
                RebuildReason::Corrupt(e.to_string())
            }
        };

        if let RebuildReason::Corrupt(why) = &reason {
            if !source.is_authoritative() {
                error!(
                    path = ?state.snapshot.path(),
                    reason = %why,
                    "Snapshot unusable and no record source to rebuild from, index will not serve"
                );
                state.store = None;
                state.lifecycle = IndexLifecycle::Failed;
                return Err(VectorError::Rebuild(format!(
                    "snapshot {:?} is unusable ({}) and no record source is available",
                    state.snapshot.path(),
                    why
                )));
            }
        }

        state.lifecycle = IndexLifecycle::Rebuilding;
        match rebuild::rebuild(self.dimension, source, &state.snapshot) {
            Ok((store, report)) => {
                state.store = Some(store);
                state.stats.record_rebuild(report.elapsed_ms);
                state.lifecycle = IndexLifecycle::Loaded;
                Ok(StartupOutcome::Rebuilt { reason, report })
            }
            Err(e) => {
                error!(error = %e, "Startup rebuild failed, index will not serve");
                state.store = None;
                state.lifecycle = IndexLifecycle::Failed;
                Err(e)
            }
        }
    }

    /// Insert or replace the vector for `id`, persisting before returning.
    pub fn upsert(&self, id: i64, vector: &[f32]) -> Result<(), VectorError> {
        let mut state = self.lock()?;
        state.ensure_serving()?;

        match state.upsert(id, vector) {
            Ok(()) => {
                debug!(id = id, "Upsert persisted");
                Ok(())
            }
            Err(e) => {
                state.stats.record_add_failure();
                warn!(id = id, error = %e, "Upsert failed");
                Err(e)
            }
        }
    }

    /// Remove `id`, persisting before returning. Returns whether it existed;
    /// removing an absent id succeeds.
    pub fn remove(&self, id: i64) -> Result<bool, VectorError> {
        let mut state = self.lock()?;
        state.ensure_serving()?;

        match state.remove(id) {
            Ok(existed) => {
                debug!(id = id, existed = existed, "Remove complete");
                Ok(existed)
            }
            Err(e) => {
                state.stats.record_remove_failure();
                warn!(id = id, error = %e, "Remove failed");
                Err(e)
            }
        }
    }

    /// Top-`k` ids by cosine similarity to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, VectorError> {
        let mut state = self.lock()?;
        let results = state.serving()?.search(query, k)?;
        state.stats.record_search();
        Ok(results)
    }

    /// Counters plus current size, read under the index lock.
    pub fn stats(&self) -> Result<IndexStats, VectorError> {
        let state = self.lock()?;
        let store = state.serving()?;
        Ok(state.stats.snapshot(
            store.len(),
            store.dimension(),
            state.snapshot.size_bytes(),
            state.lifecycle,
        ))
    }

    /// All ids currently indexed, ascending.
    pub fn ids(&self) -> Result<Vec<i64>, VectorError> {
        Ok(self.lock()?.serving()?.ids())
    }

    /// Replace the serving store with one rebuilt from `source`.
    ///
    /// The new store is built and persisted before the swap; on any failure
    /// the previous store keeps serving.
    pub fn force_rebuild<S: RecordSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<RebuildReport, VectorError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        state.ensure_serving()?;

        info!("Forced rebuild requested");
        state.lifecycle = IndexLifecycle::Rebuilding;

        let (store, report) = match rebuild::collect_store(self.dimension, source) {
            Ok(built) => built,
            Err(e) => {
                warn!(error = %e, "Forced rebuild failed, keeping current index");
                state.lifecycle = IndexLifecycle::Loaded;
                return Err(e);
            }
        };

        if let Err(e) = state.snapshot.save(&store) {
            return Err(self.abandon_rebuild(state, e));
        }

        state.store = Some(store);
        state.stats.record_rebuild(report.elapsed_ms);
        state.lifecycle = IndexLifecycle::Loaded;
        info!(
            unique = report.unique_ids,
            duplicates = report.duplicates,
            elapsed_ms = report.elapsed_ms,
            "Forced rebuild complete"
        );
        Ok(report)
    }

    /// Keep the old store after the rebuilt one failed to persist. If the
    /// new snapshot already replaced the old one on disk, write the old
    /// store back; if that fails the index stops serving.
    fn abandon_rebuild(&self, state: &mut IndexState, err: VectorError) -> VectorError {
        state.lifecycle = IndexLifecycle::Loaded;

        if let VectorError::Persistence { stage, .. } = &err {
            if stage.is_committed() {
                if let Some(old) = state.store.as_ref() {
                    if let Err(resave) = state.snapshot.save(old) {
                        error!(error = %err, resave_error = %resave, "Rebuild rollback failed");
                        state.lifecycle = IndexLifecycle::Failed;
                        return VectorError::RollbackFailed {
                            id: None,
                            reason: format!("{}; re-save failed: {}", err, resave),
                        };
                    }
                }
            }
        }

        warn!(error = %err, "Forced rebuild not persisted, keeping current index");
        err
    }
}
