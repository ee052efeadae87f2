//! Rebuild a vector store from the source-of-truth record store.
//!
//! The external store is read-only from here: it is enumerated once, a fresh
//! [`VectorStore`] is built beside whatever is currently serving, and the
//! result is persisted before anyone swaps it in.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use match_types::VectorRecord;

use crate::error::VectorError;
use crate::index::VectorIndex;
use crate::snapshot::SnapshotStore;
use crate::store::VectorStore;

/// Enumerate-all access to the authoritative `{id, vector}` records.
pub trait RecordSource: Send + Sync {
    fn enumerate(&self) -> Result<Vec<VectorRecord>, VectorError>;

    /// Whether an empty enumeration means the record store really is empty.
    ///
    /// Sources that stand in for a missing record store return `false`; they
    /// may seed a fresh index but must never replace existing data.
    fn is_authoritative(&self) -> bool {
        true
    }
}

impl RecordSource for Vec<VectorRecord> {
    fn enumerate(&self) -> Result<Vec<VectorRecord>, VectorError> {
        Ok(self.clone())
    }
}

impl RecordSource for [VectorRecord] {
    fn enumerate(&self) -> Result<Vec<VectorRecord>, VectorError> {
        Ok(self.to_vec())
    }
}

/// Placeholder for an unavailable record store. Rebuilding from it yields
/// an empty index, which is only accepted when there was no snapshot at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl RecordSource for EmptySource {
    fn enumerate(&self) -> Result<Vec<VectorRecord>, VectorError> {
        Ok(Vec::new())
    }

    fn is_authoritative(&self) -> bool {
        false
    }
}

/// Records exported as JSON lines: one `{"id": .., "vector": [..]}` per line.
#[derive(Debug, Clone)]
pub struct JsonlRecordSource {
    path: PathBuf,
}

impl JsonlRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for JsonlRecordSource {
    fn enumerate(&self) -> Result<Vec<VectorRecord>, VectorError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            VectorError::Rebuild(format!("cannot read records {:?}: {}", self.path, e))
        })?;

        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = VectorRecord::from_json_line(line).map_err(|e| {
                VectorError::Rebuild(format!("{:?} line {}: {}", self.path, lineno + 1, e))
            })?;
            records.push(record);
        }

        debug!(path = ?self.path, count = records.len(), "Read records");
        Ok(records)
    }
}

/// Outcome of a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Records returned by the source
    pub records_seen: u64,
    /// Distinct ids in the new store
    pub unique_ids: u64,
    /// Records that replaced an earlier record with the same id
    pub duplicates: u64,
    /// Time taken in milliseconds
    pub elapsed_ms: u64,
}

/// Build a fresh store from `records`, last record wins per id.
///
/// Any invalid record fails the whole build.
pub fn build_store(
    dimension: usize,
    records: &[VectorRecord],
) -> Result<(VectorStore, RebuildReport), VectorError> {
    let mut store = VectorStore::new(dimension);
    let mut report = RebuildReport::default();

    for record in records {
        report.records_seen += 1;
        let prior = store
            .upsert(record.id, &record.vector)
            .map_err(|e| VectorError::Rebuild(format!("record {}: {}", record.id, e)))?;
        if prior.is_some() {
            report.duplicates += 1;
        }
    }

    report.unique_ids = store.len() as u64;
    Ok((store, report))
}

/// Enumerate `source` and build a store, without persisting it.
pub fn collect_store<S: RecordSource + ?Sized>(
    dimension: usize,
    source: &S,
) -> Result<(VectorStore, RebuildReport), VectorError> {
    let start = Instant::now();
    let records = source.enumerate()?;
    info!(records = records.len(), "Rebuilding vector store from source");

    let (store, mut report) = build_store(dimension, &records)?;
    report.elapsed_ms = start.elapsed().as_millis() as u64;
    Ok((store, report))
}

/// Enumerate, build and persist. Used when there is no serving index yet.
pub fn rebuild<S: RecordSource + ?Sized>(
    dimension: usize,
    source: &S,
    snapshot: &SnapshotStore,
) -> Result<(VectorStore, RebuildReport), VectorError> {
    let start = Instant::now();
    let (store, mut report) = collect_store(dimension, source)?;
    snapshot.save(&store)?;
    report.elapsed_ms = start.elapsed().as_millis() as u64;

    info!(
        records = report.records_seen,
        unique = report.unique_ids,
        duplicates = report.duplicates,
        elapsed_ms = report.elapsed_ms,
        "Vector store rebuild complete"
    );
    Ok((store, report))
}
