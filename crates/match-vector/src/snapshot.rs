//! Atomic on-disk snapshots of a [`VectorStore`].
//!
//! Binary format (all little-endian):
//! ```text
//! ┌────────┬─────────┬──────────┬───────────┬─────────┬────────────┬────────┐
//! │ Magic  │ Version │ Reserved │ Dimension │ Count   │ Created at │ CRC32  │
//! │ 4 bytes│ 2 bytes │ 2 bytes  │ 4 bytes   │ 8 bytes │ 8 bytes    │ 4 bytes│
//! └────────┴─────────┴──────────┴───────────┴─────────┴────────────┴────────┘
//! followed by Count records of: id (i64) | Dimension × f32
//! ```
//!
//! The CRC covers the header bytes before it and every record byte after it.
//! Writes go to `<path>.tmp`, are synced, then renamed over `<path>`, so a
//! reader only ever sees the previous or the next complete snapshot.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::embedding::Embedding;
use crate::error::{PersistStage, VectorError};
use crate::index::VectorIndex;
use crate::store::VectorStore;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"MIDX";
pub const SNAPSHOT_VERSION: u16 = 1;
pub const SNAPSHOT_HEADER_SIZE: usize = 32;

const CRC_OFFSET: usize = 28;

/// Decoded snapshot header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u16,
    pub dimension: u32,
    pub count: u64,
    /// Milliseconds since epoch at encode time
    pub created_at_ms: i64,
}

impl SnapshotHeader {
    /// Bytes per record, `None` if it does not fit in `usize`.
    fn record_size(&self) -> Option<usize> {
        (self.dimension as usize).checked_mul(4)?.checked_add(8)
    }
}

/// Serialize a store. Records are written in ascending id order.
pub fn encode(store: &VectorStore, created_at_ms: i64) -> Vec<u8> {
    let dimension = store.dimension();
    let mut buf = Vec::with_capacity(SNAPSHOT_HEADER_SIZE + store.len() * (8 + dimension * 4));

    buf.extend_from_slice(&SNAPSHOT_MAGIC);
    buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&(dimension as u32).to_le_bytes());
    buf.extend_from_slice(&(store.len() as u64).to_le_bytes());
    buf.extend_from_slice(&created_at_ms.to_le_bytes());
    // CRC placeholder, filled below
    buf.extend_from_slice(&[0u8; 4]);

    for id in store.ids() {
        if let Some(embedding) = store.get(id) {
            buf.extend_from_slice(&id.to_le_bytes());
            for value in embedding.values() {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }
    }

    let crc = checksum(&buf);
    buf[CRC_OFFSET..SNAPSHOT_HEADER_SIZE].copy_from_slice(&crc.to_le_bytes());
    buf
}

/// Parse and verify a snapshot. `path` is only used in error messages.
pub fn decode(data: &[u8], path: &Path) -> Result<(VectorStore, SnapshotHeader), VectorError> {
    let corrupt = |reason: String| VectorError::corrupt(path, reason);

    if data.len() < SNAPSHOT_HEADER_SIZE {
        return Err(corrupt(format!(
            "file too small for header: {} bytes",
            data.len()
        )));
    }
    if data[0..4] != SNAPSHOT_MAGIC {
        return Err(corrupt(format!("bad magic {:?}", &data[0..4])));
    }

    let header = SnapshotHeader {
        version: read_u16(data, 4),
        dimension: read_u32(data, 8),
        count: read_u64(data, 12),
        created_at_ms: read_u64(data, 20) as i64,
    };

    if header.version != SNAPSHOT_VERSION {
        return Err(corrupt(format!(
            "unsupported version {} (expected {})",
            header.version, SNAPSHOT_VERSION
        )));
    }
    if header.dimension == 0 {
        return Err(corrupt("dimension is zero".to_string()));
    }

    let record_size = header
        .record_size()
        .ok_or_else(|| corrupt(format!("dimension {} overflows", header.dimension)))?;
    let expected_len = usize::try_from(header.count)
        .ok()
        .and_then(|count| count.checked_mul(record_size))
        .and_then(|body| body.checked_add(SNAPSHOT_HEADER_SIZE))
        .ok_or_else(|| corrupt(format!("record count {} overflows", header.count)))?;
    if data.len() != expected_len {
        return Err(corrupt(format!(
            "length {} does not match {} records of dimension {} ({} bytes expected)",
            data.len(),
            header.count,
            header.dimension,
            expected_len
        )));
    }

    let stored_crc = read_u32(data, CRC_OFFSET);
    let computed_crc = checksum(data);
    if stored_crc != computed_crc {
        return Err(corrupt(format!(
            "CRC mismatch: stored={:#010x}, computed={:#010x}",
            stored_crc, computed_crc
        )));
    }

    let dimension = header.dimension as usize;
    let mut store = VectorStore::new(dimension);
    let mut seen = HashSet::with_capacity(header.count as usize);

    for record in data[SNAPSHOT_HEADER_SIZE..].chunks_exact(record_size) {
        let id = read_u64(record, 0) as i64;
        if !seen.insert(id) {
            return Err(corrupt(format!("duplicate id {}", id)));
        }

        let values: Vec<f32> = record[8..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(corrupt(format!("non-finite component in id {}", id)));
        }

        store
            .insert_normalized(id, Embedding::from_normalized(values))
            .map_err(|e| corrupt(e.to_string()))?;
    }

    Ok((store, header))
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&data[..CRC_OFFSET]);
    hasher.update(&data[SNAPSHOT_HEADER_SIZE..]);
    hasher.finalize()
}

// Callers have already bounds-checked `data`.
fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
type FaultPlan = std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<Option<PersistStage>>>>;

/// Reads and atomically writes the snapshot file for one index.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    fsync: bool,
    /// Per-save failure plan shared by clones; `None` entries succeed.
    #[cfg(test)]
    faults: FaultPlan,
}

impl SnapshotStore {
    /// Open the snapshot location, creating its parent directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, VectorError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| VectorError::persistence(PersistStage::Write, parent, e))?;
        }
        debug!(path = ?path, "Opened snapshot store");
        Ok(Self {
            path,
            fsync: true,
            #[cfg(test)]
            faults: Default::default(),
        })
    }

    /// Toggle fsync of the temp file and parent directory.
    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<path>.tmp`, the staging file for the next save.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Size of the canonical snapshot, 0 if absent.
    pub fn size_bytes(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Write `store` to the temp file, sync it, and rename it into place.
    pub fn save(&self, store: &VectorStore) -> Result<(), VectorError> {
        let bytes = encode(store, Utc::now().timestamp_millis());
        let temp = self.temp_path();
        let fault = self.next_fault();

        let written = fail_at(fault, PersistStage::Write)
            .and_then(|_| self.write_temp(&temp, &bytes));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(VectorError::persistence(PersistStage::Write, &temp, e));
        }

        let renamed = fail_at(fault, PersistStage::Rename)
            .and_then(|_| fs::rename(&temp, &self.path));
        if let Err(e) = renamed {
            let _ = fs::remove_file(&temp);
            return Err(VectorError::persistence(PersistStage::Rename, &self.path, e));
        }

        let synced = if self.fsync {
            sync_parent_dir(&self.path)
        } else {
            Ok(())
        };
        synced
            .and_then(|_| fail_at(fault, PersistStage::SyncDir))
            .map_err(|e| VectorError::persistence(PersistStage::SyncDir, &self.path, e))?;

        info!(path = ?self.path, vectors = store.len(), bytes = bytes.len(), "Saved snapshot");
        Ok(())
    }

    /// Queue outcomes for the next saves, one entry per save.
    #[cfg(test)]
    pub(crate) fn plan_faults(&self, plan: impl IntoIterator<Item = Option<PersistStage>>) {
        self.faults.lock().unwrap().extend(plan);
    }

    #[cfg(test)]
    fn next_fault(&self) -> Option<PersistStage> {
        self.faults.lock().unwrap().pop_front().flatten()
    }

    #[cfg(not(test))]
    fn next_fault(&self) -> Option<PersistStage> {
        None
    }

    fn write_temp(&self, temp: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = File::create(temp)?;
        file.write_all(bytes)?;
        if self.fsync {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Load the canonical snapshot.
    ///
    /// Returns `Ok(None)` when no snapshot exists. Any unreadable or
    /// malformed content is [`VectorError::CorruptSnapshot`]. A leftover
    /// temp file from an interrupted save is ignored.
    pub fn load(&self) -> Result<Option<VectorStore>, VectorError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "No snapshot on disk");
                return Ok(None);
            }
            Err(e) => {
                return Err(VectorError::corrupt(
                    &self.path,
                    format!("unreadable: {}", e),
                ))
            }
        };

        if self.temp_path().exists() {
            warn!(path = ?self.temp_path(), "Ignoring leftover temp snapshot");
        }

        let (store, header) = decode(&data, &self.path)?;
        info!(
            path = ?self.path,
            vectors = store.len(),
            dimension = header.dimension,
            created_at_ms = header.created_at_ms,
            "Loaded snapshot"
        );
        Ok(Some(store))
    }
}

fn fail_at(fault: Option<PersistStage>, stage: PersistStage) -> io::Result<()> {
    if fault == Some(stage) {
        return Err(io::Error::other(format!("planned {} failure", stage)));
    }
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
