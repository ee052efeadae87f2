//! # match-vector
//!
//! Persistent, concurrent vector index with exact cosine-similarity search.
//!
//! Vectors are keyed by `i64` ids, normalized to unit length on the way in,
//! and ranked by inner product. Every mutation is written to an atomic
//! snapshot before it is acknowledged; when the snapshot is missing or
//! corrupt the index is rebuilt from an external source-of-truth store.
//!
//! ## Components
//! - [`VectorStore`]: in-memory id -> unit vector map, exact top-k search
//! - [`SnapshotStore`]: temp-file + rename snapshot writes, checked loads
//! - [`rebuild`]: reconstruct a store from a [`RecordSource`]
//! - [`SharedIndex`]: single-lock guard, lifecycle state machine, stats
//!
//! ## Usage
//!
//! ```no_run
//! use match_vector::{EmptySource, SharedIndex, SnapshotStore};
//!
//! # fn main() -> Result<(), match_vector::VectorError> {
//! let snapshot = SnapshotStore::open("/var/lib/match/vectors.index")?;
//! let index = SharedIndex::new(4, snapshot);
//! index.load_or_rebuild(&EmptySource)?;
//!
//! index.upsert(1, &[1.0, 0.0, 0.0, 0.0])?;
//! let hits = index.search(&[0.9, 0.1, 0.0, 0.0], 5)?;
//! assert_eq!(hits[0].id, 1);
//! # Ok(())
//! # }
//! ```

pub mod embedding;
pub mod error;
pub mod index;
pub mod rebuild;
pub mod shared;
pub mod snapshot;
pub mod stats;
pub mod store;

pub use embedding::Embedding;
pub use error::{ErrorKind, PersistStage, VectorError};
pub use index::{SearchResult, VectorIndex};
pub use rebuild::{EmptySource, JsonlRecordSource, RebuildReport, RecordSource};
pub use shared::{RebuildReason, SharedIndex, StartupOutcome};
pub use snapshot::{SnapshotHeader, SnapshotStore};
pub use stats::{IndexLifecycle, IndexStats, StatsCollector};
pub use store::VectorStore;
