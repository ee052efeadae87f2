//! Index statistics.
//!
//! Counters live inside the index state and are only touched while the
//! index lock is held, so plain integers are enough.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a [`SharedIndex`](crate::SharedIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexLifecycle {
    /// Constructed, no snapshot loaded yet
    Uninitialized,
    /// Building a fresh store from the record source
    Rebuilding,
    /// Serving requests
    Loaded,
    /// Startup rebuild failed; refusing to serve
    Failed,
}

impl std::fmt::Display for IndexLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexLifecycle::Uninitialized => write!(f, "uninitialized"),
            IndexLifecycle::Rebuilding => write!(f, "rebuilding"),
            IndexLifecycle::Loaded => write!(f, "loaded"),
            IndexLifecycle::Failed => write!(f, "failed"),
        }
    }
}

/// Point-in-time view of the index, as returned by `stats()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of vectors in the index
    pub size: usize,
    /// Embedding dimension
    pub dimension: usize,
    /// Snapshot file size in bytes
    pub snapshot_bytes: u64,
    pub lifecycle: IndexLifecycle,
    /// When the index was last rebuilt from the record source
    pub last_rebuild: Option<DateTime<Utc>>,
    /// Duration of that rebuild
    pub last_rebuild_ms: Option<u64>,
    pub add_failures: u64,
    pub remove_failures: u64,
    pub search_count: u64,
}

/// Process-lifetime counters.
#[derive(Debug, Clone, Default)]
pub struct StatsCollector {
    last_rebuild: Option<DateTime<Utc>>,
    last_rebuild_ms: Option<u64>,
    add_failures: u64,
    remove_failures: u64,
    search_count: u64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rebuild(&mut self, elapsed_ms: u64) {
        self.last_rebuild = Some(Utc::now());
        self.last_rebuild_ms = Some(elapsed_ms);
    }

    pub fn record_add_failure(&mut self) {
        self.add_failures += 1;
    }

    pub fn record_remove_failure(&mut self) {
        self.remove_failures += 1;
    }

    pub fn record_search(&mut self) {
        self.search_count += 1;
    }

    /// Combine the counters with the derived fields.
    pub fn snapshot(
        &self,
        size: usize,
        dimension: usize,
        snapshot_bytes: u64,
        lifecycle: IndexLifecycle,
    ) -> IndexStats {
        IndexStats {
            size,
            dimension,
            snapshot_bytes,
            lifecycle,
            last_rebuild: self.last_rebuild,
            last_rebuild_ms: self.last_rebuild_ms,
            add_failures: self.add_failures,
            remove_failures: self.remove_failures,
            search_count: self.search_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = StatsCollector::new();
        stats.record_add_failure();
        stats.record_add_failure();
        stats.record_remove_failure();
        stats.record_search();

        let view = stats.snapshot(3, 4, 100, IndexLifecycle::Loaded);
        assert_eq!(view.size, 3);
        assert_eq!(view.dimension, 4);
        assert_eq!(view.add_failures, 2);
        assert_eq!(view.remove_failures, 1);
        assert_eq!(view.search_count, 1);
        assert!(view.last_rebuild.is_none());
    }

    #[test]
    fn test_record_rebuild() {
        let mut stats = StatsCollector::new();
        let before = Utc::now();
        stats.record_rebuild(12);

        let view = stats.snapshot(0, 4, 0, IndexLifecycle::Loaded);
        assert!(view.last_rebuild.unwrap() >= before);
        assert_eq!(view.last_rebuild_ms, Some(12));
    }

    #[test]
    fn test_stats_json() {
        let view = StatsCollector::new().snapshot(1, 2, 3, IndexLifecycle::Rebuilding);
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"lifecycle\":\"rebuilding\""));
        assert!(json.contains("\"last_rebuild\":null"));

        let decoded: IndexStats = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, view);
    }

    #[test]
    fn test_lifecycle_display() {
        assert_eq!(IndexLifecycle::Uninitialized.to_string(), "uninitialized");
        assert_eq!(IndexLifecycle::Failed.to_string(), "failed");
    }
}
