//! Vector index error types.

use std::path::PathBuf;

use thiserror::Error;

/// Step of a snapshot write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStage {
    /// Writing or syncing the temp file
    Write,
    /// Renaming the temp file over the canonical snapshot
    Rename,
    /// Syncing the parent directory after the rename
    SyncDir,
}

impl PersistStage {
    /// True when the canonical snapshot already holds the new content.
    pub fn is_committed(&self) -> bool {
        matches!(self, PersistStage::SyncDir)
    }
}

impl std::fmt::Display for PersistStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistStage::Write => write!(f, "write"),
            PersistStage::Rename => write!(f, "rename"),
            PersistStage::SyncDir => write!(f, "sync-dir"),
        }
    }
}

/// Coarse error category, for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidVector,
    NotInitialized,
    CorruptSnapshot,
    Persistence,
    Rebuild,
    RollbackFailed,
    Lock,
}

/// Errors that can occur during vector index operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector cannot be normalized (zero norm or non-finite components)
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Index not initialized
    #[error("Index not initialized")]
    NotInitialized,

    /// Snapshot file exists but cannot be trusted
    #[error("Corrupt snapshot {path:?}: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    /// Snapshot write failed
    #[error("Persistence error during {stage} of {path:?}: {source}")]
    Persistence {
        stage: PersistStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source enumeration or reconstruction failed
    #[error("Rebuild error: {0}")]
    Rebuild(String),

    /// A failed write could not be undone; memory and disk may disagree
    #[error("Rollback failed for {}: {reason}", rollback_target(.id))]
    RollbackFailed { id: Option<i64>, reason: String },

    /// Index lock poisoned
    #[error("Lock error: {0}")]
    Lock(String),
}

fn rollback_target(id: &Option<i64>) -> String {
    match id {
        Some(id) => format!("id {}", id),
        None => "rebuild".to_string(),
    }
}

impl VectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VectorError::DimensionMismatch { .. } | VectorError::InvalidVector(_) => {
                ErrorKind::InvalidVector
            }
            VectorError::NotInitialized => ErrorKind::NotInitialized,
            VectorError::CorruptSnapshot { .. } => ErrorKind::CorruptSnapshot,
            VectorError::Persistence { .. } => ErrorKind::Persistence,
            VectorError::Rebuild(_) => ErrorKind::Rebuild,
            VectorError::RollbackFailed { .. } => ErrorKind::RollbackFailed,
            VectorError::Lock(_) => ErrorKind::Lock,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        VectorError::CorruptSnapshot {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(
        stage: PersistStage,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        VectorError::Persistence {
            stage,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VectorError::DimensionMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 4, got 3");

        let err = VectorError::RollbackFailed {
            id: Some(7),
            reason: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "Rollback failed for id 7: disk full");

        let err = VectorError::RollbackFailed {
            id: None,
            reason: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "Rollback failed for rebuild: disk full");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            VectorError::InvalidVector("zero norm".into()).kind(),
            ErrorKind::InvalidVector
        );
        assert_eq!(
            VectorError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
            .kind(),
            ErrorKind::InvalidVector
        );
        assert_eq!(VectorError::NotInitialized.kind(), ErrorKind::NotInitialized);
        assert_eq!(
            VectorError::corrupt("/tmp/x", "bad magic").kind(),
            ErrorKind::CorruptSnapshot
        );
        assert_eq!(
            VectorError::Rebuild("source offline".into()).kind(),
            ErrorKind::Rebuild
        );
    }

    #[test]
    fn test_persist_stage_committed() {
        assert!(!PersistStage::Write.is_committed());
        assert!(!PersistStage::Rename.is_committed());
        assert!(PersistStage::SyncDir.is_committed());

        let err = VectorError::persistence(
            PersistStage::Rename,
            "/tmp/vectors.index",
            std::io::Error::other("boom"),
        );
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.to_string().contains("rename"));
    }
}
