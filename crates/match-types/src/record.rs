//! Records exchanged with the source-of-truth store.

use serde::{Deserialize, Serialize};

/// An entity's id and its pre-computed embedding.
///
/// The vector is stored as produced by the embedding model; normalization
/// happens when it enters an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: i64,
    pub vector: Vec<f32>,
}

impl VectorRecord {
    pub fn new(id: i64, vector: Vec<f32>) -> Self {
        Self { id, vector }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Parse a single JSON line.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = VectorRecord::new(42, vec![1.0, 0.5]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":42,"vector":[1.0,0.5]}"#);
    }

    #[test]
    fn test_from_json_line() {
        let record = VectorRecord::from_json_line(r#"{"id":-3,"vector":[0.0,2.0,1.0]}"#).unwrap();
        assert_eq!(record.id, -3);
        assert_eq!(record.dimension(), 3);
    }

    #[test]
    fn test_from_json_line_rejects_missing_vector() {
        assert!(VectorRecord::from_json_line(r#"{"id":1}"#).is_err());
    }
}
