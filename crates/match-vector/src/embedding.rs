//! Unit-normalized embeddings.

use crate::error::VectorError;

/// Vector embedding - a float array normalized to unit length.
///
/// Because every stored embedding has norm 1, the inner product of two
/// embeddings is their cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// Normalize `values` to unit length.
    ///
    /// Fails on an empty or zero vector and on NaN/infinite components.
    pub fn normalized(mut values: Vec<f32>) -> Result<Self, VectorError> {
        if values.iter().any(|x| !x.is_finite()) {
            return Err(VectorError::InvalidVector(
                "vector has non-finite components".to_string(),
            ));
        }

        let norm = l2_norm(&values);
        if norm == 0.0 || !norm.is_finite() {
            return Err(VectorError::InvalidVector(format!(
                "cannot normalize vector with norm {}",
                norm
            )));
        }

        for x in values.iter_mut() {
            *x /= norm;
        }
        Ok(Self { values })
    }

    /// Wrap values that are already unit length (snapshot load path).
    pub(crate) fn from_normalized(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Inner product; equals cosine similarity for two unit vectors.
    pub fn dot(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// L2 norm, accumulated in f64 so long vectors don't lose precision.
pub fn l2_norm(values: &[f32]) -> f32 {
    values
        .iter()
        .map(|&x| (x as f64) * (x as f64))
        .sum::<f64>()
        .sqrt() as f32
}
