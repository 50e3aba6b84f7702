//! Face embedding vectors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dimension produced by the face embedding model
pub const EMBEDDING_DIM: usize = 512;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbeddingError {
    #[error("Embedding must have {EMBEDDING_DIM} dimensions, got {0}")]
    WrongDimension(usize),

    #[error("Embedding contains a non-finite value at index {0}")]
    NonFinite(usize),
}

/// Validated 512-dimension face vector
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Result<Self, EmbeddingError> {
        if values.len() != EMBEDDING_DIM {
            return Err(EmbeddingError::WrongDimension(values.len()));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite(i));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = EmbeddingError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl<'de> Deserialize<'de> for Embedding {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let values = Vec::<f32>::deserialize(deserializer)?;
        Embedding::new(values).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_enforced() {
        assert!(Embedding::new(vec![0.1; EMBEDDING_DIM]).is_ok());
        assert_eq!(
            Embedding::new(vec![0.1; 128]),
            Err(EmbeddingError::WrongDimension(128))
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut values = vec![0.0; EMBEDDING_DIM];
        values[7] = f32::NAN;
        assert_eq!(Embedding::new(values), Err(EmbeddingError::NonFinite(7)));
    }

    #[test]
    fn test_deserialize_validates() {
        let json = serde_json::to_string(&vec![1.0f32; EMBEDDING_DIM]).unwrap();
        let e: Embedding = serde_json::from_str(&json).unwrap();
        assert_eq!(e.as_slice().len(), EMBEDDING_DIM);
        assert!(serde_json::from_str::<Embedding>("[1.0, 2.0]").is_err());
    }
}
