//! Vector type and operations

use crate::error::{AnnError, Result};
use serde::{Deserialize, Serialize};

/// A fixed-length embedding in n-dimensional space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Check if this vector has the same dimension as another
    pub fn has_same_dimension(&self, other: &Vector) -> bool {
        self.dimension() == other.dimension()
    }

    /// Fail with `DimensionMismatch` unless the vector has exactly `expected` components.
    ///
    /// Vectors are never truncated or padded to fit.
    pub fn check_dimension(&self, expected: usize) -> Result<()> {
        if self.dimension() != expected {
            return Err(AnnError::DimensionMismatch {
                expected,
                actual: self.dimension(),
            });
        }
        Ok(())
    }

    /// Reject NaN and infinite components.
    pub fn check_finite(&self) -> Result<()> {
        match self.data.iter().position(|x| !x.is_finite()) {
            Some(pos) => Err(AnnError::InvalidVector {
                reason: format!("component {} is not finite ({})", pos, self.data[pos]),
            }),
            None => Ok(()),
        }
    }

    /// Parse a vector from a comma-separated string
    pub fn from_str(s: &str) -> Result<Self> {
        let data: Result<Vec<f32>> = s
            .split(',')
            .map(|x| {
                x.trim()
                    .parse::<f32>()
                    .map_err(|_| AnnError::InvalidVector {
                        reason: format!("Invalid float: {}", x),
                    })
            })
            .collect();
        Ok(Vector::new(data?))
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::new(data)
    }
}

impl From<&[f32]> for Vector {
    fn from(data: &[f32]) -> Self {
        Vector::new(data.to_vec())
    }
}
