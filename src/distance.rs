//! Distance metrics for vector similarity

use crate::error::{AnnError, Result};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cosine distance reported when either operand has zero magnitude.
pub const MAX_COSINE_DISTANCE: f32 = 2.0;

/// Distance metrics for measuring vector similarity.
///
/// Smaller is always closer. The metric is fixed for the lifetime of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance (no square root, same ordering as L2)
    #[default]
    EuclideanSquared,
    /// Euclidean (L2) distance
    Euclidean,
    /// Cosine distance: 1 - cosine similarity
    Cosine,
}

impl DistanceMetric {
    /// Compute the distance between two vectors using this metric
    pub fn distance(&self, v1: &Vector, v2: &Vector) -> Result<f32> {
        if !v1.has_same_dimension(v2) {
            return Err(AnnError::DimensionMismatch {
                expected: v1.dimension(),
                actual: v2.dimension(),
            });
        }
        Ok(self.distance_slices(v1.as_slice(), v2.as_slice()))
    }

    /// Distance between two slices of equal length.
    ///
    /// Callers must have checked the lengths; extra components of the longer
    /// slice are ignored.
    #[inline]
    pub fn distance_slices(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::EuclideanSquared => squared_euclidean(a, b),
            DistanceMetric::Euclidean => sum_squared_diff(a, b).sqrt() as f32,
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::EuclideanSquared => "euclidean_squared",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = AnnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean_squared" | "l2_squared" | "l2sq" => Ok(DistanceMetric::EuclideanSquared),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "cosine" => Ok(DistanceMetric::Cosine),
            other => Err(AnnError::invalid_config(format!("unknown metric '{}'", other))),
        }
    }
}

/// Squared Euclidean distance between two slices
///
/// Accumulates in f64; a sum beyond `f32::MAX` saturates to infinity.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    sum_squared_diff(a, b) as f32
}

fn sum_squared_diff(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum()
}

/// Cosine distance between two slices (1 - cosine similarity).
///
/// Zero-magnitude operands yield [`MAX_COSINE_DISTANCE`] instead of dividing by zero.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return MAX_COSINE_DISTANCE;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    // Clamp to [-1, 1] to handle floating point errors
    (1.0 - similarity.clamp(-1.0, 1.0)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_squared_euclidean() {
        let d = squared_euclidean(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert_relative_eq!(d, 27.0, epsilon = 1e-6);
    }

    #[test]
    fn test_euclidean_metric() {
        let v1 = Vector::new(vec![1.0, 2.0, 3.0]);
        let v2 = Vector::new(vec![4.0, 5.0, 6.0]);
        let dist = DistanceMetric::Euclidean.distance(&v1, &v2).unwrap();
        assert_relative_eq!(dist, 5.196152, epsilon = 1e-5);
    }

    #[test]
    fn test_euclidean_same_vector() {
        let v = Vector::new(vec![1.0, 2.0, 3.0]);
        let dist = DistanceMetric::EuclideanSquared.distance(&v, &v).unwrap();
        assert_relative_eq!(dist, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_identical_orthogonal_opposite() {
        assert_relative_eq!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]), 0.0, epsilon = 1e-6);
        assert_relative_eq!(cosine_distance(&[1.0, 0.0], &[0.0, 1.0]), 1.0, epsilon = 1e-6);
        assert_relative_eq!(cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_maximal() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 1.0]), MAX_COSINE_DISTANCE);
        assert_eq!(cosine_distance(&[1.0, 1.0], &[0.0, 0.0]), MAX_COSINE_DISTANCE);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[0.0, 0.0]), MAX_COSINE_DISTANCE);
    }

    #[test]
    fn test_large_components_stay_finite() {
        let big = [1e20f32, 1e20, 1e20];
        let flipped = [1e20f32, 1e20, -1e20];
        let origin = [0.0f32, 0.0, 0.0];

        for metric in [
            DistanceMetric::EuclideanSquared,
            DistanceMetric::Euclidean,
            DistanceMetric::Cosine,
        ] {
            let d = metric.distance_slices(&big, &big);
            assert_relative_eq!(d, 0.0, epsilon = 1e-6);
        }
        assert_relative_eq!(cosine_distance(&big, &flipped), 2.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(
            DistanceMetric::Euclidean.distance_slices(&[1e20, 0.0, 0.0], &origin),
            1e20,
            max_relative = 1e-6
        );
        // Beyond f32 range the squared distance saturates instead of turning NaN.
        assert_eq!(squared_euclidean(&big, &origin), f32::INFINITY);
    }

    #[test]
    fn test_dimension_mismatch() {
        let v1 = Vector::new(vec![1.0, 2.0]);
        let v2 = Vector::new(vec![1.0, 2.0, 3.0]);
        for metric in [
            DistanceMetric::EuclideanSquared,
            DistanceMetric::Euclidean,
            DistanceMetric::Cosine,
        ] {
            assert!(matches!(
                metric.distance(&v1, &v2),
                Err(AnnError::DimensionMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert_eq!("Cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!(
            DistanceMetric::EuclideanSquared.to_string().parse::<DistanceMetric>().unwrap(),
            DistanceMetric::EuclideanSquared
        );
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }
}
