//! Index configuration

use crate::distance::DistanceMetric;
use crate::error::{AnnError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default iteration cap for k-means training.
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// Default seed for centroid initialization.
pub const DEFAULT_SEED: u64 = 0x5EED_1DF0;

/// Configuration of a collection's index. Fixed at creation time; changing
/// any of it means creating a new collection and rebuilding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Number of components in every vector.
    pub dimension: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Requested number of partitions (capped at the number of distinct vectors).
    pub centroids: usize,
    /// Partitions scanned per query (`P`). Defaults to `ceil(sqrt(centroids))`.
    #[serde(default)]
    pub probes: Option<usize>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl IndexConfig {
    pub fn new(dimension: usize, metric: DistanceMetric, centroids: usize) -> Self {
        Self {
            dimension,
            metric,
            centroids,
            probes: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_probes(mut self, probes: usize) -> Self {
        self.probes = Some(probes);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Effective number of partitions scanned per query.
    pub fn probes(&self) -> usize {
        self.probes
            .unwrap_or_else(|| (self.centroids as f64).sqrt().ceil() as usize)
            .max(1)
    }

    /// Reject non-positive dimension, centroid count, probe count or iteration cap.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(AnnError::invalid_config("dimension must be positive"));
        }
        if self.centroids == 0 {
            return Err(AnnError::invalid_config("centroid count must be positive"));
        }
        if self.probes == Some(0) {
            return Err(AnnError::invalid_config("probe count must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(AnnError::invalid_config("max_iterations must be positive"));
        }
        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config: IndexConfig =
            serde_json::from_slice(&bytes).map_err(|e| AnnError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_probes() {
        assert_eq!(IndexConfig::new(3, DistanceMetric::EuclideanSquared, 2).probes(), 2);
        assert_eq!(IndexConfig::new(300, DistanceMetric::Cosine, 8).probes(), 3);
        assert_eq!(IndexConfig::new(3, DistanceMetric::Cosine, 64).probes(), 8);
        assert_eq!(IndexConfig::new(3, DistanceMetric::Cosine, 64).with_probes(1).probes(), 1);
    }

    #[test]
    fn test_validate() {
        assert!(IndexConfig::new(3, DistanceMetric::EuclideanSquared, 2).validate().is_ok());
        for bad in [
            IndexConfig::new(0, DistanceMetric::EuclideanSquared, 2),
            IndexConfig::new(3, DistanceMetric::EuclideanSquared, 0),
            IndexConfig::new(3, DistanceMetric::EuclideanSquared, 2).with_probes(0),
            IndexConfig::new(3, DistanceMetric::EuclideanSquared, 2).with_max_iterations(0),
        ] {
            assert!(matches!(bad.validate(), Err(AnnError::InvalidConfiguration { .. })));
        }
    }

    #[test]
    fn test_json_defaults() {
        let config: IndexConfig =
            serde_json::from_str(r#"{"dimension": 300, "metric": "cosine", "centroids": 8}"#)
                .unwrap();
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert_eq!(config.probes, None);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.seed, DEFAULT_SEED);
    }

    #[test]
    fn test_from_json_file_validates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, r#"{"dimension": 0, "centroids": 2}"#).unwrap();
        assert!(matches!(
            IndexConfig::from_json_file(&path),
            Err(AnnError::InvalidConfiguration { .. })
        ));
    }
}
