//! Serialization utilities: bincode for snapshots, JSON for the manifest.

use crate::config::IndexConfig;
use crate::error::{AnnError, Result};
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable representation of a collection: its configuration and live records.
///
/// The index itself is not stored; it is rebuilt after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub version: u32,
    pub name: String,
    pub config: IndexConfig,
    pub records: Vec<Record>,
}

/// Human-readable summary written next to the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub name: String,
    pub record_count: usize,
    pub dimension: usize,
    pub metric: String,
    pub centroids: usize,
    pub crc32: u32,
}

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| AnnError::Serialization(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| AnnError::Serialization(e.to_string()))
}

/// Encode data to pretty JSON bytes.
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| AnnError::Serialization(e.to_string()))
}

/// Decode data from JSON bytes.
pub fn from_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| AnnError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use crate::record::Payload;

    #[test]
    fn test_snapshot_bincode() {
        let snapshot = CollectionSnapshot {
            version: SNAPSHOT_VERSION,
            name: "colors".to_string(),
            config: IndexConfig::new(3, DistanceMetric::EuclideanSquared, 2).with_probes(1),
            records: vec![Record::new("c1", vec![255.0, 0.0, 0.0], Payload::named("red"))],
        };
        let bytes = to_bincode(&snapshot).unwrap();
        let decoded: CollectionSnapshot = from_bincode(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_garbage_is_a_serialization_error() {
        let result: Result<CollectionSnapshot> = from_bincode(&[0xFF, 0x00, 0x13]);
        assert!(matches!(result, Err(AnnError::Serialization(_))));
    }

    #[test]
    fn test_manifest_json() {
        let manifest = Manifest {
            version: SNAPSHOT_VERSION,
            name: "words".to_string(),
            record_count: 10,
            dimension: 300,
            metric: "cosine".to_string(),
            centroids: 8,
            crc32: 0xDEAD_BEEF,
        };
        let bytes = to_json(&manifest).unwrap();
        let decoded: Manifest = from_json(&bytes).unwrap();
        assert_eq!(decoded, manifest);
    }
}
