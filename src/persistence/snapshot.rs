//! Snapshot: save/load a collection's records and configuration to/from disk.
//!
//! Layout of `snapshot.bin`: `[bincode(CollectionSnapshot)][crc32: u32 LE]`.
//! `manifest.json` carries a readable summary. Files are written to a temp
//! path and renamed into place.

use crate::collection::Collection;
use crate::error::{AnnError, Result};
use crate::persistence::serialization::{self, CollectionSnapshot, Manifest, SNAPSHOT_VERSION};
use std::fs;
use std::path::{Path, PathBuf};

const CRC_LEN: usize = 4;

/// Manages saving and loading collection snapshots in one directory.
pub struct SnapshotManager {
    dir: PathBuf,
}

impl SnapshotManager {
    /// Create a snapshot manager for the given directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.bin")
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Check if a snapshot exists.
    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }

    /// Write a snapshot and its manifest.
    pub fn save(&self, snapshot: &CollectionSnapshot) -> Result<()> {
        let mut data = serialization::to_bincode(snapshot)?;
        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        write_atomic(&self.snapshot_path(), &data)?;

        let manifest = Manifest {
            version: snapshot.version,
            name: snapshot.name.clone(),
            record_count: snapshot.records.len(),
            dimension: snapshot.config.dimension,
            metric: snapshot.config.metric.to_string(),
            centroids: snapshot.config.centroids,
            crc32: crc,
        };
        write_atomic(&self.manifest_path(), &serialization::to_json(&manifest)?)?;

        tracing::info!(
            collection = %snapshot.name,
            records = snapshot.records.len(),
            bytes = data.len(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Load the snapshot, or return None if none exists.
    ///
    /// Fails with `CorruptSnapshot` on a checksum mismatch, a truncated file or
    /// an unknown format version.
    pub fn load(&self) -> Result<Option<CollectionSnapshot>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read(&path)?;
        if raw.len() < CRC_LEN {
            return Err(AnnError::CorruptSnapshot(format!(
                "{} is truncated ({} bytes)",
                path.display(),
                raw.len()
            )));
        }
        let (payload, footer) = raw.split_at(raw.len() - CRC_LEN);
        let stored = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        let computed = crc32fast::hash(payload);
        if stored != computed {
            return Err(AnnError::CorruptSnapshot(format!(
                "checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored, computed
            )));
        }

        let snapshot: CollectionSnapshot = serialization::from_bincode(payload)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(AnnError::CorruptSnapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        tracing::info!(
            collection = %snapshot.name,
            records = snapshot.records.len(),
            "snapshot loaded"
        );
        Ok(Some(snapshot))
    }

    /// Persist the live records and configuration of `collection`.
    pub fn save_collection(&self, collection: &Collection) -> Result<()> {
        let records = collection
            .records()?
            .iter()
            .map(|record| record.as_ref().clone())
            .collect();
        self.save(&CollectionSnapshot {
            version: SNAPSHOT_VERSION,
            name: collection.name().to_string(),
            config: collection.config().clone(),
            records,
        })
    }

    /// Recreate a collection from the snapshot, building its index when it
    /// has records.
    pub fn load_collection(&self) -> Result<Option<Collection>> {
        let Some(snapshot) = self.load()? else {
            return Ok(None);
        };
        let collection = Collection::new(snapshot.name, snapshot.config)?;
        let has_records = !snapshot.records.is_empty();
        collection.bulk_load(snapshot.records)?;
        if has_records {
            collection.build()?;
        }
        Ok(Some(collection))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::distance::DistanceMetric;
    use crate::record::{Payload, Record};
    use crate::vector::Vector;
    use tempfile::TempDir;

    fn sample() -> CollectionSnapshot {
        CollectionSnapshot {
            version: SNAPSHOT_VERSION,
            name: "colors".to_string(),
            config: IndexConfig::new(3, DistanceMetric::EuclideanSquared, 2),
            records: vec![
                Record::new("c1", vec![0.0, 0.0, 0.0], Payload::named("black")),
                Record::new("c2", vec![255.0, 0.0, 0.0], Payload::named("red")),
            ],
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mgr = SnapshotManager::new(dir.path().join("db")).unwrap();

        mgr.save(&sample()).unwrap();
        assert!(mgr.exists());
        assert_eq!(mgr.load().unwrap().unwrap(), sample());

        let manifest: Manifest =
            serialization::from_json(&fs::read(dir.path().join("db/manifest.json")).unwrap())
                .unwrap();
        assert_eq!(manifest.record_count, 2);
        assert_eq!(manifest.metric, "euclidean_squared");
    }

    #[test]
    fn test_load_nonexistent() {
        let dir = TempDir::new().unwrap();
        let mgr = SnapshotManager::new(dir.path().join("empty")).unwrap();
        assert!(!mgr.exists());
        assert!(mgr.load().unwrap().is_none());
        assert!(mgr.load_collection().unwrap().is_none());
    }

    #[test]
    fn test_corruption_detected() {
        let dir = TempDir::new().unwrap();
        let mgr = SnapshotManager::new(dir.path()).unwrap();
        mgr.save(&sample()).unwrap();

        let path = dir.path().join("snapshot.bin");
        let mut bytes = fs::read(&path).unwrap();
        bytes[10] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(mgr.load(), Err(AnnError::CorruptSnapshot(_))));

        fs::write(&path, [1u8, 2]).unwrap();
        assert!(matches!(mgr.load(), Err(AnnError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_collection_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mgr = SnapshotManager::new(dir.path()).unwrap();

        let collection =
            Collection::new("colors", IndexConfig::new(3, DistanceMetric::EuclideanSquared, 2))
                .unwrap();
        collection
            .insert("c1", Vector::new(vec![0.0, 0.0, 0.0]), Payload::named("black"))
            .unwrap();
        collection
            .insert("c2", Vector::new(vec![255.0, 0.0, 0.0]), Payload::named("red"))
            .unwrap();
        mgr.save_collection(&collection).unwrap();

        let restored = mgr.load_collection().unwrap().unwrap();
        assert_eq!(restored.name(), "colors");
        assert_eq!(restored.ids().unwrap(), vec!["c1", "c2"]);
        let results = restored.search(&Vector::new(vec![250.0, 5.0, 5.0]), 1).unwrap();
        assert_eq!(results[0].payload.name(), Some("red"));
    }
}
