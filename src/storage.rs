//! In-memory record storage
//!
//! The store owns every record of a collection. It enforces the configured
//! dimension and id uniqueness; it does not index anything. Index builds take
//! a snapshot of [`VectorStore::all`] and never look at the store again, so a
//! removed record keeps showing up in search results until the next rebuild.

use crate::error::{AnnError, Result};
use crate::record::{Payload, Record};
use crate::vector::Vector;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory record storage with tombstoned removal.
#[derive(Debug)]
pub struct VectorStore {
    dimension: usize,
    /// Records in insertion order; `None` marks a tombstone.
    slots: Vec<Option<Arc<Record>>>,
    /// Record id -> slot position
    positions: HashMap<String, usize>,
    /// Bumped by every successful mutation
    version: u64,
}

impl VectorStore {
    /// Create an empty store for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(AnnError::invalid_config("dimension must be positive"));
        }
        Ok(Self {
            dimension,
            slots: Vec::new(),
            positions: HashMap::new(),
            version: 0,
        })
    }

    /// Insert a new record.
    ///
    /// Fails with `DuplicateId` if the id is already present; use
    /// [`VectorStore::upsert`] to overwrite.
    pub fn insert(&mut self, id: impl Into<String>, vector: Vector, payload: Payload) -> Result<()> {
        self.insert_record(Record::new(id, vector, payload))
    }

    /// Insert a fully formed record (see [`VectorStore::insert`]).
    pub fn insert_record(&mut self, record: Record) -> Result<()> {
        self.validate(&record)?;
        if self.positions.contains_key(&record.id) {
            return Err(AnnError::DuplicateId { id: record.id });
        }
        self.push(record);
        Ok(())
    }

    /// Insert or overwrite a record. Returns the replaced record, if any.
    ///
    /// An overwritten record keeps its position in iteration order.
    pub fn upsert(&mut self, record: Record) -> Result<Option<Arc<Record>>> {
        self.validate(&record)?;
        let existing = self.positions.get(&record.id).copied();
        let previous = match existing {
            Some(pos) => self.slots[pos].replace(Arc::new(record)),
            None => {
                self.push(record);
                None
            }
        };
        if previous.is_some() {
            self.version += 1;
        }
        Ok(previous)
    }

    /// Check that every record could be inserted, without inserting any.
    ///
    /// Ids must be new to the store and unique within the batch.
    pub fn validate_batch(&self, records: &[Record]) -> Result<()> {
        let mut seen = std::collections::HashSet::with_capacity(records.len());
        for record in records {
            self.validate(record)?;
            if self.positions.contains_key(&record.id) || !seen.insert(record.id.as_str()) {
                return Err(AnnError::DuplicateId {
                    id: record.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Get a record by id
    pub fn get(&self, id: &str) -> Result<Arc<Record>> {
        self.positions
            .get(id)
            .and_then(|&pos| self.slots[pos].clone())
            .ok_or_else(|| AnnError::NotFound { id: id.to_string() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Tombstone a record and return it.
    pub fn remove(&mut self, id: &str) -> Result<Arc<Record>> {
        let pos = self
            .positions
            .remove(id)
            .ok_or_else(|| AnnError::NotFound { id: id.to_string() })?;
        let record = self.slots[pos]
            .take()
            .ok_or_else(|| AnnError::NotFound { id: id.to_string() })?;
        self.version += 1;

        if self.tombstones() > self.positions.len() {
            self.compact();
        }
        Ok(record)
    }

    /// Iterate over live records in insertion order.
    ///
    /// Each call starts a fresh pass over the store.
    pub fn all(&self) -> impl Iterator<Item = &Arc<Record>> + '_ {
        self.slots.iter().flatten()
    }

    /// List all record ids in insertion order
    pub fn ids(&self) -> Vec<String> {
        self.all().map(|r| r.id.clone()).collect()
    }

    /// Get the number of live records
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Monotonic mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn tombstones(&self) -> usize {
        self.slots.len() - self.positions.len()
    }

    /// Drop tombstoned slots, keeping live records in order.
    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        self.positions.clear();
        for (pos, slot) in self.slots.iter().enumerate() {
            if let Some(record) = slot {
                self.positions.insert(record.id.clone(), pos);
            }
        }
    }

    fn validate(&self, record: &Record) -> Result<()> {
        record.vector.check_dimension(self.dimension)?;
        record.vector.check_finite()
    }

    fn push(&mut self, record: Record) {
        self.positions.insert(record.id.clone(), self.slots.len());
        self.slots.push(Some(Arc::new(record)));
        self.version += 1;
    }
}
