//! Embedding sources: turn raw text into query vectors.
//!
//! The engine never computes embeddings itself; callers plug a model in
//! through [`Embedder`].

use std::collections::HashMap;

use crate::error::Result;
use crate::record::Record;
use crate::vector::Vector;

/// Maps text to a fixed-dimension vector.
pub trait Embedder: Send + Sync {
    /// Number of components of every produced vector.
    fn dimension(&self) -> usize;

    /// Embed `input`, or `None` when the model has no vector for it.
    fn embed(&self, input: &str) -> Option<Vector>;
}

/// A word-vector lookup table. Lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct StaticEmbeddings {
    dimension: usize,
    table: HashMap<String, Vector>,
}

impl StaticEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            table: HashMap::new(),
        }
    }

    /// Add or replace the vector for `word`.
    pub fn insert(&mut self, word: &str, vector: Vector) -> Result<()> {
        vector.check_dimension(self.dimension)?;
        vector.check_finite()?;
        self.table.insert(word.to_lowercase(), vector);
        Ok(())
    }

    /// Build a table from records, keyed by their payload name (or id).
    pub fn from_records<'a>(
        dimension: usize,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> Result<Self> {
        let mut table = Self::new(dimension);
        for record in records {
            let word = record.payload.name().unwrap_or(&record.id);
            table.insert(word, record.vector.clone())?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Embedder for StaticEmbeddings {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, input: &str) -> Option<Vector> {
        self.table.get(&input.trim().to_lowercase()).cloned()
    }
}
