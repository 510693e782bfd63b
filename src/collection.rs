//! Collection: a record store plus the lifecycle of its partitioned index.
//!
//! Readers load the active [`IvfIndex`] generation from an `ArcSwap` slot and
//! search it without taking any lock. A build snapshots the store, trains a
//! new generation off to the side and publishes it with a single pointer
//! swap; queries already running keep the generation they loaded.
//!
//! Policies:
//! - `insert` rejects existing ids (`DuplicateId`); `upsert` overwrites.
//! - `remove` tombstones the record in the store only. The active generation
//!   keeps returning it until the next build.
//! - Building an empty store fails with `EmptyIndex`; searching before the
//!   first successful build fails with `IndexNotBuilt`.
//! - A build requested while another is running fails with
//!   `BuildInProgress` rather than queueing.
//! - A failed or cancelled build leaves the previous generation active.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use crate::config::IndexConfig;
use crate::distance::DistanceMetric;
use crate::embedding::Embedder;
use crate::error::{AnnError, Result};
use crate::flat_index::exact_top_k;
use crate::index::{validate_query, Index, SearchResult};
use crate::ivf::IvfIndex;
use crate::kmeans::CancelToken;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::record::{Payload, Record};
use crate::storage::VectorStore;
use crate::vector::Vector;

/// Lifecycle state of a collection's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// No generation has been published yet.
    Uninitialized,
    /// A build is running. Searches use the previous generation, if any.
    Building,
    /// A generation is active and no build is running.
    Ready,
    /// Terminal.
    Closed,
}

/// Summary of a collection and its active generation.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub state: IndexState,
    pub generation: Option<u64>,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub probes: usize,
    pub partitions: usize,
    pub indexed_records: usize,
    pub stored_records: usize,
    /// Store mutations since the active generation was snapshotted.
    pub pending_changes: u64,
    pub smallest_partition: usize,
    pub largest_partition: usize,
    pub training_iterations: usize,
}

/// An explicitly owned vector collection with an approximate index.
///
/// All operations take `&self`; share a collection across threads with `Arc`.
#[derive(Debug)]
pub struct Collection {
    name: String,
    config: IndexConfig,
    store: RwLock<VectorStore>,
    active: ArcSwapOption<IvfIndex>,
    /// Held for the whole duration of a build.
    build_lock: Mutex<()>,
    /// Serializes publishing a generation against `close`.
    publish_lock: Mutex<()>,
    running_build: Mutex<Option<CancelToken>>,
    last_generation: AtomicU64,
    /// Store version captured by the active generation's snapshot.
    indexed_version: AtomicU64,
    closed: AtomicBool,
    metrics: MetricsCollector,
}

impl Collection {
    /// Create an empty collection. Fails with `InvalidConfiguration` on a bad config.
    pub fn new(name: impl Into<String>, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let store = VectorStore::new(config.dimension)?;
        Ok(Self {
            name: name.into(),
            config,
            store: RwLock::new(store),
            active: ArcSwapOption::empty(),
            build_lock: Mutex::new(()),
            publish_lock: Mutex::new(()),
            running_build: Mutex::new(None),
            last_generation: AtomicU64::new(0),
            indexed_version: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            metrics: MetricsCollector::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    // --- Store maintenance ---

    /// Insert a new record. Fails with `DuplicateId` if `id` exists.
    pub fn insert(&self, id: impl Into<String>, vector: Vector, payload: Payload) -> Result<()> {
        self.insert_record(Record::new(id, vector, payload))
    }

    pub fn insert_record(&self, record: Record) -> Result<()> {
        self.ensure_open()?;
        self.store.write().insert_record(record)?;
        self.metrics.record_inserts(1);
        Ok(())
    }

    /// Insert or overwrite a record; returns the replaced one.
    pub fn upsert(&self, record: Record) -> Result<Option<Arc<Record>>> {
        self.ensure_open()?;
        let previous = self.store.write().upsert(record)?;
        self.metrics.record_inserts(1);
        Ok(previous)
    }

    /// Insert a batch of records, all or nothing.
    ///
    /// Every record is validated (dimension, finiteness, id uniqueness against
    /// the store and within the batch) before any is inserted.
    pub fn bulk_load(&self, records: impl IntoIterator<Item = Record>) -> Result<usize> {
        self.ensure_open()?;
        let records: Vec<Record> = records.into_iter().collect();
        let count = records.len();
        {
            let mut store = self.store.write();
            store.validate_batch(&records)?;
            for record in records {
                store.insert_record(record)?;
            }
        }
        self.metrics.record_inserts(count);
        Ok(count)
    }

    /// Remove a record from the store. The active index may keep returning
    /// it until the next build.
    pub fn remove(&self, id: &str) -> Result<Arc<Record>> {
        self.ensure_open()?;
        let record = self.store.write().remove(id)?;
        self.metrics.record_remove();
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<Arc<Record>> {
        self.ensure_open()?;
        self.store.read().get(id)
    }

    /// Live records in insertion order.
    pub fn records(&self) -> Result<Vec<Arc<Record>>> {
        self.ensure_open()?;
        Ok(self.store.read().all().cloned().collect())
    }

    pub fn ids(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.store.read().ids())
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    // --- Index lifecycle ---

    /// Build a new generation from the current store contents and publish it.
    ///
    /// Returns the new generation number.
    pub fn build(&self) -> Result<u64> {
        self.build_with(CancelToken::new())
    }

    /// Like [`Collection::build`], cancellable through `cancel`.
    pub fn build_with(&self, cancel: CancelToken) -> Result<u64> {
        self.ensure_open()?;
        let _build = self.build_lock.try_lock().ok_or(AnnError::BuildInProgress)?;
        *self.running_build.lock() = Some(cancel.clone());
        let result = self.run_build(&cancel);
        *self.running_build.lock() = None;
        result
    }

    /// Cancel the running build, if any. Returns whether a build was signalled.
    pub fn cancel_build(&self) -> bool {
        match self.running_build.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn run_build(&self, cancel: &CancelToken) -> Result<u64> {
        let started = Instant::now();
        let (records, version) = {
            let store = self.store.read();
            (store.all().cloned().collect::<Vec<_>>(), store.version())
        };

        let generation = self.last_generation.load(Ordering::Acquire) + 1;
        let index = IvfIndex::build(&self.config, records, generation, cancel)?;
        let partitions = index.partition_count();
        let indexed = index.len();
        let iterations = index.iterations();

        {
            let _publish = self.publish_lock.lock();
            if self.closed.load(Ordering::Acquire) {
                return Err(AnnError::Closed);
            }
            self.active.store(Some(Arc::new(index)));
            self.last_generation.store(generation, Ordering::Release);
            self.indexed_version.store(version, Ordering::Release);
        }

        let elapsed = started.elapsed();
        self.metrics.record_build(elapsed);
        tracing::info!(
            collection = %self.name,
            generation,
            partitions,
            records = indexed,
            iterations,
            elapsed_ms = elapsed.as_millis() as u64,
            "index generation published"
        );
        Ok(generation)
    }

    /// The active generation.
    ///
    /// Holding the returned `Arc` pins that generation even across rebuilds.
    pub fn current(&self) -> Result<Arc<IvfIndex>> {
        self.ensure_open()?;
        self.active.load_full().ok_or(AnnError::IndexNotBuilt)
    }

    pub fn state(&self) -> IndexState {
        if self.closed.load(Ordering::Acquire) {
            IndexState::Closed
        } else if self.build_lock.is_locked() {
            IndexState::Building
        } else if self.active.load().is_some() {
            IndexState::Ready
        } else {
            IndexState::Uninitialized
        }
    }

    /// Close the collection. Cancels a running build and releases the index.
    /// Every later operation fails with `Closed`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_build();
        let _publish = self.publish_lock.lock();
        self.active.store(None);
        tracing::info!(collection = %self.name, "collection closed");
    }

    // --- Queries ---

    /// Approximate top-`k` search against the active generation.
    pub fn search(&self, query: &Vector, k: usize) -> Result<Vec<SearchResult>> {
        let started = Instant::now();
        let index = self.current()?;
        let results = index.search(query, k)?;
        self.metrics.record_query(started.elapsed());
        Ok(results)
    }

    /// Exact top-`k` over every record of the active generation.
    pub fn search_exact(&self, query: &Vector, k: usize) -> Result<Vec<SearchResult>> {
        let index = self.current()?;
        validate_query(index.dimension(), query, k)?;
        Ok(exact_top_k(index.metric(), query, k, index.records().iter()))
    }

    /// Run several queries against one generation, in parallel.
    pub fn search_batch(&self, queries: &[Vector], k: usize) -> Result<Vec<Vec<SearchResult>>> {
        let index = self.current()?;
        queries
            .par_iter()
            .map(|q| -> Result<Vec<SearchResult>> {
                let started = Instant::now();
                let results = index.search(q, k)?;
                self.metrics.record_query(started.elapsed());
                Ok(results)
            })
            .collect()
    }

    /// Embed `text` with `embedder` and search for its neighbors.
    pub fn search_text(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.ensure_open()?;
        let vector = embedder.embed(text).ok_or_else(|| AnnError::NoEmbedding {
            input: text.to_string(),
        })?;
        self.search(&vector, k)
    }

    // --- Introspection ---

    pub fn stats(&self) -> IndexStats {
        let (stored_records, store_version) = {
            let store = self.store.read();
            (store.len(), store.version())
        };
        let state = self.state();
        let active = self.active.load_full();
        let sizes = active
            .as_ref()
            .map(|index| index.partition_sizes())
            .unwrap_or_default();

        IndexStats {
            state,
            generation: active.as_ref().map(|index| index.generation()),
            dimension: self.config.dimension,
            metric: self.config.metric,
            probes: self.config.probes(),
            partitions: sizes.len(),
            indexed_records: active.as_ref().map(|index| index.len()).unwrap_or(0),
            stored_records,
            pending_changes: store_version
                .saturating_sub(self.indexed_version.load(Ordering::Acquire)),
            smallest_partition: sizes.iter().copied().min().unwrap_or(0),
            largest_partition: sizes.iter().copied().max().unwrap_or(0),
            training_iterations: active.as_ref().map(|index| index.iterations()).unwrap_or(0),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AnnError::Closed);
        }
        Ok(())
    }
}
