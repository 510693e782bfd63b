//! Inverted-file (IVF) index: one immutable generation of the partitioned index.
//!
//! A generation owns a snapshot of the records it was built from, the trained
//! centroids, and the members of every partition. It is never mutated after
//! construction; a rebuild produces a new generation.
//!
//! Search scores the query against every centroid, keeps the `probes` nearest
//! partitions, and scans only their members. Results are approximate: a true
//! neighbor living in an unprobed partition is missed. With `probes` equal to
//! the partition count the search is exhaustive and exact.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::IndexConfig;
use crate::distance::DistanceMetric;
use crate::error::{AnnError, Result};
use crate::flat_index::exact_top_k;
use crate::index::{validate_query, Index, SearchResult};
use crate::kmeans::{CancelToken, KMeans};
use crate::neighbor_queue::TopK;
use crate::record::Record;
use crate::vector::Vector;

/// An immutable, versioned IVF index.
#[derive(Debug)]
pub struct IvfIndex {
    generation: u64,
    dimension: usize,
    metric: DistanceMetric,
    probes: usize,
    centroids: Vec<Vector>,
    /// Record positions per partition, in snapshot order.
    partitions: Vec<Vec<usize>>,
    records: Vec<Arc<Record>>,
    /// Record id -> (position in `records`, partition)
    by_id: HashMap<String, (usize, usize)>,
    iterations: usize,
}

impl IvfIndex {
    /// Train centroids over `records` and partition them.
    ///
    /// `records` must have unique ids and the configured dimension. Fails with
    /// `EmptyIndex` on an empty snapshot and `BuildCancelled` if `cancel` fires
    /// between training iterations.
    pub fn build(
        config: &IndexConfig,
        records: Vec<Arc<Record>>,
        generation: u64,
        cancel: &CancelToken,
    ) -> Result<Self> {
        config.validate()?;
        if records.is_empty() {
            return Err(AnnError::EmptyIndex);
        }
        for record in &records {
            record.vector.check_dimension(config.dimension)?;
        }

        let vectors: Vec<&[f32]> = records.iter().map(|r| r.vector.as_slice()).collect();
        let partitioning = KMeans::from_config(config).fit(&vectors, cancel)?;

        let mut partitions = vec![Vec::new(); partitioning.centroids.len()];
        let mut by_id = HashMap::with_capacity(records.len());
        for (pos, (record, &partition)) in records
            .iter()
            .zip(partitioning.assignments.iter())
            .enumerate()
        {
            partitions[partition].push(pos);
            by_id.insert(record.id.clone(), (pos, partition));
        }

        Ok(Self {
            generation,
            dimension: config.dimension,
            metric: config.metric,
            probes: config.probes(),
            centroids: partitioning.centroids.into_iter().map(Vector::new).collect(),
            partitions,
            records,
            by_id,
            iterations: partitioning.iterations,
        })
    }

    /// Search scanning `probes` partitions instead of the configured count.
    pub fn search_with_probes(
        &self,
        query: &Vector,
        k: usize,
        probes: usize,
    ) -> Result<Vec<SearchResult>> {
        validate_query(self.dimension, query, k)?;
        let probed = self.nearest_partitions(query, probes.max(1));
        let candidates = probed
            .iter()
            .flat_map(|&p| self.partitions[p].iter().map(|&pos| &self.records[pos]));
        Ok(exact_top_k(self.metric, query, k, candidates))
    }

    /// Indices of the `probes` partitions whose centroids are nearest to `query`.
    pub fn nearest_partitions(&self, query: &Vector, probes: usize) -> Vec<usize> {
        let mut top = TopK::new(probes.min(self.centroids.len()));
        for (idx, centroid) in self.centroids.iter().enumerate() {
            top.push(
                idx,
                self.metric.distance_slices(query.as_slice(), centroid.as_slice()),
            );
        }
        top.into_sorted_vec().into_iter().map(|n| n.key).collect()
    }

    /// The partition holding `id`, if it was indexed.
    pub fn partition_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).map(|&(_, partition)| partition)
    }

    /// Ids of the members of `partition`, in snapshot order.
    pub fn partition_members(&self, partition: usize) -> Vec<&str> {
        self.partitions
            .get(partition)
            .map(|members| {
                members
                    .iter()
                    .map(|&pos| self.records[pos].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn partition_sizes(&self) -> Vec<usize> {
        self.partitions.iter().map(Vec::len).collect()
    }

    pub fn centroids(&self) -> &[Vector] {
        &self.centroids
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Partitions scanned by [`Index::search`].
    pub fn probes(&self) -> usize {
        self.probes
    }

    /// k-means iterations spent training this generation.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The records this generation was built from.
    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }
}

impl Index for IvfIndex {
    fn search(&self, query: &Vector, k: usize) -> Result<Vec<SearchResult>> {
        self.search_with_probes(query, k, self.probes)
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, id: &str) -> Option<&Arc<Record>> {
        self.by_id.get(id).map(|&(pos, _)| &self.records[pos])
    }
}
