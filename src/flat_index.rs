//! Brute-force flat index: O(n) exact k-NN search

use std::collections::HashMap;
use std::sync::Arc;

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::index::{validate_query, Index, SearchResult};
use crate::neighbor_queue::TopK;
use crate::record::Record;
use crate::vector::Vector;

/// An exact index that computes the distance to every record.
///
/// Used as ground truth for recall checks and for exhaustive search.
#[derive(Debug)]
pub struct FlatIndex {
    records: Vec<Arc<Record>>,
    by_id: HashMap<String, usize>,
    metric: DistanceMetric,
    dimension: usize,
}

impl FlatIndex {
    /// Create an index over `records`, all of which must have `dimension` components.
    pub fn new(
        dimension: usize,
        metric: DistanceMetric,
        records: Vec<Arc<Record>>,
    ) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            record.vector.check_dimension(dimension)?;
            by_id.insert(record.id.clone(), pos);
        }
        Ok(Self {
            records,
            by_id,
            metric,
            dimension,
        })
    }

    /// Iterate over all indexed records.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.records.iter()
    }
}

impl Index for FlatIndex {
    fn search(&self, query: &Vector, k: usize) -> Result<Vec<SearchResult>> {
        validate_query(self.dimension, query, k)?;
        Ok(exact_top_k(self.metric, query, k, self.records.iter()))
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
        self.by_id.get(id).map(|&pos| &self.records[pos])
    }
}

/// Score every candidate against `query` and keep the `k` closest.
pub(crate) fn exact_top_k<'a>(
    metric: DistanceMetric,
    query: &Vector,
    k: usize,
    candidates: impl Iterator<Item = &'a Arc<Record>>,
) -> Vec<SearchResult> {
    let mut top = TopK::new(k);
    for record in candidates {
        let distance = metric.distance_slices(query.as_slice(), record.vector.as_slice());
        top.push(ById(record), distance);
    }
    top.into_sorted_vec()
        .into_iter()
        .map(|n| SearchResult::from_record(n.key.0, n.distance))
        .collect()
}

/// Orders records by id so equal distances resolve deterministically.
struct ById<'a>(&'a Record);

impl PartialEq for ById<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ById<'_> {}

impl PartialOrd for ById<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ById<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}
