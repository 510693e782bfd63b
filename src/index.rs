//! Index trait shared by the exact and the partitioned search backends

use crate::distance::DistanceMetric;
use crate::error::{AnnError, Result};
use crate::record::{Payload, Record};
use crate::vector::Vector;
use std::sync::Arc;

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub payload: Payload,
    pub distance: f32,
}

impl SearchResult {
    pub(crate) fn from_record(record: &Record, distance: f32) -> Self {
        Self {
            id: record.id.clone(),
            payload: record.payload.clone(),
            distance,
        }
    }
}

/// A read-only k-NN index over a fixed set of records.
pub trait Index {
    /// Search for the `k` nearest records to `query`.
    ///
    /// Results are sorted by distance ascending, ties by id ascending.
    fn search(&self, query: &Vector, k: usize) -> Result<Vec<SearchResult>>;

    /// The distance metric used by this index.
    fn metric(&self) -> DistanceMetric;

    /// The vector dimension this index accepts.
    fn dimension(&self) -> usize;

    /// The number of records in this index.
    fn len(&self) -> usize;

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an indexed record by id.
    fn get(&self, id: &str) -> Option<&Arc<Record>>;
}

/// Reject a zero `k` or a query of the wrong length.
pub(crate) fn validate_query(dimension: usize, query: &Vector, k: usize) -> Result<()> {
    if k == 0 {
        return Err(AnnError::invalid_config("k must be positive"));
    }
    query.check_dimension(dimension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query() {
        let q = Vector::new(vec![1.0, 2.0]);
        assert!(validate_query(2, &q, 1).is_ok());
        assert!(matches!(
            validate_query(3, &q, 1),
            Err(AnnError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            validate_query(2, &q, 0),
            Err(AnnError::InvalidConfiguration { .. })
        ));
    }
}
