//! Bounded top-k selection with total f32 ordering.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A scored candidate. `key` breaks distance ties, smaller keys first.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<K> {
    pub distance: f32,
    pub key: K,
}

impl<K> Neighbor<K> {
    pub fn new(key: K, distance: f32) -> Self {
        Self { distance, key }
    }
}

impl<K: Ord> PartialEq for Neighbor<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord> Eq for Neighbor<K> {}

impl<K: Ord> PartialOrd for Neighbor<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Max-heap order: the farthest (then largest key) candidate sits on top.
impl<K: Ord> Ord for Neighbor<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// Keeps the `limit` smallest neighbors seen so far.
///
/// Memory is bounded by `limit`; each push is `O(log limit)`.
#[derive(Debug)]
pub struct TopK<K> {
    heap: BinaryHeap<Neighbor<K>>,
    limit: usize,
}

impl<K: Ord> TopK<K> {
    pub fn new(limit: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(limit.saturating_add(1).min(4096)),
            limit,
        }
    }

    /// Offer a candidate; it is kept only if it beats the current worst.
    pub fn push(&mut self, key: K, distance: f32) {
        if self.limit == 0 {
            return;
        }
        let candidate = Neighbor::new(key, distance);
        if self.heap.len() < self.limit {
            self.heap.push(candidate);
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if candidate < *worst {
                *worst = candidate;
            }
        }
    }

    /// The current worst retained neighbor.
    pub fn peek(&self) -> Option<&Neighbor<K>> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a Vec sorted ascending by (distance, key).
    pub fn into_sorted_vec(self) -> Vec<Neighbor<K>> {
        self.heap.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_smallest() {
        let mut top = TopK::new(2);
        top.push(0usize, 5.0);
        top.push(1, 1.0);
        top.push(2, 3.0);

        assert_eq!(top.len(), 2);
        assert_eq!(top.peek().unwrap().distance, 3.0);
        let sorted = top.into_sorted_vec();
        assert_eq!(sorted[0].distance, 1.0);
        assert_eq!(sorted[1].distance, 3.0);
    }

    #[test]
    fn test_ties_break_by_key() {
        let mut top = TopK::new(2);
        top.push("delta", 1.0);
        top.push("bravo", 1.0);
        top.push("charlie", 1.0);
        top.push("alpha", 1.0);

        let keys: Vec<&str> = top.into_sorted_vec().into_iter().map(|n| n.key).collect();
        assert_eq!(keys, vec!["alpha", "bravo"]);
    }

    #[test]
    fn test_sorted_output() {
        let mut top = TopK::new(10);
        for (i, d) in [5.0, 1.0, 3.0, 2.0, 4.0].iter().enumerate() {
            top.push(i, *d);
        }
        let sorted = top.into_sorted_vec();
        assert_eq!(sorted.len(), 5);
        for pair in sorted.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let mut top = TopK::new(0);
        top.push(0usize, 1.0);
        assert!(top.is_empty());
    }

    #[test]
    fn test_nan_sorts_last() {
        let mut top = TopK::new(2);
        top.push(0usize, f32::NAN);
        top.push(1, 2.0);
        top.push(2, 1.0);
        let keys: Vec<usize> = top.into_sorted_vec().into_iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![2, 1]);
    }
}
