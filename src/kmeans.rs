//! k-means partitioning used to build the coarse quantizer of an IVF index.
//!
//! Seeding is k-means++ driven by a seeded `StdRng`, so training is
//! reproducible for a fixed input order, metric and seed. Lloyd iterations
//! stop once assignments are stable or the iteration cap is hit, and check a
//! [`CancelToken`] before each step.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::IndexConfig;
use crate::distance::DistanceMetric;
use crate::error::{AnnError, Result};

/// Cooperative cancellation flag shared between a build and its requester.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(AnnError::BuildCancelled);
        }
        Ok(())
    }
}

/// Outcome of training: centroids plus the partition of every input vector.
#[derive(Debug, Clone)]
pub struct Partitioning {
    pub centroids: Vec<Vec<f32>>,
    /// `assignments[i]` is the nearest centroid of input vector `i`.
    pub assignments: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
}

/// k-means trainer.
#[derive(Debug, Clone)]
pub struct KMeans {
    metric: DistanceMetric,
    k: usize,
    max_iterations: usize,
    seed: u64,
}

impl KMeans {
    pub fn new(metric: DistanceMetric, k: usize, max_iterations: usize, seed: u64) -> Self {
        Self {
            metric,
            k,
            max_iterations,
            seed,
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(
            config.metric,
            config.centroids,
            config.max_iterations,
            config.seed,
        )
    }

    /// Partition `vectors` (all of equal length) into at most `k` clusters.
    ///
    /// When there are no more distinct vectors than `k`, each distinct vector
    /// becomes its own centroid and no iterations run.
    pub fn fit(&self, vectors: &[&[f32]], cancel: &CancelToken) -> Result<Partitioning> {
        if vectors.is_empty() {
            return Err(AnnError::EmptyIndex);
        }
        if self.k == 0 {
            return Err(AnnError::invalid_config("centroid count must be positive"));
        }
        cancel.check()?;

        let distinct = distinct_vectors(vectors, self.metric);
        if distinct.len() <= self.k {
            let centroids: Vec<Vec<f32>> = distinct.iter().map(|&i| vectors[i].to_vec()).collect();
            let assignments = self.assign(vectors, &centroids);
            return Ok(Partitioning {
                centroids,
                assignments,
                iterations: 0,
                converged: true,
            });
        }

        let mut centroids = self.seed_centroids(vectors, &distinct);
        let mut assignments = self.assign(vectors, &centroids);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            cancel.check()?;
            iterations += 1;

            update_centroids(vectors, &assignments, &mut centroids);
            let next = self.assign(vectors, &centroids);
            let changed = next
                .iter()
                .zip(assignments.iter())
                .filter(|(a, b)| a != b)
                .count();
            tracing::debug!(iteration = iterations, changed, "k-means iteration");

            assignments = next;
            if changed == 0 {
                converged = true;
                break;
            }
        }

        Ok(Partitioning {
            centroids,
            assignments,
            iterations,
            converged,
        })
    }

    /// Index of the nearest centroid; ties go to the lowest index.
    pub fn nearest(&self, vector: &[f32], centroids: &[Vec<f32>]) -> usize {
        nearest_centroid(self.metric, vector, centroids)
    }

    fn assign(&self, vectors: &[&[f32]], centroids: &[Vec<f32>]) -> Vec<usize> {
        vectors
            .par_iter()
            .map(|v| nearest_centroid(self.metric, v, centroids))
            .collect()
    }

    /// k-means++ seeding over the distinct input vectors.
    fn seed_centroids(&self, vectors: &[&[f32]], distinct: &[usize]) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut chosen = vec![false; distinct.len()];
        let mut centroids = Vec::with_capacity(self.k);

        let first = rng.gen_range(0..distinct.len());
        chosen[first] = true;
        centroids.push(vectors[distinct[first]].to_vec());

        let mut weights: Vec<f64> = distinct
            .iter()
            .map(|&i| self.seed_weight(vectors[i], &centroids[0]))
            .collect();
        weights[first] = 0.0;

        while centroids.len() < self.k {
            let pick = match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(&mut rng),
                // Every remaining point coincides with a centroid under this
                // metric (e.g. directions equal up to rounding under cosine).
                Err(_) => match chosen.iter().position(|c| !c) {
                    Some(pos) => pos,
                    None => break,
                },
            };
            chosen[pick] = true;
            let centroid = vectors[distinct[pick]].to_vec();

            for (pos, &i) in distinct.iter().enumerate() {
                if chosen[pos] {
                    weights[pos] = 0.0;
                } else {
                    weights[pos] = weights[pos].min(self.seed_weight(vectors[i], &centroid));
                }
            }
            centroids.push(centroid);
        }
        centroids
    }

    fn seed_weight(&self, v: &[f32], centroid: &[f32]) -> f64 {
        let d = self.metric.distance_slices(v, centroid) as f64;
        match self.metric {
            DistanceMetric::EuclideanSquared => d,
            DistanceMetric::Euclidean | DistanceMetric::Cosine => d * d,
        }
    }
}

fn nearest_centroid(metric: DistanceMetric, vector: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (idx, centroid) in centroids.iter().enumerate() {
        let d = metric.distance_slices(vector, centroid);
        if d < best_distance {
            best_distance = d;
            best = idx;
        }
    }
    best
}

/// Move each centroid to the mean of its members; empty clusters stay put.
fn update_centroids(vectors: &[&[f32]], assignments: &[usize], centroids: &mut [Vec<f32>]) {
    let dim = centroids.first().map(Vec::len).unwrap_or(0);
    let mut sums = vec![vec![0.0f64; dim]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (v, &c) in vectors.iter().zip(assignments) {
        counts[c] += 1;
        for (acc, &x) in sums[c].iter_mut().zip(v.iter()) {
            *acc += x as f64;
        }
    }

    for ((centroid, sum), &count) in centroids.iter_mut().zip(sums).zip(&counts) {
        if count == 0 {
            continue;
        }
        let inv = 1.0 / count as f64;
        for (dst, acc) in centroid.iter_mut().zip(sum) {
            *dst = (acc * inv) as f32;
        }
    }
}

/// Positions of the first occurrence of every distinct vector, in input order.
///
/// Under cosine distance vectors are compared by direction, and zero vectors
/// (equidistant from everything) only count when nothing else is present.
fn distinct_vectors(vectors: &[&[f32]], metric: DistanceMetric) -> Vec<usize> {
    let mut seen: HashSet<Vec<u32>> = HashSet::with_capacity(vectors.len());
    let mut first_zero = None;
    let mut distinct = Vec::new();
    for (i, v) in vectors.iter().enumerate() {
        let key = match metric {
            DistanceMetric::Cosine => match direction_bits(v) {
                Some(bits) => bits,
                None => {
                    first_zero.get_or_insert(i);
                    continue;
                }
            },
            // +0.0 folds -0.0 into 0.0
            _ => v.iter().map(|x| (x + 0.0).to_bits()).collect(),
        };
        if seen.insert(key) {
            distinct.push(i);
        }
    }
    if distinct.is_empty() {
        distinct.extend(first_zero);
    }
    distinct
}

/// Bit pattern of the unit vector along `v`, or `None` for a zero vector.
fn direction_bits(v: &[f32]) -> Option<Vec<u32>> {
    let norm = v.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt();
    if norm == 0.0 {
        return None;
    }
    Some(
        v.iter()
            .map(|&x| ((x as f64 / norm) as f32 + 0.0).to_bits())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_slices(data: &[Vec<f32>]) -> Vec<&[f32]> {
        data.iter().map(Vec::as_slice).collect()
    }

    fn two_blobs() -> Vec<Vec<f32>> {
        let mut data = Vec::new();
        for i in 0..20 {
            let jitter = (i % 5) as f32 * 0.1;
            data.push(vec![jitter, jitter]);
            data.push(vec![10.0 + jitter, 10.0 - jitter]);
        }
        data
    }

    #[test]
    fn test_separates_blobs() {
        let data = two_blobs();
        let kmeans = KMeans::new(DistanceMetric::EuclideanSquared, 2, 25, 7);
        let p = kmeans.fit(&as_slices(&data), &CancelToken::new()).unwrap();

        assert_eq!(p.centroids.len(), 2);
        assert!(p.converged);
        // Points alternate between blobs; each blob lands in one partition.
        let low = p.assignments[0];
        let high = p.assignments[1];
        assert_ne!(low, high);
        for (i, &a) in p.assignments.iter().enumerate() {
            assert_eq!(a, if i % 2 == 0 { low } else { high });
        }
    }

    #[test]
    fn test_assignments_match_nearest_centroid() {
        let data: Vec<Vec<f32>> = (0..50)
            .map(|i| vec![(i * 7 % 13) as f32, (i * 3 % 11) as f32, (i % 5) as f32])
            .collect();
        let kmeans = KMeans::new(DistanceMetric::EuclideanSquared, 4, 3, 1);
        let p = kmeans.fit(&as_slices(&data), &CancelToken::new()).unwrap();

        for (v, &a) in data.iter().zip(&p.assignments) {
            assert_eq!(kmeans.nearest(v, &p.centroids), a);
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let data = two_blobs();
        let kmeans = KMeans::new(DistanceMetric::Cosine, 3, 25, 99);
        let a = kmeans.fit(&as_slices(&data), &CancelToken::new()).unwrap();
        let b = kmeans.fit(&as_slices(&data), &CancelToken::new()).unwrap();
        assert_eq!(a.assignments, b.assignments);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn test_caps_at_distinct_vectors() {
        let data = vec![
            vec![1.0, 1.0],
            vec![2.0, 2.0],
            vec![1.0, 1.0],
            vec![-0.0, 0.0],
            vec![0.0, 0.0],
        ];
        let kmeans = KMeans::new(DistanceMetric::EuclideanSquared, 8, 25, 0);
        let p = kmeans.fit(&as_slices(&data), &CancelToken::new()).unwrap();

        assert_eq!(p.centroids.len(), 3);
        assert_eq!(p.iterations, 0);
        assert_eq!(p.assignments, vec![0, 1, 0, 2, 2]);
    }

    #[test]
    fn test_collinear_cosine_shares_centroid() {
        let data = vec![
            vec![1.0, 1.0],
            vec![2.0, 2.0],
            vec![3.0, 3.0],
            vec![1.0, 0.0],
            vec![5.0, 0.0],
        ];
        let kmeans = KMeans::new(DistanceMetric::Cosine, 4, 10, 3);
        let p = kmeans.fit(&as_slices(&data), &CancelToken::new()).unwrap();

        assert_eq!(p.centroids.len(), 2);
        assert_eq!(p.assignments, vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_cosine_zero_vectors_do_not_get_a_centroid() {
        let data = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![-0.0, 0.0]];
        let kmeans = KMeans::new(DistanceMetric::Cosine, 4, 10, 0);
        let p = kmeans.fit(&as_slices(&data), &CancelToken::new()).unwrap();
        assert_eq!(p.centroids.len(), 2);
        for c in 0..p.centroids.len() {
            assert!(p.assignments.contains(&c), "partition {} is empty", c);
        }

        let zeros = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let p = kmeans.fit(&as_slices(&zeros), &CancelToken::new()).unwrap();
        assert_eq!(p.centroids.len(), 1);
        assert_eq!(p.assignments, vec![0, 0]);
    }

    #[test]
    fn test_cosine_seeding_over_many_directions() {
        let data: Vec<Vec<f32>> = (0..12)
            .map(|i| {
                let scale = (i % 3 + 1) as f32;
                vec![scale * (i / 3 + 1) as f32, scale]
            })
            .collect();
        let kmeans = KMeans::new(DistanceMetric::Cosine, 3, 10, 3);
        let p = kmeans.fit(&as_slices(&data), &CancelToken::new()).unwrap();
        assert_eq!(p.centroids.len(), 3);
        assert_eq!(p.assignments.len(), 12);
        // Collinear inputs always land together.
        for i in (0..12).step_by(3) {
            assert_eq!(p.assignments[i], p.assignments[i + 1]);
            assert_eq!(p.assignments[i], p.assignments[i + 2]);
        }
    }

    #[test]
    fn test_empty_input() {
        let kmeans = KMeans::new(DistanceMetric::EuclideanSquared, 2, 10, 0);
        assert!(matches!(
            kmeans.fit(&[], &CancelToken::new()),
            Err(AnnError::EmptyIndex)
        ));
    }

    #[test]
    fn test_cancelled_before_start() {
        let data = two_blobs();
        let cancel = CancelToken::new();
        cancel.cancel();
        let kmeans = KMeans::new(DistanceMetric::EuclideanSquared, 2, 10, 0);
        assert!(matches!(
            kmeans.fit(&as_slices(&data), &cancel),
            Err(AnnError::BuildCancelled)
        ));
    }
}
