//! Search backend trait
//!
//! Defines the per-partition selection step of a search. The manager fans a
//! query out to every resident partition, asks the backend for that
//! partition's local top-k, and merges the local lists itself. Swapping the
//! backend (e.g. for an approximate index) does not change the manager's
//! public contract.

use crate::distance::{cmp_distance, squared_euclidean};
use crate::partition::Partition;
use dayvec_core::MetadataFilter;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A local search result: ordinal within a partition plus its distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Position within the partition
    pub ordinal: u64,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Greater = worse: larger distance, then larger ordinal.
        // BinaryHeap<Candidate> therefore pops the worst kept result first.
        cmp_distance(self.distance, other.distance).then_with(|| self.ordinal.cmp(&other.ordinal))
    }
}

/// Per-partition top-k selection
pub trait SearchBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Find the `k` closest vectors in `partition`
    ///
    /// Returns at most `min(k, partition.len())` candidates sorted by
    /// (distance asc, ordinal asc). Vectors whose metadata fails `filter`
    /// are never returned. `query` has already been checked against the
    /// partition's dimension.
    fn top_k(
        &self,
        partition: &Partition,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<Candidate>;
}

/// Exact O(n) scan with a bounded max-heap
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceBackend;

impl BruteForceBackend {
    /// Create a new brute-force backend
    pub fn new() -> Self {
        BruteForceBackend
    }
}

impl SearchBackend for BruteForceBackend {
    fn name(&self) -> &'static str {
        "brute_force"
    }

    fn top_k(
        &self,
        partition: &Partition,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<Candidate> {
        let bound = k.min(partition.len());
        if bound == 0 {
            return Vec::new();
        }

        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(bound + 1);
        for (ordinal, vector, metadata) in partition.iter() {
            if filter.is_some_and(|f| !f.matches(metadata)) {
                continue;
            }
            let candidate = Candidate {
                ordinal,
                distance: squared_euclidean(query, vector),
            };
            if heap.len() < bound {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        heap.into_sorted_vec()
    }
}
