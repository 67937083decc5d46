//! Branch partitioning across workers

use lte_compute::WorkerTopology;
use serde::{Deserialize, Serialize};

/// How branch indices are dealt to worker ranks
///
/// Every strategy yields disjoint shares whose union is `0..total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Consecutive ranges of near-equal length
    #[default]
    Contiguous,
    /// Index `i` goes to rank `i % size`
    RoundRobin,
}

impl PartitionStrategy {
    /// Branch indices assigned to `topology.rank`
    #[must_use]
    pub fn indices(&self, total: usize, topology: WorkerTopology) -> Vec<usize> {
        let WorkerTopology { rank, size } = topology;
        if size == 0 || rank >= size {
            return Vec::new();
        }
        match self {
            Self::Contiguous => (rank * total / size..(rank + 1) * total / size).collect(),
            Self::RoundRobin => (rank..total).step_by(size).collect(),
        }
    }

    /// Shares for every rank of a `size`-worker run
    #[must_use]
    pub fn partition(&self, total: usize, size: usize) -> Vec<Vec<usize>> {
        (0..size)
            .map(|rank| self.indices(total, WorkerTopology { rank, size }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(shares: &[Vec<usize>], total: usize) {
        let mut all: Vec<usize> = shares.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn contiguous_shares_cover_once() {
        let shares = PartitionStrategy::Contiguous.partition(10, 3);
        assert_eq!(shares, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8, 9]]);
        assert_exact_cover(&shares, 10);
    }

    #[test]
    fn round_robin_shares_cover_once() {
        let shares = PartitionStrategy::RoundRobin.partition(7, 3);
        assert_eq!(shares, vec![vec![0, 3, 6], vec![1, 4], vec![2, 5]]);
        assert_exact_cover(&shares, 7);
    }

    #[test]
    fn more_workers_than_branches() {
        for strategy in [PartitionStrategy::Contiguous, PartitionStrategy::RoundRobin] {
            let shares = strategy.partition(2, 5);
            assert_exact_cover(&shares, 2);
            assert_eq!(shares.iter().filter(|s| s.is_empty()).count(), 3);
        }
    }
}
