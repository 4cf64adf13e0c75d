//! Ranks and pool size

use serde::{Deserialize, Serialize};

/// Ordinal identity of a process in the pool. Rank 0 is the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(u32);

impl Rank {
    pub const COORDINATOR: Rank = Rank(0);

    pub const fn new(rank: u32) -> Self {
        Self(rank)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn is_coordinator(self) -> bool {
        self == Self::COORDINATOR
    }

    /// Rank of the worker at a zero-based slice index.
    pub const fn of_worker(index: usize) -> Self {
        Self(index as u32 + 1)
    }
}

impl From<u32> for Rank {
    fn from(rank: u32) -> Self {
        Self(rank)
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of processes in the pool, coordinator included.
///
/// Fixed when the pool starts; a pool of size N has workers at ranks 1..N-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolSize(u32);

impl PoolSize {
    pub const fn new(size: u32) -> Self {
        Self(size)
    }

    /// Pool size for a given number of workers
    pub const fn with_workers(workers: u32) -> Self {
        Self(workers + 1)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Number of worker ranks
    pub const fn workers(self) -> usize {
        self.0.saturating_sub(1) as usize
    }

    /// Worker ranks in ascending order
    pub fn worker_ranks(self) -> impl Iterator<Item = Rank> {
        (1..self.0.max(1)).map(Rank::new)
    }

    pub fn contains(self, rank: Rank) -> bool {
        rank.get() < self.0
    }
}

impl std::fmt::Display for PoolSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_ranks_exclude_coordinator() {
        let ranks: Vec<u32> = PoolSize::new(4).worker_ranks().map(Rank::get).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_pool_of_one_has_no_workers() {
        let pool = PoolSize::new(1);
        assert_eq!(pool.workers(), 0);
        assert_eq!(pool.worker_ranks().count(), 0);
    }

    #[test]
    fn test_empty_pool_does_not_underflow() {
        assert_eq!(PoolSize::new(0).workers(), 0);
        assert_eq!(PoolSize::new(0).worker_ranks().count(), 0);
    }

    #[test]
    fn test_with_workers() {
        assert_eq!(PoolSize::with_workers(2), PoolSize::new(3));
    }

    #[test]
    fn test_rank_of_worker_index() {
        assert_eq!(Rank::of_worker(0), Rank::new(1));
        assert!(Rank::COORDINATOR.is_coordinator());
        assert!(!Rank::of_worker(0).is_coordinator());
    }

    #[test]
    fn test_contains() {
        let pool = PoolSize::new(3);
        assert!(pool.contains(Rank::new(2)));
        assert!(!pool.contains(Rank::new(3)));
    }
}
