//! Process-scoped run context
//!
//! Initialized once at run start and read-only afterwards, except for the
//! compute-time counters which are only ever incremented.

use crate::timing::ComputeTimes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use ulid::Ulid;

/// Position of this process among the distributed workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerTopology {
    /// Zero-based rank of this worker
    pub rank: usize,
    /// Total number of workers
    pub size: usize,
}

impl WorkerTopology {
    /// Single-process topology
    pub const SINGLE: Self = Self { rank: 0, size: 1 };

    /// Create topology, `None` unless `rank < size`
    #[must_use]
    pub fn new(rank: usize, size: usize) -> Option<Self> {
        (rank < size).then_some(Self { rank, size })
    }

    /// True for rank 0, which combines and finalizes
    #[inline]
    #[must_use]
    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }

    /// True when more than one worker takes part
    #[inline]
    #[must_use]
    pub fn is_distributed(&self) -> bool {
        self.size > 1
    }
}

impl Default for WorkerTopology {
    fn default() -> Self {
        Self::SINGLE
    }
}

impl Display for WorkerTopology {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.rank, self.size)
    }
}

/// Identity, start time and timing counters of one run on one process
#[derive(Debug)]
pub struct RunContext {
    run_id: Ulid,
    worker: WorkerTopology,
    started_at: DateTime<Utc>,
    times: ComputeTimes,
}

impl RunContext {
    /// Create context with a fresh run id
    #[must_use]
    pub fn new(worker: WorkerTopology) -> Self {
        Self::with_run_id(Ulid::new(), worker)
    }

    /// Create context joining an existing run (distributed workers share one id)
    #[must_use]
    pub fn with_run_id(run_id: Ulid, worker: WorkerTopology) -> Self {
        Self {
            run_id,
            worker,
            started_at: Utc::now(),
            times: ComputeTimes::new(),
        }
    }

    /// Run identifier
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> Ulid {
        self.run_id
    }

    /// This worker's position
    #[inline]
    #[must_use]
    pub fn worker(&self) -> WorkerTopology {
        self.worker
    }

    /// Wall-clock start
    #[inline]
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Compute-time counters
    #[inline]
    #[must_use]
    pub fn times(&self) -> &ComputeTimes {
        &self.times
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_validation() {
        assert!(WorkerTopology::new(2, 2).is_none());
        let t = WorkerTopology::new(1, 3).unwrap();
        assert!(!t.is_coordinator());
        assert!(t.is_distributed());
        assert_eq!(t.to_string(), "1/3");
        assert!(WorkerTopology::SINGLE.is_coordinator());
    }

    #[test]
    fn shared_run_id() {
        let a = RunContext::new(WorkerTopology::SINGLE);
        let b = RunContext::with_run_id(a.run_id(), WorkerTopology::new(1, 2).unwrap());
        assert_eq!(a.run_id(), b.run_id());
    }
}
