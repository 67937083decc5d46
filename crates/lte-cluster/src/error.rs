//! Distributed-tier errors

use lte_compute::{AccumulatorError, EnsembleError};
use std::path::PathBuf;
use ulid::Ulid;

/// Failures while exchanging or validating worker reports
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Rank outside `0..size`, or zero workers
    #[error("invalid topology: rank {rank} of {size} workers")]
    InvalidTopology {
        /// Rank
        rank: usize,
        /// Worker count
        size: usize,
    },

    /// Report file could not be read or written
    #[error("report I/O failed for {}: {source}", path.display())]
    Io {
        /// File or directory
        path: PathBuf,
        /// I/O error
        #[source]
        source: std::io::Error,
    },

    /// Report file is not valid JSON for a report
    #[error("malformed report {}: {source}", path.display())]
    Json {
        /// File
        path: PathBuf,
        /// JSON error
        #[source]
        source: serde_json::Error,
    },

    /// No report from a rank
    #[error("no report from worker {rank}")]
    MissingRank {
        /// Missing rank
        rank: usize,
    },

    /// Two reports claim the same rank
    #[error("worker {rank} reported more than once")]
    DuplicateRank {
        /// Duplicated rank
        rank: usize,
    },

    /// Report written for a different worker count
    #[error("worker {rank} ran with {found} workers, expected {expected}")]
    SizeMismatch {
        /// Reporting rank
        rank: usize,
        /// Coordinator worker count
        expected: usize,
        /// Reported worker count
        found: usize,
    },

    /// Report belongs to another run
    #[error("worker {rank} belongs to run {found}, expected {expected}")]
    RunMismatch {
        /// Reporting rank
        rank: usize,
        /// Coordinator run id
        expected: Ulid,
        /// Reported run id
        found: Ulid,
    },

    /// Branch processed by two workers
    #[error("branch {branch_index} processed by workers {first} and {second}")]
    OverlappingBranch {
        /// Branch index
        branch_index: usize,
        /// First rank
        first: usize,
        /// Second rank
        second: usize,
    },

    /// Branch processed by no worker (or outside the branch set)
    #[error("branch coverage incomplete: {missing} of {total} branches unprocessed (first: {first})")]
    IncompleteCoverage {
        /// Unprocessed branch count
        missing: usize,
        /// Branch set size
        total: usize,
        /// Lowest unprocessed index
        first: usize,
    },

    /// Branch index beyond the branch set
    #[error("worker {rank} reports branch {branch_index} but only {total} exist")]
    BranchOutOfRange {
        /// Reporting rank
        rank: usize,
        /// Branch index
        branch_index: usize,
        /// Branch set size
        total: usize,
    },

    /// Accumulator list differs from the coordinator's
    #[error("worker {rank} sent state for {found:?}, expected {expected:?}")]
    AccumulatorMismatch {
        /// Reporting rank
        rank: usize,
        /// Coordinator accumulator names
        expected: Vec<String>,
        /// Reported accumulator names
        found: Vec<String>,
    },

    /// Exported state covers different branches than the report lists
    #[error("worker {rank}: {accumulator} state disagrees with the listed branches at {branch_index}")]
    StateCoverageMismatch {
        /// Reporting rank
        rank: usize,
        /// Accumulator name
        accumulator: String,
        /// First branch listed by only one of report and state
        branch_index: usize,
    },

    /// Exported state carries a weight the coordinator's branch set does not
    #[error("worker {rank}: {accumulator} weighs branch {branch_index} at {found}, expected {expected}")]
    WeightMismatch {
        /// Reporting rank
        rank: usize,
        /// Accumulator name
        accumulator: String,
        /// Branch index
        branch_index: usize,
        /// Weight in the coordinator's branch set
        expected: f64,
        /// Weight in the exported state
        found: f64,
    },

    /// A merged accumulator does not hold exactly the branches of the run
    #[error("{accumulator}: branch {branch_index} missing or foreign after merging every report")]
    UnmergedBranch {
        /// Accumulator name
        accumulator: String,
        /// First missing or foreign branch
        branch_index: usize,
    },

    /// Exporting local state failed
    #[error("export failed: {0}")]
    Export(#[from] AccumulatorError),

    /// Combine or finalize failed
    #[error(transparent)]
    Ensemble(#[from] EnsembleError),
}
