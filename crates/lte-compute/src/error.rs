//! Error types for ensemble computation
//!
//! Every error is fatal to the run; variants carry enough context (accumulator
//! name, branch id and index, group key) to diagnose a failed or misconfigured
//! run from a single log line:
//! - [`AccumulatorError`]: consume / finalize failures inside one accumulator
//! - [`MergeError`]: inconsistent state found while combining worker results
//! - [`DispatchError`]: task failures surfaced by the thread pool
//! - [`EnsembleError`]: umbrella type for callers driving a whole run

use lte_branch::BranchError;
use lte_cache::{BoxError, PoolError};
use lte_stats::FractileError;

/// Failures inside a single accumulator
#[derive(Debug, thiserror::Error)]
pub enum AccumulatorError {
    /// Plugin-specific extraction from a branch result failed
    #[error("{accumulator}: extraction failed for branch {branch_index}: {source}")]
    Extraction {
        /// Accumulator name
        accumulator: String,
        /// Branch index
        branch_index: usize,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// Branch was consumed twice
    #[error("{accumulator}: branch {branch_index} consumed more than once")]
    DuplicateBranch {
        /// Accumulator name
        accumulator: String,
        /// Branch index
        branch_index: usize,
    },

    /// Branch reported a different key set than earlier branches
    #[error("{accumulator}: branch {branch_index} key set differs at '{key}'")]
    KeySetMismatch {
        /// Accumulator name
        accumulator: String,
        /// Branch index
        branch_index: usize,
        /// First differing key
        key: String,
    },

    /// Consume or finalize after finalize
    #[error("{accumulator}: already finalized")]
    AlreadyFinalized {
        /// Accumulator name
        accumulator: String,
    },

    /// Fractile reduction rejected a group
    #[error("{accumulator}: reduction of '{group}' failed: {source}")]
    Reduction {
        /// Accumulator name
        accumulator: String,
        /// Group key
        group: String,
        /// Statistics error
        #[source]
        source: FractileError,
    },

    /// Reference resource unavailable
    #[error("{accumulator}: {source}")]
    Pool {
        /// Accumulator name
        accumulator: String,
        /// Pool error
        #[source]
        source: PoolError,
    },

    /// State could not be serialized
    #[error("{accumulator}: state serialization failed: {source}")]
    Serialization {
        /// Accumulator name
        accumulator: String,
        /// JSON error
        #[source]
        source: serde_json::Error,
    },
}

/// Inconsistencies found while combining distributed results
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Envelope belongs to another accumulator
    #[error("expected state for '{expected}', found '{found}'")]
    NameMismatch {
        /// Receiving accumulator
        expected: String,
        /// Envelope accumulator
        found: String,
    },

    /// Envelope was produced by another accumulator kind
    #[error("{accumulator}: expected {expected} state, found {found}")]
    KindMismatch {
        /// Accumulator name
        accumulator: String,
        /// Receiving kind
        expected: String,
        /// Envelope kind
        found: String,
    },

    /// Envelope payload does not decode
    #[error("{accumulator}: malformed state: {source}")]
    MalformedState {
        /// Accumulator name
        accumulator: String,
        /// JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Envelope payload disagrees with its own branch list
    #[error("{accumulator}: envelope lists {listed} branches but carries {carried}")]
    BranchListMismatch {
        /// Accumulator name
        accumulator: String,
        /// Branches in the index list
        listed: usize,
        /// Branches in the payload
        carried: usize,
    },

    /// Envelope weight list disagrees with its payload
    #[error("{accumulator}: weight of branch {branch_index} differs between envelope and state")]
    WeightMismatch {
        /// Accumulator name
        accumulator: String,
        /// Branch index
        branch_index: usize,
    },

    /// Same branch present in two partial results
    #[error("{accumulator}: branch {branch_index} present in more than one partial result")]
    DuplicateBranch {
        /// Accumulator name
        accumulator: String,
        /// Branch index
        branch_index: usize,
    },

    /// Partial results carry different key sets
    #[error("{accumulator}: key set mismatch at '{key}'")]
    KeySetMismatch {
        /// Accumulator name
        accumulator: String,
        /// First differing key
        key: String,
    },

    /// Combine after finalize
    #[error("{accumulator}: cannot combine into a finalized accumulator")]
    AlreadyFinalized {
        /// Accumulator name
        accumulator: String,
    },

    /// Local and remote accumulator lists differ in length
    #[error("accumulator count mismatch: {local} local, {remote} remote")]
    CountMismatch {
        /// Local accumulator count
        local: usize,
        /// Remote envelope count
        remote: usize,
    },
}

/// Fatal task failures surfaced by the dispatcher
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No accumulators registered
    #[error("no accumulators registered")]
    NoAccumulators,

    /// Two accumulators share a name
    #[error("duplicate accumulator name '{0}'")]
    DuplicateAccumulator(String),

    /// Thread count below one
    #[error("thread count must be at least 1 (got {0})")]
    InvalidThreadCount(usize),

    /// Branch index outside the branch set
    #[error("branch index {index} out of range for {len} branches")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Branch set size
        len: usize,
    },

    /// Materializing a branch result failed
    #[error("materializing branch {branch_index} ({branch_id}) failed: {source}")]
    Materialize {
        /// Branch index
        branch_index: usize,
        /// Branch identifier
        branch_id: String,
        /// Provider failure
        #[source]
        source: BoxError,
    },

    /// Building or reconfiguring the derived forecast failed
    #[error("forecast for branch {branch_index} ({branch_id}), accumulator {accumulator}: {source}")]
    Forecast {
        /// Branch index
        branch_index: usize,
        /// Branch identifier
        branch_id: String,
        /// Accumulator requesting the forecast
        accumulator: String,
        /// Builder failure
        #[source]
        source: BoxError,
    },

    /// An accumulator rejected a branch
    #[error("branch {branch_index} ({branch_id}) failed in {accumulator}: {source}")]
    Consume {
        /// Branch index
        branch_index: usize,
        /// Branch identifier
        branch_id: String,
        /// Accumulator name
        accumulator: String,
        /// Accumulator failure
        #[source]
        source: AccumulatorError,
    },

    /// Finalize failed
    #[error("finalizing {accumulator} failed: {source}")]
    Finalize {
        /// Accumulator name
        accumulator: String,
        /// Accumulator failure
        #[source]
        source: AccumulatorError,
    },

    /// Worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// Worker thread panicked
    #[error("worker thread '{0}' panicked")]
    WorkerPanicked(String),
}

/// Umbrella error for a whole ensemble run
#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    /// Branch selection failed
    #[error("branch error: {0}")]
    Branch(#[from] BranchError),

    /// Statistics precondition violated
    #[error("fractile error: {0}")]
    Fractile(#[from] FractileError),

    /// Resource pool failure
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// Accumulator failure
    #[error("accumulator error: {0}")]
    Accumulator(#[from] AccumulatorError),

    /// Distributed merge failure
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    /// Dispatch failure
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_branch_and_accumulator() {
        let err = DispatchError::Consume {
            branch_index: 3,
            branch_id: "FM3_1_ABM".into(),
            accumulator: "Regional MFDs".into(),
            source: AccumulatorError::DuplicateBranch {
                accumulator: "Regional MFDs".into(),
                branch_index: 3,
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("FM3_1_ABM"));
        assert!(msg.contains("Regional MFDs"));
        assert!(msg.contains("branch 3"));
    }

    #[test]
    fn umbrella_conversions() {
        let err: EnsembleError = MergeError::CountMismatch { local: 2, remote: 1 }.into();
        assert!(matches!(err, EnsembleError::Merge(_)));
    }
}
