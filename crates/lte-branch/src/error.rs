//! Error types for branch handling

/// Branch construction and selection errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BranchError {
    /// Branch identifier is empty
    #[error("branch identifier cannot be empty")]
    EmptyId,

    /// Weight is negative, NaN or infinite
    #[error("branch {id}: invalid weight {weight} (must be finite and >= 0)")]
    InvalidWeight {
        /// Offending branch
        id: String,
        /// Rejected weight
        weight: f64,
    },

    /// Branch list is empty
    #[error("branch set is empty")]
    EmptySet,

    /// Two branches share one identifier
    #[error("duplicate branch identifier: {0}")]
    DuplicateId(String),

    /// Every branch was removed by a filter
    #[error("filter removed all {original} branches")]
    FilteredToEmpty {
        /// Branch count before filtering
        original: usize,
    },

    /// Filter pattern does not compile
    #[error("invalid branch filter pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern text
        pattern: String,
        /// Regex compiler message
        reason: String,
    },

    /// Random sample larger than the set
    #[error("cannot sample {requested} branches from a set of {available}")]
    SampleTooLarge {
        /// Requested sample size
        requested: usize,
        /// Branches available
        available: usize,
    },
}
