//! Error types for ensemble statistics
//!
//! Malformed inputs are rejected up front so reductions never produce
//! NaN-laden curves.

/// Curve construction and fractile reduction errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FractileError {
    /// No curves to reduce
    #[error("cannot reduce an empty curve set")]
    Empty,

    /// Curve and weight counts differ
    #[error("curve/weight count mismatch: {curves} curves, {weights} weights")]
    LengthMismatch {
        /// Number of curves
        curves: usize,
        /// Number of weights
        weights: usize,
    },

    /// Weight is negative, NaN or infinite
    #[error("invalid weight {weight} at position {index}")]
    InvalidWeight {
        /// Position in the weight list
        index: usize,
        /// Rejected weight
        weight: f64,
    },

    /// All weights are zero
    #[error("total weight is zero")]
    ZeroTotalWeight,

    /// Finite weights whose sum overflows
    #[error("total weight overflows to {0}")]
    NonFiniteTotalWeight(f64),

    /// Curve does not share the x-domain of the first curve
    #[error("curve {index} has a different x-domain than curve 0")]
    DomainMismatch {
        /// Position of the offending curve
        index: usize,
    },

    /// Requested fraction outside [0, 1]
    #[error("invalid fractile {0} (must be within [0, 1])")]
    InvalidFraction(f64),

    /// Curve x/y lengths differ or curve has no points
    #[error("malformed curve: {xs} x-values, {ys} y-values")]
    MalformedCurve {
        /// Number of x-values
        xs: usize,
        /// Number of y-values
        ys: usize,
    },

    /// Curve contains NaN or infinity
    #[error("non-finite value in curve at point {point}")]
    NonFiniteValue {
        /// Point index
        point: usize,
    },
}
