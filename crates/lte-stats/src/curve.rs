//! Discretized curves and weighted curve sets

use crate::error::FractileError;
use serde::{Deserialize, Serialize};

/// Relative tolerance used when comparing x-domains
const DOMAIN_TOLERANCE: f64 = 1e-9;

/// Discretized function: strictly paired x and y values
///
/// A "scalar" quantity is a single-point curve at x = 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCurve")]
pub struct Curve {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Curve {
    /// Create curve from paired values
    ///
    /// # Errors
    /// - `FractileError::MalformedCurve` if lengths differ or the curve is empty
    /// - `FractileError::NonFiniteValue` if any value is NaN or infinite
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, FractileError> {
        if xs.is_empty() || xs.len() != ys.len() {
            return Err(FractileError::MalformedCurve {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        if let Some(point) = xs
            .iter()
            .zip(&ys)
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(FractileError::NonFiniteValue { point });
        }
        Ok(Self { xs, ys })
    }

    /// Single-point curve at x = 0
    ///
    /// # Errors
    /// `FractileError::NonFiniteValue` if `y` is NaN or infinite
    pub fn scalar(y: f64) -> Result<Self, FractileError> {
        Self::new(vec![0.0], vec![y])
    }

    /// Copy of `domain` with new y-values
    ///
    /// # Errors
    /// Same as [`Curve::new`]
    pub fn with_domain_of(domain: &Curve, ys: Vec<f64>) -> Result<Self, FractileError> {
        Self::new(domain.xs.clone(), ys)
    }

    /// Number of points
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Always false for a constructed curve
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// X-values
    #[inline]
    #[must_use]
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// Y-values
    #[inline]
    #[must_use]
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// Y-value at point `index`
    #[inline]
    #[must_use]
    pub fn y(&self, index: usize) -> Option<f64> {
        self.ys.get(index).copied()
    }

    /// Iterate `(x, y)` pairs
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }

    /// True if both curves share the same discretization
    #[must_use]
    pub fn same_domain(&self, other: &Curve) -> bool {
        self.xs.len() == other.xs.len()
            && self.xs.iter().zip(&other.xs).all(|(a, b)| {
                let scale = a.abs().max(b.abs()).max(1.0);
                (a - b).abs() <= DOMAIN_TOLERANCE * scale
            })
    }
}

#[derive(Deserialize)]
struct RawCurve {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl TryFrom<RawCurve> for Curve {
    type Error = FractileError;

    fn try_from(raw: RawCurve) -> Result<Self, Self::Error> {
        Self::new(raw.xs, raw.ys)
    }
}

/// Curves with matching relative weights, built incrementally
///
/// Every curve shares the x-domain of the first one pushed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedCurveSet {
    curves: Vec<Curve>,
    weights: Vec<f64>,
}

impl WeightedCurveSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create set from parallel lists, validating every entry
    ///
    /// # Errors
    /// See [`WeightedCurveSet::push`]; also `LengthMismatch`
    pub fn from_parts(curves: Vec<Curve>, weights: Vec<f64>) -> Result<Self, FractileError> {
        if curves.len() != weights.len() {
            return Err(FractileError::LengthMismatch {
                curves: curves.len(),
                weights: weights.len(),
            });
        }
        let mut set = Self::new();
        for (curve, weight) in curves.into_iter().zip(weights) {
            set.push(curve, weight)?;
        }
        Ok(set)
    }

    /// Append one weighted curve
    ///
    /// # Errors
    /// - `FractileError::InvalidWeight` for negative or non-finite weights
    /// - `FractileError::DomainMismatch` if the x-domain differs from the first curve
    pub fn push(&mut self, curve: Curve, weight: f64) -> Result<(), FractileError> {
        let index = self.curves.len();
        if !weight.is_finite() || weight < 0.0 {
            return Err(FractileError::InvalidWeight { index, weight });
        }
        if let Some(first) = self.curves.first() {
            if !first.same_domain(&curve) {
                return Err(FractileError::DomainMismatch { index });
            }
        }
        self.curves.push(curve);
        self.weights.push(weight);
        Ok(())
    }

    /// Append all entries of `other`
    ///
    /// # Errors
    /// Same as [`WeightedCurveSet::push`]
    pub fn extend_from(&mut self, other: &WeightedCurveSet) -> Result<(), FractileError> {
        for (curve, weight) in other.iter() {
            self.push(curve.clone(), weight)?;
        }
        Ok(())
    }

    /// Number of curves
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    /// True if no curves were pushed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Curves in push order
    #[inline]
    #[must_use]
    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    /// Weights in push order
    #[inline]
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Iterate `(curve, weight)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&Curve, f64)> {
        self.curves.iter().zip(self.weights.iter().copied())
    }
}
