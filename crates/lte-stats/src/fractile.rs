//! Reduction of a weighted curve ensemble into summary curves
//!
//! For every x-value a [`WeightedDistribution`] is built over the ensemble's
//! y-values; the mean, envelopes and requested fractiles of those
//! distributions form the output curves.

use crate::curve::{Curve, WeightedCurveSet};
use crate::distribution::WeightedDistribution;
use crate::error::FractileError;
use crate::summary::{LabeledCurve, StatKind, SummaryCurve};
use serde::{Deserialize, Serialize};

/// Fractiles reported when none are configured (2.5%, 16%, 50%, 84%, 97.5%)
pub const DEFAULT_FRACTILES: [f64; 5] = [0.025, 0.16, 0.5, 0.84, 0.975];

/// Configured fractile reducer
///
/// Holds the validated list of requested fractions so every accumulator of
/// a run reports the same statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractileEngine {
    fractiles: Vec<f64>,
}

impl FractileEngine {
    /// Create engine for `fractiles` (fractions in `[0, 1]`, output in this order)
    ///
    /// # Errors
    /// `FractileError::InvalidFraction` for a fraction outside `[0, 1]`
    pub fn new(fractiles: Vec<f64>) -> Result<Self, FractileError> {
        if let Some(&bad) = fractiles.iter().find(|f| !(0.0..=1.0).contains(*f)) {
            return Err(FractileError::InvalidFraction(bad));
        }
        Ok(Self { fractiles })
    }

    /// Requested fractions
    #[inline]
    #[must_use]
    pub fn fractiles(&self) -> &[f64] {
        &self.fractiles
    }

    /// Reduce an accumulated curve set
    ///
    /// # Errors
    /// See [`reduce`]
    pub fn reduce_set(
        &self,
        set: &WeightedCurveSet,
        label: &str,
    ) -> Result<SummaryCurve, FractileError> {
        reduce(set.curves(), set.weights(), label, &self.fractiles)
    }

    /// Reduce parallel curve and weight lists
    ///
    /// # Errors
    /// See [`reduce`]
    pub fn reduce(
        &self,
        curves: &[Curve],
        weights: &[f64],
        label: &str,
    ) -> Result<SummaryCurve, FractileError> {
        reduce(curves, weights, label, &self.fractiles)
    }
}

impl Default for FractileEngine {
    fn default() -> Self {
        Self {
            fractiles: DEFAULT_FRACTILES.to_vec(),
        }
    }
}

/// Weighted mean, min/max envelopes and fractile curves of an ensemble
///
/// Output order: `fractiles` as requested, then mean, min, max. Every label
/// is `"{label} {stat}"`, e.g. `"Region A p50"`.
///
/// # Errors
/// - `FractileError::Empty` if `curves` is empty
/// - `FractileError::LengthMismatch` if `curves` and `weights` differ in length
/// - `FractileError::InvalidWeight` for negative or non-finite weights
/// - `FractileError::ZeroTotalWeight` if all weights are zero
/// - `FractileError::NonFiniteTotalWeight` if the weights sum to infinity
/// - `FractileError::DomainMismatch` if curves do not share one x-domain
/// - `FractileError::InvalidFraction` for a fraction outside `[0, 1]`
pub fn reduce(
    curves: &[Curve],
    weights: &[f64],
    label: &str,
    fractiles: &[f64],
) -> Result<SummaryCurve, FractileError> {
    let first = curves.first().ok_or(FractileError::Empty)?;
    if curves.len() != weights.len() {
        return Err(FractileError::LengthMismatch {
            curves: curves.len(),
            weights: weights.len(),
        });
    }
    if let Some(index) = curves.iter().position(|c| !first.same_domain(c)) {
        return Err(FractileError::DomainMismatch { index });
    }
    if let Some(&bad) = fractiles.iter().find(|f| !(0.0..=1.0).contains(*f)) {
        return Err(FractileError::InvalidFraction(bad));
    }

    let points = first.len();
    let mut mean = Vec::with_capacity(points);
    let mut min = Vec::with_capacity(points);
    let mut max = Vec::with_capacity(points);
    let mut fractile_ys = vec![Vec::with_capacity(points); fractiles.len()];

    for point in 0..points {
        let dist = WeightedDistribution::new(
            curves
                .iter()
                .zip(weights)
                .map(|(curve, &weight)| (curve.ys()[point], weight)),
        )?;

        mean.push(dist.mean());
        min.push(dist.min());
        max.push(dist.max());
        for (ys, &fraction) in fractile_ys.iter_mut().zip(fractiles) {
            ys.push(dist.fractile(fraction)?);
        }
    }

    let labeled = |kind: StatKind, ys: Vec<f64>| -> Result<LabeledCurve, FractileError> {
        Ok(LabeledCurve {
            label: format!("{label} {kind}"),
            kind,
            curve: Curve::with_domain_of(first, ys)?,
        })
    };

    let mut out = Vec::with_capacity(fractiles.len() + 3);
    for (&fraction, ys) in fractiles.iter().zip(fractile_ys) {
        out.push(labeled(StatKind::Fractile(fraction), ys)?);
    }
    out.push(labeled(StatKind::Mean, mean)?);
    out.push(labeled(StatKind::Min, min)?);
    out.push(labeled(StatKind::Max, max)?);

    Ok(SummaryCurve::new(label.to_string(), out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(ys: &[f64]) -> Curve {
        Curve::new((0..ys.len()).map(|i| i as f64).collect(), ys.to_vec()).unwrap()
    }

    #[test]
    fn output_order_is_fractiles_mean_min_max() {
        let curves = vec![curve(&[1.0, 2.0]), curve(&[3.0, 4.0])];
        let summary = reduce(&curves, &[1.0, 1.0], "Test", &[0.84, 0.16]).unwrap();
        let labels: Vec<&str> = summary.curves().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            ["Test p84", "Test p16", "Test mean", "Test min", "Test max"]
        );
    }

    #[test]
    fn precondition_errors() {
        let a = curve(&[1.0]);
        assert_eq!(reduce(&[], &[], "x", &[]), Err(FractileError::Empty));
        assert_eq!(
            reduce(&[a.clone()], &[1.0, 2.0], "x", &[]),
            Err(FractileError::LengthMismatch { curves: 1, weights: 2 })
        );
        assert_eq!(
            reduce(&[a.clone(), curve(&[1.0, 2.0])], &[1.0, 1.0], "x", &[]),
            Err(FractileError::DomainMismatch { index: 1 })
        );
        assert_eq!(
            reduce(&[a.clone()], &[0.0], "x", &[]),
            Err(FractileError::ZeroTotalWeight)
        );
        assert_eq!(
            reduce(&[a.clone(), a.clone()], &[f64::MAX, f64::MAX], "x", &[]),
            Err(FractileError::NonFiniteTotalWeight(f64::INFINITY))
        );
        assert_eq!(
            reduce(&[a], &[1.0], "x", &[-0.1]),
            Err(FractileError::InvalidFraction(-0.1))
        );
    }

    #[test]
    fn engine_validates_fractiles() {
        assert!(FractileEngine::new(vec![0.5, 1.2]).is_err());
        assert_eq!(FractileEngine::default().fractiles(), &DEFAULT_FRACTILES);
    }

    #[test]
    fn single_curve_collapses() {
        let c = curve(&[0.3, 0.2, 0.1]);
        let summary = reduce(&[c.clone()], &[1.0], "Only", &[0.5]).unwrap();
        assert_eq!(summary.mean(), &c);
        assert_eq!(summary.min(), &c);
        assert_eq!(summary.max(), &c);
        assert_eq!(summary.fractile(0.5), Some(&c));
    }
}
