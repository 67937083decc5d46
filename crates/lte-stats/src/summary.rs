//! Reduced ensemble output

use crate::curve::Curve;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Which statistic a summary curve holds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fraction", rename_all = "snake_case")]
pub enum StatKind {
    /// Weighted fractile at the given fraction in `[0, 1]`
    Fractile(f64),
    /// Weighted mean
    Mean,
    /// Pointwise minimum envelope
    Min,
    /// Pointwise maximum envelope
    Max,
}

impl Display for StatKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fractile(fraction) => {
                let percent = (fraction * 100.0 * 1e6).round() / 1e6;
                write!(f, "p{percent}")
            }
            Self::Mean => f.write_str("mean"),
            Self::Min => f.write_str("min"),
            Self::Max => f.write_str("max"),
        }
    }
}

/// One output curve with its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledCurve {
    /// Human-readable label, e.g. `"Region A MFD p50"`
    pub label: String,
    /// Statistic represented
    pub kind: StatKind,
    /// Values
    pub curve: Curve,
}

/// Output of a fractile reduction
///
/// Curves are stored in the fixed order fractiles (as requested), mean,
/// min, max. Downstream styling relies on this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSummary")]
pub struct SummaryCurve {
    label: String,
    curves: Vec<LabeledCurve>,
}

impl SummaryCurve {
    pub(crate) fn new(label: String, curves: Vec<LabeledCurve>) -> Self {
        Self { label, curves }
    }

    /// Label of the ensemble
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// All curves in output order
    #[inline]
    #[must_use]
    pub fn curves(&self) -> &[LabeledCurve] {
        &self.curves
    }

    /// Weighted mean curve
    #[must_use]
    pub fn mean(&self) -> &Curve {
        self.by_kind(StatKind::Mean)
    }

    /// Minimum envelope
    #[must_use]
    pub fn min(&self) -> &Curve {
        self.by_kind(StatKind::Min)
    }

    /// Maximum envelope
    #[must_use]
    pub fn max(&self) -> &Curve {
        self.by_kind(StatKind::Max)
    }

    /// Fractile curve for `fraction`, if it was requested
    #[must_use]
    pub fn fractile(&self, fraction: f64) -> Option<&Curve> {
        self.curves.iter().find_map(|c| match c.kind {
            StatKind::Fractile(f) if (f - fraction).abs() < 1e-12 => Some(&c.curve),
            _ => None,
        })
    }

    /// Fractile curves in requested order
    pub fn fractiles(&self) -> impl Iterator<Item = (f64, &Curve)> {
        self.curves.iter().filter_map(|c| match c.kind {
            StatKind::Fractile(f) => Some((f, &c.curve)),
            _ => None,
        })
    }

    // Mean, min and max are always present; the engine is the only constructor.
    fn by_kind(&self, kind: StatKind) -> &Curve {
        let position = self.curves.len() - match kind {
            StatKind::Mean => 3,
            StatKind::Min => 2,
            _ => 1,
        };
        &self.curves[position].curve
    }
}

#[derive(Deserialize)]
struct RawSummary {
    label: String,
    curves: Vec<LabeledCurve>,
}

impl TryFrom<RawSummary> for SummaryCurve {
    type Error = String;

    fn try_from(raw: RawSummary) -> Result<Self, Self::Error> {
        let tail: Vec<StatKind> = raw.curves.iter().rev().take(3).map(|c| c.kind).collect();
        if tail != [StatKind::Max, StatKind::Min, StatKind::Mean] {
            return Err(format!(
                "summary '{}' must end with mean, min and max curves",
                raw.label
            ));
        }
        Ok(Self::new(raw.label, raw.curves))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractile_labels() {
        assert_eq!(StatKind::Fractile(0.5).to_string(), "p50");
        assert_eq!(StatKind::Fractile(0.025).to_string(), "p2.5");
        assert_eq!(StatKind::Fractile(0.975).to_string(), "p97.5");
        assert_eq!(StatKind::Mean.to_string(), "mean");
    }
}
