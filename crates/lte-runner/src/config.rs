//! TOML run description
//!
//! ```toml
//! partition = "round_robin"
//!
//! [run]
//! threads = 4
//! fractiles = [0.025, 0.5, 0.975]
//!
//! [[branches]]
//! id = "FM3_1_ABM"
//! weight = 0.5
//! scalars = { slip_misfit = 1.2 }
//! curves = { mfd = { xs = [6.0, 7.0], ys = [0.1, 0.01] } }
//!
//! [[accumulators]]
//! type = "curves"
//! name = "MFDs"
//! ```

use anyhow::{Context, Result};
use lte_branch::{BranchError, BranchSet, WeightedBranch};
use lte_cluster::PartitionStrategy;
use lte_compute::{ForecastOptions, RunConfig};
use lte_stats::Curve;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One branch with its precomputed synthetic results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSpec {
    /// Branch identifier
    pub id: String,
    /// Prior weight
    pub weight: f64,
    /// Named scalar results
    #[serde(default)]
    pub scalars: BTreeMap<String, f64>,
    /// Named curve results (rates for forecast accumulators)
    #[serde(default)]
    pub curves: BTreeMap<String, Curve>,
}

/// Accumulator to register, by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccumulatorSpec {
    /// Every branch curve, grouped by curve name
    Curves {
        /// Accumulator name
        name: String,
    },
    /// Every branch scalar, keyed by scalar name
    Scalars {
        /// Accumulator name
        name: String,
    },
    /// Exceedance probabilities derived from branch rate curves
    Probabilities {
        /// Accumulator name
        name: String,
        /// Forecast configuration
        #[serde(default)]
        forecast: ForecastOptions,
    },
    /// Misfit of one branch curve against a reference curve
    Comparison {
        /// Accumulator name
        name: String,
        /// Branch curve to compare
        curve: String,
        /// Reference curve
        reference: Curve,
    },
}

impl AccumulatorSpec {
    /// Accumulator name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Curves { name }
            | Self::Scalars { name }
            | Self::Probabilities { name, .. }
            | Self::Comparison { name, .. } => name,
        }
    }
}

/// Complete run description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Threads, fractiles, selection
    #[serde(default)]
    pub run: RunConfig,
    /// Branch split across distributed workers
    #[serde(default)]
    pub partition: PartitionStrategy,
    /// Full branch list before selection
    pub branches: Vec<BranchSpec>,
    /// Accumulators to run
    pub accumulators: Vec<AccumulatorSpec>,
}

impl RunnerConfig {
    /// Parse TOML text
    ///
    /// # Errors
    /// Malformed TOML or missing fields
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid run configuration")
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Unreadable file or invalid configuration
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("loading {}", path.display()))
    }

    /// Branch set after the configured selection
    ///
    /// # Errors
    /// Invalid branches or a selection that leaves nothing
    pub fn branch_set(&self) -> Result<BranchSet, BranchError> {
        let all = BranchSet::new(
            self.branches
                .iter()
                .map(|b| WeightedBranch::new(b.id.as_str(), b.weight))
                .collect::<Result<Vec<_>, _>>()?,
        )?;
        self.run.selection.apply(&all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lte_compute::ProbabilityModel;

    const SAMPLE: &str = r#"
        partition = "round_robin"

        [run]
        threads = 2
        fractiles = [0.5]

        [run.selection]
        exclude = ["GEOL"]

        [[branches]]
        id = "FM3_1_ABM"
        weight = 0.5
        scalars = { slip_misfit = 1.2 }
        curves = { mfd = { xs = [6.0, 7.0], ys = [0.1, 0.01] } }

        [[branches]]
        id = "FM3_1_GEOL"
        weight = 0.5

        [[accumulators]]
        type = "probabilities"
        name = "Probabilities"
        forecast = { probability_model = "bpt", duration_years = 5.0 }

        [[accumulators]]
        type = "scalars"
        name = "Misfits"
    "#;

    #[test]
    fn parses_sample() {
        let config = RunnerConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.partition, PartitionStrategy::RoundRobin);
        assert_eq!(config.run.threads, Some(2));
        assert_eq!(config.branches[0].curves["mfd"].ys(), &[0.1, 0.01]);
        match &config.accumulators[0] {
            AccumulatorSpec::Probabilities { forecast, .. } => {
                assert_eq!(forecast.probability_model, ProbabilityModel::Bpt);
                assert_eq!(forecast.duration_years, 5.0);
            }
            other => panic!("unexpected accumulator: {other:?}"),
        }
        assert_eq!(config.accumulators[1].name(), "Misfits");
    }

    #[test]
    fn selection_applies() {
        let config = RunnerConfig::parse(SAMPLE).unwrap();
        let branches = config.branch_set().unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].id().as_str(), "FM3_1_ABM");
    }
}
