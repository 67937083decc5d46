//! Validation and fan-in of worker reports on the coordinating process

use crate::error::ClusterError;
use crate::report::WorkerReport;
use lte_branch::BranchSet;
use lte_compute::{
    AccumulatorOutput, AccumulatorSet, DistributedCombiner, EnsembleError, RunContext, StateEnvelope, TimesSnapshot,
};
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use ulid::Ulid;

/// Checks that worker reports form one consistent run, then merges them
#[derive(Debug, Clone)]
pub struct Coordinator {
    run_id: Ulid,
    size: usize,
    weights: Vec<f64>,
    combiner: DistributedCombiner,
}

impl Coordinator {
    /// Coordinator for run `run_id` over `size` workers sharing `branches`
    ///
    /// # Errors
    /// `ClusterError::InvalidTopology` for zero workers
    pub fn new(run_id: Ulid, size: usize, branches: &BranchSet) -> Result<Self, ClusterError> {
        if size == 0 {
            return Err(ClusterError::InvalidTopology { rank: 0, size });
        }
        Ok(Self {
            run_id,
            size,
            weights: branches.iter().map(|(_, b)| b.weight()).collect(),
            combiner: DistributedCombiner::new(),
        })
    }

    /// Branches in the run
    #[inline]
    #[must_use]
    pub fn total_branches(&self) -> usize {
        self.weights.len()
    }

    /// Reports in rank order after every consistency check
    ///
    /// Checks, in order: run id and worker count of each report, ranks
    /// (each of `0..size` exactly once), branch coverage (every branch by
    /// exactly one worker), the accumulator list of every non-idle worker,
    /// and finally that every exported state carries exactly the listed
    /// branches with the weights of the coordinator's branch set.
    ///
    /// # Errors
    /// The first failed check
    pub fn validate<'a>(
        &self,
        reports: &'a [WorkerReport],
        expected_accumulators: &[String],
    ) -> Result<Vec<&'a WorkerReport>, ClusterError> {
        let mut by_rank: BTreeMap<usize, &WorkerReport> = BTreeMap::new();
        for report in reports {
            if report.run_id != self.run_id {
                return Err(ClusterError::RunMismatch {
                    rank: report.rank,
                    expected: self.run_id,
                    found: report.run_id,
                });
            }
            if report.size != self.size {
                return Err(ClusterError::SizeMismatch {
                    rank: report.rank,
                    expected: self.size,
                    found: report.size,
                });
            }
            if report.rank >= self.size {
                return Err(ClusterError::InvalidTopology {
                    rank: report.rank,
                    size: self.size,
                });
            }
            if by_rank.insert(report.rank, report).is_some() {
                return Err(ClusterError::DuplicateRank { rank: report.rank });
            }
        }
        if let Some(rank) = (0..self.size).find(|r| !by_rank.contains_key(r)) {
            return Err(ClusterError::MissingRank { rank });
        }

        self.check_coverage(by_rank.values().copied())?;

        for report in by_rank.values() {
            if !report.is_idle() {
                let found = report.accumulator_names();
                if found != expected_accumulators {
                    return Err(ClusterError::AccumulatorMismatch {
                        rank: report.rank,
                        expected: expected_accumulators.to_vec(),
                        found,
                    });
                }
            }
            for envelope in &report.envelopes {
                self.check_envelope(report, envelope)?;
            }
        }
        Ok(by_rank.into_values().collect())
    }

    fn check_coverage<'a>(&self, reports: impl Iterator<Item = &'a WorkerReport>) -> Result<(), ClusterError> {
        let total = self.total_branches();
        let mut owner: Vec<Option<usize>> = vec![None; total];
        for report in reports {
            for &index in &report.branches {
                let slot = owner.get_mut(index).ok_or(ClusterError::BranchOutOfRange {
                    rank: report.rank,
                    branch_index: index,
                    total,
                })?;
                if let Some(first) = *slot {
                    return Err(ClusterError::OverlappingBranch {
                        branch_index: index,
                        first,
                        second: report.rank,
                    });
                }
                *slot = Some(report.rank);
            }
        }

        let missing: Vec<usize> = owner
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.is_none().then_some(i))
            .collect();
        if let Some(&first) = missing.first() {
            return Err(ClusterError::IncompleteCoverage {
                missing: missing.len(),
                total,
                first,
            });
        }
        Ok(())
    }

    fn check_envelope(&self, report: &WorkerReport, envelope: &StateEnvelope) -> Result<(), ClusterError> {
        if let Some(branch_index) = first_difference(&report.branches, &envelope.branches) {
            return Err(ClusterError::StateCoverageMismatch {
                rank: report.rank,
                accumulator: envelope.accumulator.clone(),
                branch_index,
            });
        }
        if envelope.weights.len() != envelope.branches.len() {
            let branch_index = envelope
                .branches
                .get(envelope.weights.len())
                .copied()
                .unwrap_or_default();
            return Err(ClusterError::StateCoverageMismatch {
                rank: report.rank,
                accumulator: envelope.accumulator.clone(),
                branch_index,
            });
        }
        for (&branch_index, &found) in envelope.branches.iter().zip(&envelope.weights) {
            let expected = self.weights[branch_index];
            if expected.to_bits() != found.to_bits() {
                return Err(ClusterError::WeightMismatch {
                    rank: report.rank,
                    accumulator: envelope.accumulator.clone(),
                    branch_index,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Merge every report into fresh local accumulators and finalize them
    ///
    /// `locals` must not have consumed any branch; all work, including the
    /// coordinator's own share, arrives through `reports`. Nothing is
    /// finalized unless every local holds every branch of the run.
    ///
    /// # Errors
    /// Validation, merge or finalize failures
    pub fn finalize<R, F>(
        &self,
        locals: &AccumulatorSet<R, F>,
        reports: &[WorkerReport],
        ctx: &RunContext,
    ) -> Result<Vec<AccumulatorOutput>, ClusterError> {
        let names: Vec<String> = locals.iter().map(|a| a.name().to_string()).collect();
        let ordered = self.validate(reports, &names)?;

        let idle = ordered.iter().filter(|r| r.is_idle()).count();
        if idle > 0 {
            warn!(idle, workers = self.size, "some workers processed no branches");
        }

        let envelopes: Vec<Vec<StateEnvelope>> = ordered.iter().map(|r| r.envelopes.clone()).collect();
        let times: Vec<TimesSnapshot> = ordered.iter().map(|r| r.times.clone()).collect();
        self.combiner
            .combine_all(locals, &envelopes)
            .map_err(EnsembleError::from)?;

        let expected: Vec<usize> = (0..self.total_branches()).collect();
        for acc in locals {
            if let Some(branch_index) = first_difference(&expected, &acc.branches_consumed()) {
                error!(accumulator = acc.name(), branch_index, "merged state is incomplete");
                return Err(ClusterError::UnmergedBranch {
                    accumulator: acc.name().to_string(),
                    branch_index,
                });
            }
        }
        let outputs = self.combiner.finalize_all(locals, &times, ctx)?;

        info!(
            run_id = %self.run_id,
            workers = self.size,
            branches = self.total_branches(),
            "distributed run finalized"
        );
        Ok(outputs)
    }
}

/// Smallest index present in exactly one of two ascending lists
fn first_difference(a: &[usize], b: &[usize]) -> Option<usize> {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => return Some(a[i]),
            std::cmp::Ordering::Greater => return Some(b[j]),
        }
    }
    a.get(i).or_else(|| b.get(j)).copied()
}
