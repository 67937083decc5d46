//! LTE Compute - logic-tree ensemble dispatch and aggregation
//!
//! A run feeds every weighted branch of a logic tree to a set of
//! [`Accumulator`]s and reduces what they collected to fractile summaries.
//!
//! ## Tiers
//!
//! - Local: [`TaskDispatcher`] drains the branch list with a fixed pool of
//!   worker threads; each task materializes one branch through a
//!   [`BranchProvider`] and hands it to every accumulator.
//! - Distributed: independent workers each dispatch a disjoint subset and
//!   export [`StateEnvelope`]s; the coordinator merges them with the
//!   [`DistributedCombiner`] and finalizes once.
//!
//! Accumulated state is keyed by branch index, so the finalized output does
//! not depend on thread count, completion order or worker split.
//!
//! ## Failure policy
//!
//! Every error is fatal. The dispatcher stops pulling new branches on the
//! first failure and returns it with the branch and accumulator named.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod accumulator;
mod accumulators;
mod combiner;
mod config;
mod context;
mod dispatcher;
mod error;
mod forecast;
mod provider;
mod timing;

pub use accumulator::{Accumulator, AccumulatorOutput, BranchInput, StateEnvelope};
pub use accumulators::{ComparisonEnsemble, CurveEnsemble, ScalarEnsemble};
pub use combiner::DistributedCombiner;
pub use config::{default_threads, BranchSelection, RunConfig};
pub use context::{RunContext, WorkerTopology};
pub use dispatcher::{AccumulatorSet, DispatchSummary, TaskDispatcher};
pub use error::{AccumulatorError, DispatchError, EnsembleError, MergeError};
pub use forecast::{ForecastBuilder, ForecastOptions, NoForecast, ProbabilityModel};
pub use provider::BranchProvider;
pub use timing::{ComputeTimes, TimesSnapshot};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
