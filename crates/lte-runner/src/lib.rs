//! LTE Runner - command-line launcher for ensemble runs
//!
//! A TOML file lists the branches with their precomputed results and the
//! accumulators to run. The launcher then either processes every branch in
//! one process ([`run_single`]), processes one worker's share and writes its
//! report ([`run_worker`]), or merges all worker reports into the final
//! result ([`run_combine`]).

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod accumulators;
pub mod config;
pub mod logging;
pub mod provider;

mod commands;

pub use commands::{run_combine, run_single, run_worker, write_output, ClusterArgs, RunOutput};
pub use config::{AccumulatorSpec, BranchSpec, RunnerConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
