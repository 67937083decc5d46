//! LTE Cluster - distributed tier of an ensemble run
//!
//! Each worker process dispatches its [`PartitionStrategy`] share of the
//! branches, collects a [`WorkerReport`] and writes it to a shared
//! [`ReportStore`]. The [`Coordinator`] reads every report, checks that the
//! run is consistent (all ranks present once, every branch processed exactly
//! once, identical accumulator lists) and merges them into one finalized
//! result.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod coordinator;
mod error;
mod partition;
mod report;
mod store;

pub use coordinator::Coordinator;
pub use error::ClusterError;
pub use partition::PartitionStrategy;
pub use report::WorkerReport;
pub use store::ReportStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
