//! Shared-directory exchange of worker reports
//!
//! Layout: one `worker-<rank>.json` file per worker in a directory every
//! worker and the coordinator can reach. Files are written to a temporary
//! name and renamed, so a reader never sees a partial report.

use crate::error::ClusterError;
use crate::report::WorkerReport;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory of worker report files
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    /// Open (creating if needed) a report directory
    ///
    /// # Errors
    /// `ClusterError::Io` if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ClusterError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ClusterError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Report directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `rank`'s report
    #[must_use]
    pub fn path_for(&self, rank: usize) -> PathBuf {
        self.dir.join(format!("worker-{rank}.json"))
    }

    /// Write a report, replacing any earlier one from the same rank
    ///
    /// # Errors
    /// Serialization or I/O failures
    pub fn write(&self, report: &WorkerReport) -> Result<PathBuf, ClusterError> {
        let path = self.path_for(report.rank);
        let tmp = self.dir.join(format!(".worker-{}.json.tmp", report.rank));
        let json = serde_json::to_vec_pretty(report).map_err(|source| ClusterError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&tmp, json).map_err(|source| ClusterError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| ClusterError::Io {
            path: path.clone(),
            source,
        })?;
        info!(rank = report.rank, branches = report.branches.len(), path = %path.display(), "wrote worker report");
        Ok(path)
    }

    /// Read `rank`'s report
    ///
    /// # Errors
    /// `MissingRank` if absent, otherwise I/O or JSON failures
    pub fn read(&self, rank: usize) -> Result<WorkerReport, ClusterError> {
        let path = self.path_for(rank);
        if !path.exists() {
            return Err(ClusterError::MissingRank { rank });
        }
        let bytes = fs::read(&path).map_err(|source| ClusterError::Io {
            path: path.clone(),
            source,
        })?;
        let report = serde_json::from_slice(&bytes).map_err(|source| ClusterError::Json { path, source })?;
        debug!(rank, "read worker report");
        Ok(report)
    }

    /// Read the reports of ranks `0..size`
    ///
    /// # Errors
    /// The first missing or unreadable report
    pub fn read_all(&self, size: usize) -> Result<Vec<WorkerReport>, ClusterError> {
        (0..size).map(|rank| self.read(rank)).collect()
    }
}
