//! Compute-time bookkeeping
//!
//! Counters are incremented concurrently by worker threads; a
//! [`TimesSnapshot`] is the serializable form shipped between workers and
//! merged on the coordinator.

use dashmap::DashMap;
use lte_stats::MinMaxAveTracker;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Thread-safe compute-time counters for one process
#[derive(Debug, Default)]
pub struct ComputeTimes {
    per_accumulator: DashMap<String, u64>,
    materialize_nanos: AtomicU64,
    forecast_nanos: AtomicU64,
    tasks: Mutex<MinMaxAveTracker>,
}

/// Serializable copy of [`ComputeTimes`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimesSnapshot {
    /// Nanoseconds spent in each accumulator's `consume`
    pub per_accumulator: BTreeMap<String, u64>,
    /// Nanoseconds spent materializing branch results
    pub materialize_nanos: u64,
    /// Nanoseconds spent building or reconfiguring forecasts
    pub forecast_nanos: u64,
    /// Whole-task durations in seconds
    pub tasks: MinMaxAveTracker,
}

fn nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

impl ComputeTimes {
    /// Create zeroed counters
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add time spent in one accumulator
    pub fn add_accumulator(&self, name: &str, elapsed: Duration) {
        let mut total = self.per_accumulator.entry(name.to_string()).or_insert(0);
        *total = total.saturating_add(nanos(elapsed));
    }

    /// Add time spent materializing a branch
    pub fn add_materialize(&self, elapsed: Duration) {
        self.materialize_nanos
            .fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    /// Add time spent on derived forecasts
    pub fn add_forecast(&self, elapsed: Duration) {
        self.forecast_nanos.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    /// Record one whole task
    pub fn add_task(&self, elapsed: Duration) {
        self.tasks.lock().add_value(elapsed.as_secs_f64());
    }

    /// Fold another process's counters into these
    pub fn merge(&self, other: &TimesSnapshot) {
        for (name, total) in &other.per_accumulator {
            let mut mine = self.per_accumulator.entry(name.clone()).or_insert(0);
            *mine = mine.saturating_add(*total);
        }
        self.materialize_nanos
            .fetch_add(other.materialize_nanos, Ordering::Relaxed);
        self.forecast_nanos
            .fetch_add(other.forecast_nanos, Ordering::Relaxed);
        self.tasks.lock().add_from(&other.tasks);
    }

    /// Current totals
    #[must_use]
    pub fn snapshot(&self) -> TimesSnapshot {
        TimesSnapshot {
            per_accumulator: self
                .per_accumulator
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            materialize_nanos: self.materialize_nanos.load(Ordering::Relaxed),
            forecast_nanos: self.forecast_nanos.load(Ordering::Relaxed),
            tasks: *self.tasks.lock(),
        }
    }
}

impl TimesSnapshot {
    /// Time spent in accumulator `name`
    #[must_use]
    pub fn accumulator(&self, name: &str) -> Duration {
        Duration::from_nanos(self.per_accumulator.get(name).copied().unwrap_or(0))
    }

    /// Human-readable table, slowest accumulator first
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn render(&self) -> String {
        let mut rows: Vec<(&String, &u64)> = self.per_accumulator.iter().collect();
        rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let total: u64 = rows.iter().map(|(_, n)| **n).sum();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "materialize: {:.1}s, forecasts: {:.1}s",
            self.materialize_nanos as f64 / 1e9,
            self.forecast_nanos as f64 / 1e9
        );
        for (name, n) in rows {
            let share = if total == 0 { 0.0 } else { *n as f64 / total as f64 * 100.0 };
            let _ = writeln!(out, "{name}: {:.1}s ({share:.1}%)", *n as f64 / 1e9);
        }
        if let (Some(min), Some(max), Some(ave)) =
            (self.tasks.min(), self.tasks.max(), self.tasks.average())
        {
            let _ = writeln!(
                out,
                "tasks: {} (min {min:.2}s, max {max:.2}s, ave {ave:.2}s)",
                self.tasks.count()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_remote_counters() {
        let local = ComputeTimes::new();
        local.add_accumulator("MFDs", Duration::from_millis(1500));
        local.add_task(Duration::from_secs(2));

        let remote = ComputeTimes::new();
        remote.add_accumulator("MFDs", Duration::from_millis(500));
        remote.add_accumulator("Paleo", Duration::from_millis(250));
        remote.add_materialize(Duration::from_secs(1));
        remote.add_task(Duration::from_secs(4));

        local.merge(&remote.snapshot());
        let snap = local.snapshot();
        assert_eq!(snap.accumulator("MFDs"), Duration::from_secs(2));
        assert_eq!(snap.accumulator("Paleo"), Duration::from_millis(250));
        assert_eq!(snap.materialize_nanos, 1_000_000_000);
        assert_eq!(snap.tasks.count(), 2);
        assert_eq!(snap.tasks.average(), Some(3.0));
    }

    #[test]
    fn render_lists_slowest_first() {
        let times = ComputeTimes::new();
        times.add_accumulator("fast", Duration::from_millis(10));
        times.add_accumulator("slow", Duration::from_secs(3));
        let table = times.snapshot().render();
        let slow = table.find("slow").unwrap();
        let fast = table.find("fast").unwrap();
        assert!(slow < fast);
    }
}
