//! Running min / max / average

use serde::{Deserialize, Serialize};

/// Running min, max, sum and count of a stream of values
///
/// Mergeable: combining trackers in any order yields the same statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTracker", into = "RawTracker")]
pub struct MinMaxAveTracker {
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

/// Wire form; an empty tracker's infinite bounds are not valid JSON
#[derive(Serialize, Deserialize)]
struct RawTracker {
    min: Option<f64>,
    max: Option<f64>,
    sum: f64,
    count: u64,
}

impl From<RawTracker> for MinMaxAveTracker {
    fn from(raw: RawTracker) -> Self {
        Self {
            min: raw.min.unwrap_or(f64::INFINITY),
            max: raw.max.unwrap_or(f64::NEG_INFINITY),
            sum: raw.sum,
            count: raw.count,
        }
    }
}

impl From<MinMaxAveTracker> for RawTracker {
    fn from(tracker: MinMaxAveTracker) -> Self {
        Self {
            min: tracker.min(),
            max: tracker.max(),
            sum: tracker.sum,
            count: tracker.count,
        }
    }
}

impl Default for MinMaxAveTracker {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }
}

impl MinMaxAveTracker {
    /// Create empty tracker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one value
    pub fn add_value(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    /// Fold another tracker into this one
    pub fn add_from(&mut self, other: &MinMaxAveTracker) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Smallest value seen
    #[inline]
    #[must_use]
    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    /// Largest value seen
    #[inline]
    #[must_use]
    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Arithmetic mean
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Sum of values
    #[inline]
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Number of values
    #[inline]
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_has_no_stats() {
        let t = MinMaxAveTracker::new();
        assert_eq!(t.min(), None);
        assert_eq!(t.average(), None);
        assert_eq!(t.count(), 0);
    }

    #[test]
    fn merge_matches_sequential() {
        let mut all = MinMaxAveTracker::new();
        let mut a = MinMaxAveTracker::new();
        let mut b = MinMaxAveTracker::new();
        for (i, v) in [4.0, 1.0, 7.0, 2.0].into_iter().enumerate() {
            all.add_value(v);
            if i % 2 == 0 { a.add_value(v) } else { b.add_value(v) }
        }
        a.add_from(&b);
        assert_eq!(a, all);
        assert_eq!(a.min(), Some(1.0));
        assert_eq!(a.max(), Some(7.0));
        assert_eq!(a.average(), Some(3.5));
    }

    #[test]
    fn empty_tracker_survives_json() {
        let json = serde_json::to_string(&MinMaxAveTracker::new()).unwrap();
        assert!(json.contains("\"min\":null"));
        let back: MinMaxAveTracker = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MinMaxAveTracker::new());
    }
}
