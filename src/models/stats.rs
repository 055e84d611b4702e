//! Running latency statistics for a single variant action.
//!
//! Observations are append-only. The only way samples leave is an explicit
//! [`LatencyStats::reset`], which the registry issues on unload.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Point-in-time summary of a [`LatencyStats`] series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSummary {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0.3} +/- {:0.3}", self.mean, self.stddev)
    }
}

/// Thread-safe series of observed durations, in seconds.
///
/// Each series carries its own lock, so recording against one variant never
/// contends with recording against another.
#[derive(Debug, Default)]
pub struct LatencyStats {
    samples: Mutex<Vec<f64>>,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one observation.
    pub fn record(&self, elapsed: Duration) {
        self.record_secs(elapsed.as_secs_f64());
    }

    /// Append one observation given in seconds. Non-finite or negative values
    /// are ignored.
    pub fn record_secs(&self, secs: f64) {
        if !secs.is_finite() || secs < 0.0 {
            tracing::warn!(value = secs, "discarding invalid latency observation");
            return;
        }
        self.samples.lock().push(secs);
    }

    /// Arithmetic mean, 0.0 when empty.
    pub fn mean(&self) -> f64 {
        self.summary().mean
    }

    /// Population standard deviation, 0.0 with fewer than two samples.
    pub fn stddev(&self) -> f64 {
        self.summary().stddev
    }

    pub fn count(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Drop every observation.
    pub fn reset(&self) {
        self.samples.lock().clear();
    }

    /// Compute count, mean and stddev under a single lock acquisition.
    pub fn summary(&self) -> StatsSummary {
        let samples = self.samples.lock();
        summarize(&samples)
    }
}

fn summarize(samples: &[f64]) -> StatsSummary {
    let count = samples.len();
    if count == 0 {
        return StatsSummary::default();
    }

    let n = count as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let stddev = if count < 2 {
        0.0
    } else {
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        variance.sqrt()
    };

    StatsSummary { count, mean, stddev }
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.summary().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_series_is_zero() {
        let stats = LatencyStats::new();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.stddev(), 0.0);
    }

    #[test]
    fn test_single_sample_has_zero_stddev() {
        let stats = LatencyStats::new();
        stats.record(Duration::from_millis(250));
        assert_eq!(stats.count(), 1);
        assert!((stats.mean() - 0.25).abs() < 1e-9);
        assert_eq!(stats.stddev(), 0.0);
    }

    #[test]
    fn test_population_stddev() {
        let stats = LatencyStats::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.record_secs(v);
        }
        assert!((stats.mean() - 5.0).abs() < 1e-9);
        assert!((stats.stddev() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_observations_are_ignored() {
        let stats = LatencyStats::new();
        stats.record_secs(f64::NAN);
        stats.record_secs(-1.0);
        stats.record_secs(f64::INFINITY);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_reset_clears_samples() {
        let stats = LatencyStats::new();
        stats.record_secs(0.1);
        stats.record_secs(0.2);
        stats.reset();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), 0.0);
    }

    #[test]
    fn test_display_format() {
        let stats = LatencyStats::new();
        stats.record_secs(0.5);
        assert_eq!(stats.to_string(), "0.500 +/- 0.000");
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let stats = Arc::new(LatencyStats::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        stats.record_secs((t * 250 + i) as f64 * 1e-3);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.count(), 2000);
        let expected = (0..2000).map(|i| i as f64 * 1e-3).sum::<f64>() / 2000.0;
        assert!((stats.mean() - expected).abs() < 1e-9);
    }
}
