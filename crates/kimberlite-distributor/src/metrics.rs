//! Update-operation metrics.
//!
//! Ambient observability the teacher always carries (see SPEC_FULL.md
//! "Ambient stack"), even though spec.md lists "Metric sinks" as an
//! external collaborator the *core* algorithm doesn't own. Modeled after
//! `kimberlite_vsr::instrumentation::Metrics`: plain atomics, no locks, a
//! histogram with a small fixed bucket set rather than a full
//! `hdrhistogram` dependency (this crate only tracks one latency: the
//! safe-path single full Get).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Latency histogram bucket upper bounds, in milliseconds. Matches the
/// coarse bucket set `kimberlite-vsr` uses for its own consensus-latency
/// histograms.
const LATENCY_BUCKETS_MS: [u64; 8] = [1, 5, 10, 25, 50, 100, 250, 500];

#[derive(Debug, Default)]
struct LatencyHistogram {
    buckets: [AtomicU64; LATENCY_BUCKETS_MS.len()],
    overflow: AtomicU64,
    sum_ns: AtomicU64,
    count: AtomicU64,
}

impl LatencyHistogram {
    fn record(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        self.sum_ns.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        match LATENCY_BUCKETS_MS.iter().position(|&bound| ms <= bound) {
            Some(idx) => {
                self.buckets[idx].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn mean_ms(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let sum_ns = self.sum_ns.load(Ordering::Relaxed) as f64;
        sum_ns / count as f64 / 1_000_000.0
    }
}

/// Counters and histograms for the two-phase update coordinator.
///
/// One instance is shared across every [`crate::two_phase_update::TwoPhaseUpdateOperation`]
/// for a given distributor (mirroring `DistributorMetricSet` in the
/// original, which is keyed per-load-type; load-type-aware breakdowns are
/// out of scope here).
#[derive(Debug, Default)]
pub struct UpdateMetrics {
    /// Safe-path single full Get successes.
    pub single_get_ok: AtomicU64,
    /// Safe-path single full Get failures.
    pub single_get_failures: AtomicU64,
    single_get_latency: LatencyHistogram,
    /// Number of times a safe-path update restarted in the fast path after
    /// observing consistent replica timestamps (spec.md §4.5).
    pub fast_path_restarts: AtomicU64,
}

impl UpdateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_single_get_result(&self, success: bool) {
        if success {
            self.single_get_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.single_get_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_single_get_latency(&self, elapsed: Duration) {
        self.single_get_latency.record(elapsed);
    }

    pub fn single_get_latency_count(&self) -> u64 {
        self.single_get_latency.count()
    }

    pub fn single_get_latency_mean_ms(&self) -> f64 {
        self.single_get_latency.mean_ms()
    }

    pub fn increment_fast_path_restarts(&self) {
        self.fast_path_restarts.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_single_get_outcomes() {
        let metrics = UpdateMetrics::new();
        metrics.record_single_get_result(true);
        metrics.record_single_get_result(false);
        assert_eq!(metrics.single_get_ok.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.single_get_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn latency_histogram_tracks_count_and_mean() {
        let metrics = UpdateMetrics::new();
        metrics.record_single_get_latency(Duration::from_millis(2));
        metrics.record_single_get_latency(Duration::from_millis(8));
        assert_eq!(metrics.single_get_latency_count(), 2);
        assert!(metrics.single_get_latency_mean_ms() > 0.0);
    }

    #[test]
    fn fast_path_restarts_increments() {
        let metrics = UpdateMetrics::new();
        metrics.increment_fast_path_restarts();
        metrics.increment_fast_path_restarts();
        assert_eq!(metrics.fast_path_restarts.load(Ordering::Relaxed), 2);
    }
}
