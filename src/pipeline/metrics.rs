// src/pipeline/metrics.rs
//
// Counters for every stage of the control loop. Cheap to clone; all
// clones share the same atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct TrackingMetrics {
    pub samples_received: Arc<AtomicU64>,
    pub malformed_samples: Arc<AtomicU64>,
    pub samples_after_stop: Arc<AtomicU64>,
    pub levels_published: Arc<AtomicU64>,
    pub sink_writes: Arc<AtomicU64>,
    pub sink_failures: Arc<AtomicU64>,
    pub sessions_started: Arc<AtomicU64>,
    pub start_refusals: Arc<AtomicU64>,
    pub trigger_evaluations: Arc<AtomicU64>,
    pub triggers_ignored: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for TrackingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingMetrics {
    pub fn new() -> Self {
        Self {
            samples_received: Arc::new(AtomicU64::new(0)),
            malformed_samples: Arc::new(AtomicU64::new(0)),
            samples_after_stop: Arc::new(AtomicU64::new(0)),
            levels_published: Arc::new(AtomicU64::new(0)),
            sink_writes: Arc::new(AtomicU64::new(0)),
            sink_failures: Arc::new(AtomicU64::new(0)),
            sessions_started: Arc::new(AtomicU64::new(0)),
            start_refusals: Arc::new(AtomicU64::new(0)),
            trigger_evaluations: Arc::new(AtomicU64::new(0)),
            triggers_ignored: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Samples per second since creation
    pub fn sample_rate(&self) -> f64 {
        let samples = self.samples_received.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            samples as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            malformed_samples: self.malformed_samples.load(Ordering::Relaxed),
            samples_after_stop: self.samples_after_stop.load(Ordering::Relaxed),
            levels_published: self.levels_published.load(Ordering::Relaxed),
            sink_writes: self.sink_writes.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            start_refusals: self.start_refusals.load(Ordering::Relaxed),
            trigger_evaluations: self.trigger_evaluations.load(Ordering::Relaxed),
            triggers_ignored: self.triggers_ignored.load(Ordering::Relaxed),
            sample_rate: self.sample_rate(),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub samples_received: u64,
    pub malformed_samples: u64,
    pub samples_after_stop: u64,
    pub levels_published: u64,
    pub sink_writes: u64,
    pub sink_failures: u64,
    pub sessions_started: u64,
    pub start_refusals: u64,
    pub trigger_evaluations: u64,
    pub triggers_ignored: u64,
    pub sample_rate: f64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = TrackingMetrics::new();
        let clone = metrics.clone();
        clone.inc(&clone.sink_writes);
        clone.inc(&clone.sink_writes);
        metrics.inc(&metrics.sink_failures);

        let summary = metrics.summary();
        assert_eq!(summary.sink_writes, 2);
        assert_eq!(summary.sink_failures, 1);
        assert_eq!(summary.samples_received, 0);
    }
}
