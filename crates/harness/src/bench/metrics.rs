//! Latency collection for measured invocations

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Histogram for latency measurements
#[derive(Debug)]
pub struct LatencyHistogram {
    /// Raw samples (for percentile calculation)
    samples: Mutex<Vec<Duration>>,
    /// Sum of all samples (for mean calculation)
    sum_micros: AtomicU64,
    /// Count of samples
    count: AtomicU64,
    /// Min latency observed
    min_micros: AtomicU64,
    /// Max latency observed
    max_micros: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::with_capacity(1024)),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
            min_micros: AtomicU64::new(u64::MAX),
            max_micros: AtomicU64::new(0),
        }
    }

    /// Record a latency sample
    pub fn record(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;

        self.samples.lock().push(duration);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.min_micros.fetch_min(micros, Ordering::Relaxed);
        self.max_micros.fetch_max(micros, Ordering::Relaxed);
    }

    /// Get the count of samples
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get the mean latency
    pub fn mean(&self) -> Duration {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        let sum = self.sum_micros.load(Ordering::Relaxed);
        Duration::from_micros(sum / count)
    }

    /// Get the minimum latency
    pub fn min(&self) -> Duration {
        let min = self.min_micros.load(Ordering::Relaxed);
        if min == u64::MAX {
            Duration::ZERO
        } else {
            Duration::from_micros(min)
        }
    }

    /// Get the maximum latency
    pub fn max(&self) -> Duration {
        Duration::from_micros(self.max_micros.load(Ordering::Relaxed))
    }

    /// Calculate percentile (0.0 to 1.0)
    pub fn percentile(&self, p: f64) -> Duration {
        let mut samples = self.samples.lock();
        if samples.is_empty() {
            return Duration::ZERO;
        }

        samples.sort();
        let idx = ((samples.len() as f64 * p) as usize).min(samples.len() - 1);
        samples[idx]
    }

    /// Get summary statistics
    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.count(),
            mean: self.mean(),
            min: self.min(),
            max: self.max(),
            p50: self.percentile(0.50),
            p95: self.percentile(0.95),
            p99: self.percentile(0.99),
        }
    }
}

/// Summary statistics for latency, serialized in microseconds
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    #[serde(rename = "mean_us", serialize_with = "micros")]
    pub mean: Duration,
    #[serde(rename = "min_us", serialize_with = "micros")]
    pub min: Duration,
    #[serde(rename = "max_us", serialize_with = "micros")]
    pub max: Duration,
    #[serde(rename = "p50_us", serialize_with = "micros")]
    pub p50: Duration,
    #[serde(rename = "p95_us", serialize_with = "micros")]
    pub p95: Duration,
    #[serde(rename = "p99_us", serialize_with = "micros")]
    pub p99: Duration,
}

fn micros<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_nanos() as f64 / 1_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_histogram() {
        let hist = LatencyHistogram::new();

        for i in 1..=100 {
            hist.record(Duration::from_micros(i));
        }

        assert_eq!(hist.count(), 100);
        assert_eq!(hist.min(), Duration::from_micros(1));
        assert_eq!(hist.max(), Duration::from_micros(100));
        assert_eq!(hist.mean(), Duration::from_micros(50));

        // P50 should be around 50
        let p50 = hist.percentile(0.50);
        assert!(p50 >= Duration::from_micros(49) && p50 <= Duration::from_micros(51));
    }

    #[test]
    fn test_empty_histogram() {
        let summary = LatencyHistogram::new().summary();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.mean, Duration::ZERO);
        assert_eq!(summary.min, Duration::ZERO);
        assert_eq!(summary.p99, Duration::ZERO);
    }

    #[test]
    fn test_summary_serializes_micros() {
        let hist = LatencyHistogram::new();
        hist.record(Duration::from_millis(2));

        let json = serde_json::to_value(hist.summary()).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["mean_us"], 2000.0);
        assert_eq!(json["max_us"], 2000.0);
    }
}
