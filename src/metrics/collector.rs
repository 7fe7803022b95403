use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

// ─── Configuration ───────────────────────────────────────────────

/// How many individual query records we keep for the dashboard feed
const MAX_SAMPLES: usize = 1000;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe query-latency recorder.
/// Handlers call `record()`, the `/api/metrics` endpoint calls `snapshot()`.
///
/// Holds at most `capacity` samples, newest-first; once full, every
/// insertion evicts the oldest entry. Both ends of the `VecDeque` are
/// O(1), so recording never degrades as the feed fills up.
pub struct QueryMetrics {
    inner: Mutex<Inner>,
}

/// A single entry in the query feed.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMetric {
    /// e.g. "GET /api/orders"
    pub query: String,
    /// Milliseconds spent inside the handler's store round-trip
    pub duration: f64,
    /// Assigned by the recorder at insertion, not by the caller
    pub timestamp: DateTime<Utc>,
}

/// Complete snapshot shipped to the polling dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Retained samples, newest-first
    pub metrics: Vec<QueryMetric>,
    /// Count of retained samples (bounded by capacity, not historical)
    pub total_queries: usize,
    pub average_duration: f64,
    pub max_duration: f64,
    pub min_duration: f64,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    capacity: usize,
    samples: VecDeque<QueryMetric>,
}

// ─── QueryMetrics impl ───────────────────────────────────────────

impl QueryMetrics {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SAMPLES)
    }

    /// Recorder with a custom bound. Tests use small capacities to
    /// exercise eviction without a thousand inserts.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity,
                samples: VecDeque::with_capacity(capacity + 1),
            }),
        }
    }

    /// Record one timed operation. Called from every handler after the
    /// store round-trip succeeds. Insertion and eviction happen under a
    /// single lock acquisition, so the capacity bound holds even with
    /// concurrent writers.
    pub fn record(&self, query: impl Into<String>, duration_ms: f64) {
        self.inner.lock().record(query.into(), duration_ms);
    }

    /// Wipe all samples — called when a new benchmark run starts.
    pub fn reset(&self) {
        self.inner.lock().samples.clear();
    }

    /// Produce a read-only snapshot for the dashboard. Samples and the
    /// four aggregates come from the same locked read, so
    /// `min ≤ average ≤ max` always holds for non-empty state.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().snapshot()
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn record(&mut self, query: String, duration_ms: f64) {
        self.samples.push_front(QueryMetric {
            query,
            duration: duration_ms,
            timestamp: Utc::now(),
        });
        if self.samples.len() > self.capacity {
            self.samples.pop_back();
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let metrics: Vec<QueryMetric> = self.samples.iter().cloned().collect();
        let total_queries = metrics.len();

        // min/max over an empty set is undefined; the dashboard wants
        // zeros before the first query arrives.
        if total_queries == 0 {
            return MetricsSnapshot {
                metrics,
                total_queries: 0,
                average_duration: 0.0,
                max_duration: 0.0,
                min_duration: 0.0,
            };
        }

        let sum: f64 = metrics.iter().map(|m| m.duration).sum();
        let max = metrics.iter().map(|m| m.duration).fold(f64::MIN, f64::max);
        let min = metrics.iter().map(|m| m.duration).fold(f64::MAX, f64::min);

        // f64 summation can round the mean a hair past the true
        // extremes (0.1 three times already does it), so pin it back
        // inside [min, max].
        let average = (sum / total_queries as f64).clamp(min, max);

        MetricsSnapshot {
            total_queries,
            average_duration: average,
            max_duration: max,
            min_duration: min,
            metrics,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn empty_snapshot_is_all_zeros() {
        let rec = QueryMetrics::new();
        let snap = rec.snapshot();

        assert!(snap.metrics.is_empty());
        assert_eq!(snap.total_queries, 0);
        assert_eq!(snap.average_duration, 0.0);
        assert_eq!(snap.max_duration, 0.0);
        assert_eq!(snap.min_duration, 0.0);
    }

    #[test]
    fn overflow_keeps_newest_and_respects_capacity() {
        let rec = QueryMetrics::with_capacity(2);
        rec.record("GET /api/orders", 10.0);
        rec.record("GET /api/orders", 20.0);
        rec.record("GET /api/orders", 30.0);

        let snap = rec.snapshot();
        assert_eq!(snap.total_queries, 2);
        let durations: Vec<f64> =
            snap.metrics.iter().map(|m| m.duration).collect();
        assert_eq!(durations, vec![30.0, 20.0]);
        assert_eq!(snap.average_duration, 25.0);
        assert_eq!(snap.max_duration, 30.0);
        assert_eq!(snap.min_duration, 20.0);
    }

    #[test]
    fn full_recorder_evicts_exactly_the_oldest() {
        let rec = QueryMetrics::new();
        rec.record("first", 5.0);
        for _ in 0..999 {
            rec.record("filler", 5.0);
        }
        rec.record("spike", 999.0);

        let snap = rec.snapshot();
        assert_eq!(snap.total_queries, 1000);
        assert_eq!(snap.max_duration, 999.0);
        assert_eq!(snap.min_duration, 5.0);
        // The very first insert is the one that got evicted.
        assert!(snap.metrics.iter().all(|m| m.query != "first"));
        assert_eq!(snap.metrics[0].query, "spike");
    }

    #[test]
    fn aggregates_are_ordered_for_any_nonempty_state() {
        let rec = QueryMetrics::with_capacity(16);
        for d in [3.0, 141.0, 0.0, 59.0, 26.0, 5.0] {
            rec.record("mixed", d);
        }

        let snap = rec.snapshot();
        assert!(snap.min_duration <= snap.average_duration);
        assert!(snap.average_duration <= snap.max_duration);
    }

    #[test]
    fn fractional_durations_keep_the_mean_inside_min_and_max() {
        let rec = QueryMetrics::with_capacity(8);
        for _ in 0..3 {
            rec.record("GET /api/orders", 0.1);
        }

        let snap = rec.snapshot();
        assert_eq!(snap.max_duration, 0.1);
        assert_eq!(snap.min_duration, 0.1);
        assert!(snap.average_duration <= snap.max_duration);
        assert!(snap.min_duration <= snap.average_duration);
    }

    #[test]
    fn snapshot_is_idempotent_without_intervening_records() {
        let rec = QueryMetrics::with_capacity(8);
        rec.record("a", 1.5);
        rec.record("b", 2.5);

        let first = rec.snapshot();
        let second = rec.snapshot();

        assert_eq!(first.total_queries, second.total_queries);
        assert_eq!(first.average_duration, second.average_duration);
        assert_eq!(first.max_duration, second.max_duration);
        assert_eq!(first.min_duration, second.min_duration);
        let a: Vec<_> = first.metrics.iter().map(|m| &m.query).collect();
        let b: Vec<_> = second.metrics.iter().map(|m| &m.query).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn reset_empties_the_feed() {
        let rec = QueryMetrics::with_capacity(4);
        rec.record("x", 7.0);
        rec.reset();
        assert_eq!(rec.snapshot().total_queries, 0);
    }

    #[test]
    fn concurrent_records_neither_drop_nor_duplicate_below_the_bound() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 50;

        let rec = Arc::new(QueryMetrics::new());

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let rec = rec.clone();
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        rec.record(format!("w{t}-{i}"), 1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = rec.snapshot();
        assert_eq!(snap.total_queries, THREADS * PER_THREAD);

        let mut labels: Vec<_> =
            snap.metrics.iter().map(|m| m.query.clone()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), THREADS * PER_THREAD);
    }

    #[test]
    fn concurrent_overflow_settles_at_capacity() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 10;

        let rec = Arc::new(QueryMetrics::with_capacity(8));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let rec = rec.clone();
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        rec.record("hammer", 2.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(rec.snapshot().total_queries, 8);
    }

    #[test]
    fn snapshot_serializes_with_dashboard_field_names() {
        let rec = QueryMetrics::with_capacity(2);
        rec.record("GET /api/orders", 12.0);

        let json = serde_json::to_value(rec.snapshot()).unwrap();
        assert_eq!(json["totalQueries"], 1);
        assert_eq!(json["averageDuration"], 12.0);
        assert_eq!(json["maxDuration"], 12.0);
        assert_eq!(json["minDuration"], 12.0);
        assert_eq!(json["metrics"][0]["query"], "GET /api/orders");
        assert_eq!(json["metrics"][0]["duration"], 12.0);
        assert!(json["metrics"][0]["timestamp"].is_string());
    }
}
