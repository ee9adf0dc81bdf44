use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    ticks: AtomicU64,
    empty_ticks: AtomicU64,
    appearance_records: AtomicU64,
    rating_records: AtomicU64,
    joined_pairs: AtomicU64,
    parse_failures: AtomicU64,
    sink_failures: AtomicU64,
    tick_latency_peak_us: AtomicU64,
}

impl MetricsRegistry {
    pub fn inc_ticks(&self, delta: u64) {
        self.inner.ticks.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_empty_ticks(&self, delta: u64) {
        self.inner.empty_ticks.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_appearance_records(&self, delta: u64) {
        self.inner
            .appearance_records
            .fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_rating_records(&self, delta: u64) {
        self.inner.rating_records.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_joined_pairs(&self, delta: u64) {
        self.inner.joined_pairs.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_sink_failures(&self, delta: u64) {
        self.inner.sink_failures.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_parse_failures(&self, delta: u64) {
        self.inner.parse_failures.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn record_tick_latency(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.inner
            .tick_latency_peak_us
            .fetch_max(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.inner.ticks.load(Ordering::Relaxed),
            empty_ticks: self.inner.empty_ticks.load(Ordering::Relaxed),
            appearance_records: self.inner.appearance_records.load(Ordering::Relaxed),
            rating_records: self.inner.rating_records.load(Ordering::Relaxed),
            joined_pairs: self.inner.joined_pairs.load(Ordering::Relaxed),
            parse_failures: self.inner.parse_failures.load(Ordering::Relaxed),
            sink_failures: self.inner.sink_failures.load(Ordering::Relaxed),
            tick_latency_peak_us: self.inner.tick_latency_peak_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub empty_ticks: u64,
    pub appearance_records: u64,
    pub rating_records: u64,
    /// Actor/rating pairs produced by the same-tick join.
    pub joined_pairs: u64,
    pub parse_failures: u64,
    pub sink_failures: u64,
    pub tick_latency_peak_us: u64,
}

impl MetricsSnapshot {
    pub fn to_json_line(&self, label: &str, elapsed: Option<Duration>) -> Result<String> {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            label: &'a str,
            #[serde(flatten)]
            metrics: &'a MetricsSnapshot,
            elapsed_ms: Option<u128>,
        }

        let payload = Snapshot {
            label,
            metrics: self,
            elapsed_ms: elapsed.map(|d| d.as_millis()),
        };
        serde_json::to_string(&payload).context("failed to serialize metrics snapshot")
    }
}

pub struct TickTimer {
    start: Instant,
}

impl TickTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
