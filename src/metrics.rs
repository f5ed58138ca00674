//! Metrics
//!
//! Histograms reported by the read path. Sinks are injected into the
//! components that report, rather than being process-global.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Histograms emitted by blobkv
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Histogram {
    /// Distinct blob files an unordered iterator read from over its lifetime
    IterTouchBlobFileCount,
}

impl Histogram {
    pub fn name(&self) -> &'static str {
        match self {
            Histogram::IterTouchBlobFileCount => "blobkv.iter.touch_blob_file_count",
        }
    }
}

/// Destination for histogram samples
pub trait MetricsSink: Send + Sync {
    fn record(&self, histogram: Histogram, value: u64);
}

/// Discards every sample
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&self, _histogram: Histogram, _value: u64) {}
}

/// Summary of the samples recorded into one histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramData {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl HistogramData {
    fn new(value: u64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn add(&mut self, value: u64) {
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// In-memory sink keeping count/sum/min/max per histogram
#[derive(Debug, Default)]
pub struct HistogramRecorder {
    data: Mutex<HashMap<Histogram, HistogramData>>,
}

impl HistogramRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current summary of `histogram`, if anything was recorded
    pub fn snapshot(&self, histogram: Histogram) -> Option<HistogramData> {
        self.data.lock().get(&histogram).copied()
    }
}

impl MetricsSink for HistogramRecorder {
    fn record(&self, histogram: Histogram, value: u64) {
        tracing::trace!(histogram = histogram.name(), value, "Recording histogram sample");
        self.data
            .lock()
            .entry(histogram)
            .and_modify(|data| data.add(value))
            .or_insert_with(|| HistogramData::new(value));
    }
}
