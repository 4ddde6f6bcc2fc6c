//! Ring-buffered time series for runtime metrics

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::path::Path;

pub const GUI_FRAME_TIME: &str = "gui.frame_time_ms";
pub const AUDIO_LATENCY: &str = "audio.latency_ms";
pub const NET_RTT: &str = "net.rtt_ms";

const DEFAULT_CAPACITY: usize = 256;

/// Exponential moving average step
pub fn ema_step(prev: f64, new: f64, alpha: f64) -> f64 {
    alpha * new + (1.0 - alpha) * prev
}

/// A single metric sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub value: f64,
    pub ts_ms: i64,
}

/// Per-series ring buffer. Each series keeps at most `capacity` samples,
/// oldest dropped first.
#[derive(Debug, Clone)]
pub struct MetricStore {
    capacity: usize,
    series: BTreeMap<String, VecDeque<Sample>>,
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MetricStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: BTreeMap::new(),
        }
    }

    /// Append a sample to the named series. Non-finite values are dropped.
    pub fn push(&mut self, name: &str, value: f64) {
        if !value.is_finite() {
            return;
        }
        let ts_ms = chrono::Utc::now().timestamp_millis();
        let samples = self.series.entry(name.to_string()).or_default();
        samples.push_back(Sample { value, ts_ms });
        while samples.len() > self.capacity {
            samples.pop_front();
        }
    }

    pub fn len(&self, name: &str) -> usize {
        self.series.get(name).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(VecDeque::is_empty)
    }

    /// Latest value of a series, or `default` when it has no samples
    pub fn latest(&self, name: &str, default: f64) -> f64 {
        self.series
            .get(name)
            .and_then(|s| s.back())
            .map_or(default, |s| s.value)
    }

    /// EMA over the whole series, seeded with its oldest sample
    pub fn ema(&self, name: &str, alpha: f64, default: f64) -> f64 {
        let Some(samples) = self.series.get(name) else {
            return default;
        };
        let mut iter = samples.iter();
        let Some(first) = iter.next() else {
            return default;
        };
        iter.fold(first.value, |acc, s| ema_step(acc, s.value, alpha))
    }

    /// Most recent value per series
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.series
            .iter()
            .filter_map(|(name, s)| s.back().map(|last| (name.clone(), last.value)))
            .collect()
    }

    pub fn reset(&mut self) {
        self.series.clear();
    }

    /// Write every sample as `name,value,ts_ms` rows
    pub fn export_csv(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        writeln!(file, "name,value,ts_ms")?;
        for (name, samples) in &self.series {
            for s in samples {
                writeln!(file, "{},{},{}", name, s.value, s.ts_ms)?;
            }
        }
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_caps_series() {
        let mut store = MetricStore::new(4);
        for i in 0..10 {
            store.push(NET_RTT, i as f64);
        }
        assert_eq!(store.len(NET_RTT), 4);
        assert_eq!(store.latest(NET_RTT, 0.0), 9.0);
        // Oldest retained sample is 6
        assert_eq!(store.ema(NET_RTT, 1.0, 0.0), 9.0);
        assert_eq!(store.ema(NET_RTT, 0.0, 0.0), 6.0);
    }

    #[test]
    fn test_defaults_for_missing_series() {
        let store = MetricStore::default();
        assert_eq!(store.latest(AUDIO_LATENCY, 120.0), 120.0);
        assert_eq!(store.ema(AUDIO_LATENCY, 0.25, 16.7), 16.7);
        assert!(store.snapshot().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_ema_smoothing() {
        let mut store = MetricStore::default();
        store.push(GUI_FRAME_TIME, 10.0);
        store.push(GUI_FRAME_TIME, 20.0);
        // 0.5 * 20 + 0.5 * 10
        assert!((store.ema(GUI_FRAME_TIME, 0.5, 0.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_and_reset() {
        let mut store = MetricStore::default();
        store.push(NET_RTT, 40.0);
        store.push(NET_RTT, 55.0);
        store.push(AUDIO_LATENCY, 110.0);

        let snap = store.snapshot();
        assert_eq!(snap.get(NET_RTT), Some(&55.0));
        assert_eq!(snap.get(AUDIO_LATENCY), Some(&110.0));

        store.reset();
        assert!(store.is_empty());
    }

    #[test]
    fn test_export_csv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metrics.csv");

        let mut store = MetricStore::default();
        store.push(NET_RTT, 42.0);
        store.push(AUDIO_LATENCY, 100.5);
        store.export_csv(&path).expect("export");

        let content = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "name,value,ts_ms");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("audio.latency_ms,100.5,"));
        assert!(lines[2].starts_with("net.rtt_ms,42,"));
    }
}
