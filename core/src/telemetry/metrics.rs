use serde::Serialize;
use std::sync::Mutex;

/// Counters accumulated by an engine across its runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub samples_processed: usize,
    pub los_checks: usize,
    pub los_failures: usize,
    pub elevation_fallbacks: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_samples(&self, count: usize) {
        self.update(|m| m.samples_processed += count);
    }

    pub fn record_los_check(&self) {
        self.update(|m| m.los_checks += 1);
    }

    pub fn record_los_failure(&self) {
        self.update(|m| m.los_failures += 1);
    }

    pub fn record_elevation_fallback(&self) {
        self.update(|m| m.elevation_fallbacks += 1);
    }

    pub fn record_cache(&self, hits: usize, misses: usize) {
        self.update(|m| {
            m.cache_hits += hits;
            m.cache_misses += misses;
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let recorder = MetricsRecorder::new();
        recorder.record_los_check();
        recorder.record_los_check();
        recorder.record_los_failure();
        recorder.record_cache(3, 1);
        recorder.record_elevation_fallback();

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.los_checks, 2);
        assert_eq!(snapshot.los_failures, 1);
        assert_eq!(snapshot.cache_hits, 3);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.elevation_fallbacks, 1);
        assert_eq!(snapshot.samples_processed, 0);
    }
}
