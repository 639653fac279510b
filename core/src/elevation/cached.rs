use crate::elevation::{ElevationCache, ElevationProvider};
use crate::telemetry::MetricsRecorder;
use std::future::Future;
use std::sync::Arc;

/// Fronts a provider with a shared [`ElevationCache`].
///
/// Only resolved elevations are cached; unavailable points are asked again
/// on the next lookup.
pub struct CachedProvider<P> {
    inner: P,
    cache: Arc<ElevationCache>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl<P: ElevationProvider> CachedProvider<P> {
    pub fn new(inner: P, cache: Arc<ElevationCache>) -> Self {
        Self {
            inner,
            cache,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cache(&self) -> &Arc<ElevationCache> {
        &self.cache
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn record(&self, hits: usize, misses: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache(hits, misses);
        }
    }
}

impl<P: ElevationProvider> ElevationProvider for CachedProvider<P> {
    fn ensure_ready(&self) -> impl Future<Output = ()> + Send {
        self.inner.ensure_ready()
    }

    async fn elevation(&self, lon: f64, lat: f64) -> Option<f64> {
        if let Some(hit) = self.cache.get(lon, lat) {
            self.record(1, 0);
            return Some(hit);
        }
        self.record(0, 1);
        let value = self.inner.elevation(lon, lat).await;
        if let Some(elevation) = value.filter(|e| e.is_finite()) {
            self.cache.set(lon, lat, elevation);
        }
        value
    }

    async fn batch_elevations(&self, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        let mut resolved: Vec<Option<f64>> = points
            .iter()
            .map(|&(lon, lat)| self.cache.get(lon, lat))
            .collect();

        let missing: Vec<usize> = resolved
            .iter()
            .enumerate()
            .filter_map(|(idx, value)| value.is_none().then_some(idx))
            .collect();
        self.record(points.len() - missing.len(), missing.len());

        if missing.is_empty() {
            return resolved;
        }

        let query: Vec<(f64, f64)> = missing.iter().map(|&idx| points[idx]).collect();
        let fetched = self.inner.batch_elevations(&query).await;

        for (&idx, value) in missing.iter().zip(fetched) {
            if let Some(elevation) = value.filter(|e| e.is_finite()) {
                let (lon, lat) = points[idx];
                self.cache.set(lon, lat, elevation);
            }
            resolved[idx] = value;
        }
        resolved
    }
}
