use crate::elevation::ElevationProvider;
use crate::telemetry::LogManager;
use std::future::Future;
use std::time::Duration;

/// Provider-side retry policy: re-asks for unresolved points with
/// exponential backoff before reporting them unavailable.
pub struct RetryingProvider<P> {
    inner: P,
    max_attempts: u32,
    base_delay: Duration,
    logger: LogManager,
}

impl<P: ElevationProvider> RetryingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self::with_policy(inner, 3, Duration::from_millis(100))
    }

    pub fn with_policy(inner: P, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
            logger: LogManager::new("elevation-retry"),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl<P: ElevationProvider> ElevationProvider for RetryingProvider<P> {
    fn ensure_ready(&self) -> impl Future<Output = ()> + Send {
        self.inner.ensure_ready()
    }

    async fn elevation(&self, lon: f64, lat: f64) -> Option<f64> {
        for attempt in 1..=self.max_attempts {
            if let Some(elevation) = self.inner.elevation(lon, lat).await {
                return Some(elevation);
            }
            if attempt < self.max_attempts {
                self.logger.detail(&format!(
                    "retrying ({:.6}, {:.6}) after attempt {}",
                    lon, lat, attempt
                ));
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }
        None
    }

    async fn batch_elevations(&self, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        let mut resolved = self.inner.batch_elevations(points).await;
        resolved.resize(points.len(), None);

        for attempt in 1..self.max_attempts {
            let pending: Vec<usize> = resolved
                .iter()
                .enumerate()
                .filter_map(|(idx, value)| value.is_none().then_some(idx))
                .collect();
            if pending.is_empty() {
                break;
            }
            tokio::time::sleep(self.backoff(attempt)).await;

            let query: Vec<(f64, f64)> = pending.iter().map(|&idx| points[idx]).collect();
            let fetched = self.inner.batch_elevations(&query).await;
            for (&idx, value) in pending.iter().zip(fetched) {
                resolved[idx] = value;
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::testing::FnTerrain;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried() {
        let calls = AtomicUsize::new(0);
        let terrain = FnTerrain::new(move |_, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                None
            } else {
                Some(12.0)
            }
        });
        let provider = RetryingProvider::new(terrain);

        assert_eq!(provider.elevation(0.0, 0.0).await, Some(12.0));
        assert_eq!(provider.inner().queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_gives_up_after_max_attempts() {
        let provider = RetryingProvider::with_policy(
            FnTerrain::new(|_, _| None),
            4,
            Duration::from_millis(10),
        );

        assert_eq!(provider.elevation(0.0, 0.0).await, None);
        assert_eq!(provider.inner().queries(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_retries_only_unresolved_points() {
        let provider = RetryingProvider::new(FnTerrain::new(|lon, _| {
            (lon >= 0.0).then_some(lon)
        }));

        let out = provider
            .batch_elevations(&[(1.0, 0.0), (-1.0, 0.0), (2.0, 0.0)])
            .await;
        assert_eq!(out, vec![Some(1.0), None, Some(2.0)]);
        // 3 initial queries plus 2 retries of the single failing point.
        assert_eq!(provider.inner().queries(), 5);
    }
}
