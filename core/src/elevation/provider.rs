use crate::prelude::AnalysisError;
use crate::telemetry::LogManager;
use std::future::Future;
use std::sync::Arc;

/// Terrain elevation capability consumed by the analysis core.
///
/// `None` means the provider could not resolve the point even after its own
/// retry policy. A value of `Some(0.0)` is a real answer (sea level).
pub trait ElevationProvider: Send + Sync {
    /// Prepares the provider for its first query. Must be idempotent.
    fn ensure_ready(&self) -> impl Future<Output = ()> + Send {
        async {}
    }

    fn elevation(&self, lon: f64, lat: f64) -> impl Future<Output = Option<f64>> + Send;

    /// Order-preserving batch lookup. Providers with a real batch endpoint
    /// should override this; the default issues one query per point.
    fn batch_elevations(
        &self,
        points: &[(f64, f64)],
    ) -> impl Future<Output = Vec<Option<f64>>> + Send {
        async move {
            let mut elevations = Vec::with_capacity(points.len());
            for &(lon, lat) in points {
                elevations.push(self.elevation(lon, lat).await);
            }
            elevations
        }
    }
}

impl<P: ElevationProvider> ElevationProvider for Arc<P> {
    fn ensure_ready(&self) -> impl Future<Output = ()> + Send {
        (**self).ensure_ready()
    }

    fn elevation(&self, lon: f64, lat: f64) -> impl Future<Output = Option<f64>> + Send {
        (**self).elevation(lon, lat)
    }

    fn batch_elevations(
        &self,
        points: &[(f64, f64)],
    ) -> impl Future<Output = Vec<Option<f64>>> + Send {
        (**self).batch_elevations(points)
    }
}

/// Substitutes 0 m for an unresolved or non-finite elevation and logs it.
///
/// Returns the elevation and whether a substitution happened.
pub fn resolve_elevation(value: Option<f64>, lon: f64, lat: f64) -> (f64, bool) {
    match value {
        Some(elevation) if elevation.is_finite() => (elevation, false),
        _ => {
            let err = AnalysisError::ElevationUnavailable { lon, lat };
            LogManager::new("elevation").warn(&format!("{}, substituting 0 m", err));
            (0.0, true)
        }
    }
}
