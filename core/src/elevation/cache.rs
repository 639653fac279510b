//! Bounded elevation cache keyed by quantized coordinates.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Decimal places kept when quantizing a coordinate into a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinatePrecision {
    /// 4 decimals, roughly an 11 m grid.
    #[default]
    Area,
    /// 6 decimals, roughly 0.11 m, for samples along a single sight line.
    Local,
}

impl CoordinatePrecision {
    pub fn decimals(self) -> i32 {
        match self {
            CoordinatePrecision::Area => 4,
            CoordinatePrecision::Local => 6,
        }
    }

    fn scale(self) -> f64 {
        10f64.powi(self.decimals())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lon: i64,
    lat: i64,
}

impl CacheKey {
    pub fn quantize(lon: f64, lat: f64, precision: CoordinatePrecision) -> Self {
        let scale = precision.scale();
        Self {
            lon: (lon * scale).round() as i64,
            lat: (lat * scale).round() as i64,
        }
    }
}

/// Thread-safe LRU map from quantized (lon, lat) to elevation in meters.
///
/// Entries are never rewritten with different data for the same key, so
/// sharing one instance between concurrent runs only risks duplicate writes.
pub struct ElevationCache {
    inner: Mutex<LruCache<CacheKey, f64>>,
    precision: CoordinatePrecision,
}

impl ElevationCache {
    pub fn new(capacity: usize) -> Self {
        Self::with_precision(capacity, CoordinatePrecision::Area)
    }

    pub fn with_precision(capacity: usize, precision: CoordinatePrecision) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            precision,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, f64>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn key(&self, lon: f64, lat: f64) -> CacheKey {
        CacheKey::quantize(lon, lat, self.precision)
    }

    pub fn get(&self, lon: f64, lat: f64) -> Option<f64> {
        let key = self.key(lon, lat);
        self.lock().get(&key).copied()
    }

    /// Inserts an elevation, evicting the least recently used entry when full.
    pub fn set(&self, lon: f64, lat: f64, elevation: f64) {
        let key = self.key(lon, lat);
        self.lock().put(key, elevation);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn precision(&self) -> CoordinatePrecision {
        self.precision
    }
}

impl Default for ElevationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
