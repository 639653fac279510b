//! Boolean line-of-sight test between two points over sampled terrain.

use crate::elevation::{resolve_elevation, CacheKey, CoordinatePrecision, ElevationProvider};
use crate::geo::haversine_distance;
use crate::prelude::{ensure_finite, Point3D, VisibilityResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default clearance added to the target before testing obstruction.
pub const DEFAULT_MINIMUM_CLEARANCE: f64 = 1.0;

/// Adaptive sample count along a sight line: one sample per
/// `meters_per_sample`, clamped to `[min_samples, max_samples]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingPreset {
    pub meters_per_sample: f64,
    pub min_samples: usize,
    pub max_samples: usize,
}

impl SamplingPreset {
    /// Point-to-point checks.
    pub const LINE_OF_SIGHT: Self = Self {
        meters_per_sample: 50.0,
        min_samples: 5,
        max_samples: 20,
    };

    /// Per-sample checks along a flight path, where thousands run per analysis.
    pub const PATH_VISIBILITY: Self = Self {
        meters_per_sample: 100.0,
        min_samples: 5,
        max_samples: 15,
    };

    pub fn sample_count(&self, distance: f64) -> usize {
        let wanted = (distance / self.meters_per_sample).ceil();
        let wanted = if wanted.is_finite() && wanted > 0.0 {
            wanted as usize
        } else {
            0
        };
        wanted.clamp(self.min_samples.max(1), self.max_samples.max(self.min_samples).max(1))
    }
}

impl Default for SamplingPreset {
    fn default() -> Self {
        Self::LINE_OF_SIGHT
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineOfSightChecker {
    preset: SamplingPreset,
    minimum_clearance: f64,
}

impl LineOfSightChecker {
    pub fn new(preset: SamplingPreset, minimum_clearance: f64) -> Self {
        Self {
            preset,
            minimum_clearance,
        }
    }

    pub fn preset(&self) -> SamplingPreset {
        self.preset
    }

    pub fn minimum_clearance(&self) -> f64 {
        self.minimum_clearance
    }

    /// Returns whether `target` (raised by the minimum clearance) is visible
    /// from `source`. Stops at the first interior sample whose terrain rises
    /// above the sight line.
    pub async fn check<P: ElevationProvider>(
        &self,
        source: &Point3D,
        target: &Point3D,
        provider: &P,
    ) -> VisibilityResult<bool> {
        ensure_finite(source, "line-of-sight source")?;
        ensure_finite(target, "line-of-sight target")?;

        let distance = haversine_distance(source, target);
        if distance <= f64::EPSILON {
            return Ok(true);
        }

        let samples = self.preset.sample_count(distance);
        let target_alt = target.alt + self.minimum_clearance;
        let mut local: HashMap<CacheKey, f64> = HashMap::new();

        for i in 1..samples {
            let t = i as f64 / samples as f64;
            let lon = source.lon + (target.lon - source.lon) * t;
            let lat = source.lat + (target.lat - source.lat) * t;
            let sight_alt = source.alt + (target_alt - source.alt) * t;

            let key = CacheKey::quantize(lon, lat, CoordinatePrecision::Local);
            let terrain = match local.get(&key) {
                Some(&elevation) => elevation,
                None => {
                    let (elevation, _) =
                        resolve_elevation(provider.elevation(lon, lat).await, lon, lat);
                    local.insert(key, elevation);
                    elevation
                }
            };

            if terrain > sight_alt {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

impl Default for LineOfSightChecker {
    fn default() -> Self {
        Self::new(SamplingPreset::LINE_OF_SIGHT, DEFAULT_MINIMUM_CLEARANCE)
    }
}
