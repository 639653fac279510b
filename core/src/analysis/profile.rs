//! Full terrain profile between two points, used for station-to-station and
//! grid-cell checks where the caller wants to see where the line is blocked.

use crate::elevation::{resolve_elevation, ElevationProvider};
use crate::geo::haversine_distance;
use crate::prelude::{ensure_finite, AnalysisError, Point3D, VisibilityResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOptions {
    /// Added to the target altitude; larger than the path default.
    pub minimum_clearance: f64,
    /// Spacing between profile samples in meters.
    pub sample_distance: f64,
}

impl ProfileOptions {
    pub const STATION_PROFILE: Self = Self {
        minimum_clearance: 3.0,
        sample_distance: 10.0,
    };
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self::STATION_PROFILE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub distance: f64,
    pub terrain_elevation: f64,
    pub line_of_sight_altitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResult {
    pub clear: bool,
    /// Fraction (0-1) along the line of the first blocking sample.
    pub obstruction_fraction: Option<f64>,
    pub obstruction_distance_m: Option<f64>,
    pub profile: Vec<ProfilePoint>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileAnalyzer {
    options: ProfileOptions,
}

impl ProfileAnalyzer {
    pub fn new(options: ProfileOptions) -> VisibilityResult<Self> {
        if !options.sample_distance.is_finite() || options.sample_distance <= 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "profile sample distance must be positive, got {}",
                options.sample_distance
            )));
        }
        if !options.minimum_clearance.is_finite() {
            return Err(AnalysisError::InvalidInput(
                "profile clearance must be finite".into(),
            ));
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> ProfileOptions {
        self.options
    }

    /// Samples terrain every `sample_distance` meters (endpoints included,
    /// fetched in one batch) and locates the first interior sample where
    /// terrain rises above the sight line.
    pub async fn analyze<P: ElevationProvider>(
        &self,
        source: &Point3D,
        target: &Point3D,
        provider: &P,
    ) -> VisibilityResult<ProfileResult> {
        ensure_finite(source, "profile source")?;
        ensure_finite(target, "profile target")?;

        let total = haversine_distance(source, target);
        let steps = ((total / self.options.sample_distance).ceil() as usize).max(1);
        let target_alt = target.alt + self.options.minimum_clearance;

        let fractions: Vec<f64> = (0..=steps).map(|i| i as f64 / steps as f64).collect();
        let points: Vec<(f64, f64)> = fractions
            .iter()
            .map(|&t| {
                (
                    source.lon + (target.lon - source.lon) * t,
                    source.lat + (target.lat - source.lat) * t,
                )
            })
            .collect();
        let elevations = provider.batch_elevations(&points).await;

        let mut result = ProfileResult {
            clear: true,
            obstruction_fraction: None,
            obstruction_distance_m: None,
            profile: Vec::with_capacity(points.len()),
        };

        for (i, (&t, &(lon, lat))) in fractions.iter().zip(points.iter()).enumerate() {
            let (terrain, _) = resolve_elevation(elevations.get(i).copied().flatten(), lon, lat);
            let point = ProfilePoint {
                distance: total * t,
                terrain_elevation: terrain,
                line_of_sight_altitude: source.alt + (target_alt - source.alt) * t,
            };

            let interior = i > 0 && i < steps;
            if interior && result.clear && point.terrain_elevation > point.line_of_sight_altitude
            {
                result.clear = false;
                result.obstruction_fraction = Some(t);
                result.obstruction_distance_m = Some(point.distance);
            }
            result.profile.push(point);
        }

        Ok(result)
    }
}
