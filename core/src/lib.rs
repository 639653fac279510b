//! Terrain line-of-sight analysis for drone mission planning.
//!
//! Given a flight path and one or more ground stations, the engine samples
//! the path, resolves terrain through an injected [`ElevationProvider`],
//! tests every sample against every station and folds the results into
//! visible / hidden segments with coverage statistics.

pub mod analysis;
pub mod elevation;
pub mod geo;
pub mod overlay;
pub mod prelude;
pub mod telemetry;

pub use analysis::{
    AbortSignal, AnalysisOptions, AnalysisResult, ProfileResult, ProgressListener, RunControl,
    VisibilityEngine, VisibilitySegment,
};
pub use elevation::{ElevationCache, ElevationProvider};
pub use geo::FlightPath;
pub use prelude::{
    AltitudeMode, AnalysisError, AnalysisPhase, Point3D, Station, StationConfig, StationKind,
    VisibilityResult,
};

use analysis::{LineOfSightChecker, ProfileAnalyzer, ProfileOptions, SamplingPreset};
use std::sync::Arc;

/// Runs a complete path analysis with a fresh, run-scoped elevation cache.
pub async fn analyze_flight_path_visibility<P: ElevationProvider + 'static>(
    path: &FlightPath,
    stations: &[StationConfig],
    provider: Arc<P>,
    options: &AnalysisOptions,
    progress: Option<&dyn ProgressListener>,
) -> VisibilityResult<AnalysisResult> {
    let engine = VisibilityEngine::new(provider, Arc::new(ElevationCache::default()));
    let control = RunControl {
        progress,
        abort: None,
    };
    engine.analyze_with(path, stations, options, control).await
}

/// Profile between two resolved stations using the station profile preset.
pub async fn check_station_to_station_los<P: ElevationProvider>(
    station_a: &Station,
    station_b: &Station,
    provider: &P,
) -> VisibilityResult<ProfileResult> {
    ProfileAnalyzer::new(ProfileOptions::STATION_PROFILE)?
        .analyze(&station_a.position, &station_b.position, provider)
        .await
}

/// Boolean LOS between two absolute points with the point-to-point preset.
pub async fn check_line_of_sight<P: ElevationProvider>(
    source: &Point3D,
    target: &Point3D,
    minimum_clearance: f64,
    provider: &P,
) -> VisibilityResult<bool> {
    LineOfSightChecker::new(SamplingPreset::LINE_OF_SIGHT, minimum_clearance)
        .check(source, target, provider)
        .await
}
