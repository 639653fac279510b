//! Batched, cooperative flight-path visibility analysis.
//!
//! A run is strictly phased: stations, sampling, terrain, visibility, then
//! segments and statistics. Between batches the engine checks the abort
//! signal and yields to the runtime. LOS checks inside one visibility batch
//! run as separate tasks but are written back by sample index, so output
//! order never depends on scheduling.

use crate::analysis::control::RunControl;
use crate::analysis::line_of_sight::{
    LineOfSightChecker, SamplingPreset, DEFAULT_MINIMUM_CLEARANCE,
};
use crate::analysis::sampler::{PathSampler, SamplePoint, DEFAULT_SAMPLE_INTERVAL};
use crate::analysis::segments::{SegmentBuilder, VisibilitySegment};
use crate::analysis::stations::{resolve_stations, validate_stations};
use crate::analysis::statistics::{StationStats, StatisticsAggregator};
use crate::elevation::{resolve_elevation, CachedProvider, ElevationCache, ElevationProvider};
use crate::geo::FlightPath;
use crate::prelude::{
    AltitudeMode, AnalysisError, AnalysisPhase, Point3D, Station, StationConfig, VisibilityResult,
};
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

pub const ELEVATION_BATCH_SIZE: usize = 100;
pub const VISIBILITY_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub sample_interval: f64,
    pub minimum_clearance: f64,
    pub altitude_mode: AltitudeMode,
    pub sampling: SamplingPreset,
    pub elevation_batch_size: usize,
    pub visibility_batch_size: usize,
}

impl AnalysisOptions {
    pub fn validate(&self) -> VisibilityResult<()> {
        if !self.sample_interval.is_finite() || self.sample_interval <= 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "sample interval must be positive, got {}",
                self.sample_interval
            )));
        }
        if !self.minimum_clearance.is_finite() {
            return Err(AnalysisError::InvalidInput(
                "minimum clearance must be finite".into(),
            ));
        }
        if !self.sampling.meters_per_sample.is_finite() || self.sampling.meters_per_sample <= 0.0
        {
            return Err(AnalysisError::InvalidInput(
                "sampling preset needs a positive spacing".into(),
            ));
        }
        if self.elevation_batch_size == 0 || self.visibility_batch_size == 0 {
            return Err(AnalysisError::InvalidInput(
                "batch sizes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            minimum_clearance: DEFAULT_MINIMUM_CLEARANCE,
            altitude_mode: AltitudeMode::default(),
            sampling: SamplingPreset::PATH_VISIBILITY,
            elevation_batch_size: ELEVATION_BATCH_SIZE,
            visibility_batch_size: VISIBILITY_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub segments: Vec<VisibilitySegment>,
    pub total_length: f64,
    pub visible_length: f64,
    pub coverage_percentage: f64,
    pub per_station_stats: Vec<StationStats>,
    pub stations: Vec<Station>,
    pub samples: Vec<SamplePoint>,
    /// Samples belonging to single-point runs that produced no segment.
    pub dropped_sample_points: usize,
    pub elapsed_ms: f64,
}

/// Orchestrates sampling, terrain lookup and LOS checks for flight paths.
///
/// The cache is injected so callers choose between a per-run cache and a
/// long-lived one shared by successive analyses over the same terrain.
pub struct VisibilityEngine<P> {
    pub(crate) provider: Arc<P>,
    /// Cache-fronted view of `provider`; every terrain lookup goes through it.
    pub(crate) terrain: Arc<CachedProvider<Arc<P>>>,
    pub(crate) metrics: Arc<MetricsRecorder>,
    pub(crate) logger: LogManager,
}

impl<P: ElevationProvider + 'static> VisibilityEngine<P> {
    pub fn new(provider: Arc<P>, cache: Arc<ElevationCache>) -> Self {
        let metrics = Arc::new(MetricsRecorder::new());
        let terrain = Arc::new(
            CachedProvider::new(Arc::clone(&provider), cache).with_metrics(metrics.clone()),
        );
        Self {
            provider,
            terrain,
            metrics,
            logger: LogManager::new("visibility-engine"),
        }
    }

    pub fn cache(&self) -> &Arc<ElevationCache> {
        self.terrain.cache()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn analyze(
        &self,
        path: &FlightPath,
        stations: &[StationConfig],
        options: &AnalysisOptions,
    ) -> VisibilityResult<AnalysisResult> {
        self.analyze_with(path, stations, options, RunControl::default())
            .await
    }

    pub async fn analyze_with(
        &self,
        path: &FlightPath,
        stations: &[StationConfig],
        options: &AnalysisOptions,
        control: RunControl<'_>,
    ) -> VisibilityResult<AnalysisResult> {
        let started = Instant::now();
        options.validate()?;
        validate_stations(stations)?;
        control.check_abort()?;

        self.logger.record(&format!(
            "analyzing path of {} vertices against {} stations",
            path.len(),
            stations.len()
        ));
        self.provider.ensure_ready().await;

        let mut progress = control.tracker(AnalysisPhase::Stations);
        let stations: Arc<[Station]> =
            resolve_stations(stations, &self.terrain, &self.metrics).await.into();
        progress.report(1, 1);

        control.check_abort()?;
        let mut progress = control.tracker(AnalysisPhase::Sampling);
        let mut samples = PathSampler::new(options.sample_interval)?.sample(path)?;
        self.metrics.record_samples(samples.len());
        progress.report(1, 1);

        self.resolve_terrain(&mut samples, options, &control).await?;
        for sample in samples.iter_mut() {
            let terrain = sample.terrain_elevation.unwrap_or(0.0);
            sample.position.alt = options.altitude_mode.resolve(sample.position.alt, terrain);
        }
        self.resolve_visibility(&mut samples, &stations, options, &control)
            .await?;

        control.check_abort()?;
        let mut progress = control.tracker(AnalysisPhase::Segments);
        let plan = SegmentBuilder::build(&samples);
        let stats = StatisticsAggregator::compute(&samples, &plan.segments, &stations);
        progress.report(1, 1);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        self.logger.record(&format!(
            "{} samples, {} segments, coverage {:.1}% in {:.0} ms",
            samples.len(),
            plan.segments.len(),
            stats.coverage_percentage,
            elapsed_ms
        ));

        Ok(AnalysisResult {
            segments: plan.segments,
            total_length: stats.total_length,
            visible_length: stats.visible_length,
            coverage_percentage: stats.coverage_percentage,
            per_station_stats: stats.per_station,
            stations: stations.to_vec(),
            samples,
            dropped_sample_points: plan.dropped_points,
            elapsed_ms,
        })
    }

    async fn resolve_terrain(
        &self,
        samples: &mut [SamplePoint],
        options: &AnalysisOptions,
        control: &RunControl<'_>,
    ) -> VisibilityResult<()> {
        let total = samples.len();
        let mut done = 0;
        let mut progress = control.tracker(AnalysisPhase::Elevation);

        for chunk in samples.chunks_mut(options.elevation_batch_size) {
            control.check_abort()?;
            let points: Vec<(f64, f64)> = chunk
                .iter()
                .map(|sample| (sample.position.lon, sample.position.lat))
                .collect();
            let elevations = self.terrain.batch_elevations(&points).await;

            for (idx, sample) in chunk.iter_mut().enumerate() {
                let (elevation, substituted) = resolve_elevation(
                    elevations.get(idx).copied().flatten(),
                    sample.position.lon,
                    sample.position.lat,
                );
                if substituted {
                    self.metrics.record_elevation_fallback();
                }
                sample.terrain_elevation = Some(elevation);
            }

            done += chunk.len();
            self.logger
                .detail(&format!("terrain resolved for {}/{} samples", done, total));
            progress.report(done, total);
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    async fn resolve_visibility(
        &self,
        samples: &mut [SamplePoint],
        stations: &Arc<[Station]>,
        options: &AnalysisOptions,
        control: &RunControl<'_>,
    ) -> VisibilityResult<()> {
        let checker = LineOfSightChecker::new(options.sampling, options.minimum_clearance);
        let total = samples.len();
        let mut progress = control.tracker(AnalysisPhase::Visibility);

        for start in (0..total).step_by(options.visibility_batch_size) {
            control.check_abort()?;
            let end = (start + options.visibility_batch_size).min(total);

            let mut targets = Vec::with_capacity(end - start);
            for (idx, sample) in samples[start..end].iter_mut().enumerate() {
                sample.visible_from = Some(BTreeSet::new());
                targets.push((start + idx, sample.position));
            }

            let resolved = visible_stations_batch(
                &self.terrain,
                checker,
                stations,
                &self.metrics,
                targets,
            )
            .await;
            for (idx, visible) in resolved {
                samples[idx].visible_from = Some(visible);
            }

            self.logger
                .detail(&format!("visibility resolved for {}/{} samples", end, total));
            progress.report(end, total);
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

/// Tests every target against every station, one task per target.
///
/// Returns `(slot, visible station indices)` in completion order. A failed
/// check only marks that station as not visible; a task that dies leaves its
/// slot out of the output.
pub(crate) async fn visible_stations_batch<P: ElevationProvider + 'static>(
    provider: &Arc<P>,
    checker: LineOfSightChecker,
    stations: &Arc<[Station]>,
    metrics: &Arc<MetricsRecorder>,
    targets: Vec<(usize, Point3D)>,
) -> Vec<(usize, BTreeSet<usize>)> {
    let mut tasks = JoinSet::new();
    for (slot, target) in targets {
        let provider = Arc::clone(provider);
        let stations = Arc::clone(stations);
        let metrics = Arc::clone(metrics);

        tasks.spawn(async move {
            let mut visible = BTreeSet::new();
            for station in stations.iter() {
                metrics.record_los_check();
                match checker
                    .check(&station.position, &target, provider.as_ref())
                    .await
                {
                    Ok(true) => {
                        visible.insert(station.index);
                    }
                    Ok(false) => {}
                    Err(err) => {
                        metrics.record_los_failure();
                        LogManager::new("visibility-engine").warn(&format!(
                            "LOS check from station {} to sample {} failed: {}",
                            station.index, slot, err
                        ));
                    }
                }
            }
            (slot, visible)
        });
    }

    let mut resolved = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => resolved.push(result),
            Err(err) => {
                metrics.record_los_failure();
                let err = AnalysisError::Internal(format!("LOS task did not complete: {}", err));
                LogManager::new("visibility-engine").warn(&err.to_string());
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::control::AbortSignal;
    use crate::elevation::testing::{flat, FnTerrain};
    use crate::prelude::StationKind;
    use crate::telemetry::MetricsRecorder;
    use std::sync::Mutex;

    fn north_path(alt: f64) -> FlightPath {
        FlightPath::new(vec![
            Point3D::new(0.0, 0.0, alt),
            Point3D::new(0.0, 0.01, alt),
        ])
        .unwrap()
    }

    fn ground_station() -> StationConfig {
        StationConfig::new(StationKind::GroundControl, 0.0, 0.0, 50.0).with_elevation(0.0)
    }

    #[tokio::test]
    async fn empty_station_list_is_rejected_before_sampling() {
        let provider = Arc::new(flat(0.0));
        let engine = VisibilityEngine::new(provider.clone(), Arc::new(ElevationCache::default()));

        let err = engine
            .analyze(&north_path(100.0), &[], &AnalysisOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::InvalidInput(_)));
        assert_eq!(provider.queries(), 0);
        assert_eq!(engine.metrics().samples_processed, 0);
    }

    #[tokio::test]
    async fn terrain_following_altitude_is_added_to_ground() {
        let provider = Arc::new(flat(30.0));
        let engine = VisibilityEngine::new(provider, Arc::new(ElevationCache::default()));
        let options = AnalysisOptions {
            altitude_mode: AltitudeMode::TerrainFollowing,
            ..Default::default()
        };

        let result = engine
            .analyze(&north_path(100.0), &[ground_station()], &options)
            .await
            .unwrap();

        assert!(result.samples.iter().all(|s| (s.position.alt - 130.0).abs() < 1e-9));
        assert!(result.samples.iter().all(|s| s.terrain_elevation == Some(30.0)));
    }

    #[tokio::test]
    async fn progress_runs_through_phases_in_order() {
        let provider = Arc::new(flat(0.0));
        let engine = VisibilityEngine::new(provider, Arc::new(ElevationCache::default()));
        let seen = Mutex::new(Vec::new());
        let listener = |phase: AnalysisPhase, percent: f64| {
            seen.lock().unwrap().push((phase, percent));
        };

        engine
            .analyze_with(
                &north_path(100.0),
                &[ground_station()],
                &AnalysisOptions::default(),
                RunControl::default().with_progress(&listener),
            )
            .await
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|pair| pair[0].0 <= pair[1].0));
        assert!(seen
            .windows(2)
            .filter(|pair| pair[0].0 == pair[1].0)
            .all(|pair| pair[0].1 < pair[1].1));
        for phase in [
            AnalysisPhase::Stations,
            AnalysisPhase::Sampling,
            AnalysisPhase::Elevation,
            AnalysisPhase::Visibility,
            AnalysisPhase::Segments,
        ] {
            assert!(seen.contains(&(phase, 100.0)), "missing 100% for {:?}", phase);
        }
    }

    #[tokio::test]
    async fn aborted_run_reports_cancellation() {
        let provider = Arc::new(flat(0.0));
        let engine = VisibilityEngine::new(provider, Arc::new(ElevationCache::default()));
        let signal = AbortSignal::new();
        let trigger = signal.clone();
        let listener = move |phase: AnalysisPhase, _percent: f64| {
            if phase == AnalysisPhase::Elevation {
                trigger.abort();
            }
        };

        let result = engine
            .analyze_with(
                &north_path(100.0),
                &[ground_station()],
                &AnalysisOptions::default(),
                RunControl::default()
                    .with_progress(&listener)
                    .with_abort(&signal),
            )
            .await;

        assert_eq!(result, Err(AnalysisError::Aborted));
        // Aborted after the first terrain batch, before any LOS check.
        assert_eq!(engine.metrics().los_checks, 0);
    }

    #[tokio::test]
    async fn unavailable_terrain_is_counted_and_substituted() {
        let provider = Arc::new(FnTerrain::new(|_, lat| (lat < 0.005).then_some(0.0)));
        let engine = VisibilityEngine::new(provider, Arc::new(ElevationCache::default()));

        let result = engine
            .analyze(&north_path(100.0), &[ground_station()], &AnalysisOptions::default())
            .await
            .unwrap();

        assert!(engine.metrics().elevation_fallbacks > 0);
        assert!(result.samples.iter().all(|s| s.terrain_elevation == Some(0.0)));
        assert!((result.coverage_percentage - 100.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn shared_cache_is_reused_across_runs() {
        let provider = Arc::new(flat(0.0));
        let cache = Arc::new(ElevationCache::default());
        let first = VisibilityEngine::new(provider.clone(), cache.clone());
        first
            .analyze(&north_path(100.0), &[ground_station()], &AnalysisOptions::default())
            .await
            .unwrap();
        assert!(!cache.is_empty());

        let first_queries = provider.queries();
        assert!(first.metrics().cache_misses > 0);

        let second = VisibilityEngine::new(provider.clone(), cache);
        second
            .analyze(&north_path(120.0), &[ground_station()], &AnalysisOptions::default())
            .await
            .unwrap();
        let snapshot = second.metrics();
        assert_eq!(snapshot.cache_misses, 0);
        assert!(snapshot.cache_hits > snapshot.samples_processed);
        // Sight-line terrain is served from the cache too.
        assert_eq!(provider.queries(), first_queries);
    }

    #[tokio::test]
    async fn sight_line_lookups_go_through_the_cache() {
        let provider = Arc::new(flat(0.0));
        let cache = Arc::new(ElevationCache::default());
        // Off the path, so sight-line samples land in cells the path never fills.
        let station =
            StationConfig::new(StationKind::Observer, 0.002, 0.005, 10.0).with_elevation(0.0);
        let engine = VisibilityEngine::new(provider.clone(), cache.clone());

        let result = engine
            .analyze(&north_path(100.0), &[station], &AnalysisOptions::default())
            .await
            .unwrap();

        let snapshot = engine.metrics();
        assert!(snapshot.cache_misses > result.samples.len());
        assert_eq!(snapshot.cache_misses, provider.queries());
        assert!(cache.len() > result.samples.len());
    }

    #[tokio::test]
    async fn failed_checks_are_scored_not_visible() {
        let provider = Arc::new(flat(0.0));
        let metrics = Arc::new(MetricsRecorder::new());
        let stations: Arc<[Station]> = vec![ground_station().resolve(0, 0.0)].into();
        let checker = LineOfSightChecker::new(SamplingPreset::PATH_VISIBILITY, 1.0);
        let targets = vec![
            (0, Point3D::new(0.0, 0.005, 100.0)),
            (1, Point3D::new(f64::NAN, 0.005, 100.0)),
        ];

        let mut resolved =
            visible_stations_batch(&provider, checker, &stations, &metrics, targets).await;
        resolved.sort_by_key(|(slot, _)| *slot);

        assert_eq!(resolved.len(), 2);
        assert!(resolved[0].1.contains(&0));
        assert!(resolved[1].1.is_empty());
        let snapshot = metrics.snapshot();
        assert_eq!((snapshot.los_checks, snapshot.los_failures), (2, 1));
    }

    #[tokio::test]
    async fn crashed_check_does_not_abort_the_run() {
        // Terrain lookups strictly between the path and the station blow up.
        let provider = Arc::new(FnTerrain::new(|lon, _| {
            if lon > 0.0001 && lon < 0.0009 {
                panic!("terrain tile missing at lon {}", lon);
            }
            Some(0.0)
        }));
        let station =
            StationConfig::new(StationKind::Observer, 0.001, 0.0, 50.0).with_elevation(0.0);
        let engine = VisibilityEngine::new(provider, Arc::new(ElevationCache::default()));

        let result = engine
            .analyze(&north_path(100.0), &[station], &AnalysisOptions::default())
            .await
            .unwrap();

        assert!(result
            .samples
            .iter()
            .all(|s| s.visible_from.as_ref().map_or(false, |v| !v.contains(&0))));
        assert_eq!(result.coverage_percentage, 0.0);
        assert_eq!(engine.metrics().los_failures, result.samples.len());
    }

    #[tokio::test]
    async fn invalid_options_are_rejected() {
        let engine =
            VisibilityEngine::new(Arc::new(flat(0.0)), Arc::new(ElevationCache::default()));
        let options = AnalysisOptions {
            sample_interval: -1.0,
            ..Default::default()
        };
        let err = engine
            .analyze(&north_path(100.0), &[ground_station()], &options)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }
}
