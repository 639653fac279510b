//! Area coverage: the path LOS primitive applied to a regular grid of cells.

use crate::analysis::control::RunControl;
use crate::analysis::engine::{visible_stations_batch, VisibilityEngine, VISIBILITY_BATCH_SIZE};
use crate::analysis::line_of_sight::{
    LineOfSightChecker, SamplingPreset, DEFAULT_MINIMUM_CLEARANCE,
};
use crate::analysis::stations::{resolve_stations, validate_stations};
use crate::elevation::{resolve_elevation, ElevationProvider};
use crate::geo::EARTH_RADIUS_M;
use crate::prelude::{
    AnalysisError, AnalysisPhase, Point3D, Station, StationConfig, VisibilityResult,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cells beyond this count are refused rather than queued.
pub const MAX_GRID_CELLS: usize = 250_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GridBounds {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    fn validate(&self) -> VisibilityResult<()> {
        let finite = [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.min_lon >= self.max_lon || self.min_lat >= self.max_lat {
            return Err(AnalysisError::InvalidInput(format!(
                "invalid grid bounds {:?}",
                self
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOptions {
    /// Cell edge length in meters.
    pub cell_size: f64,
    /// Height above terrain of the target placed at each cell centre.
    pub target_height: f64,
    pub minimum_clearance: f64,
    pub sampling: SamplingPreset,
    pub batch_size: usize,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            cell_size: 100.0,
            target_height: 0.0,
            minimum_clearance: DEFAULT_MINIMUM_CLEARANCE,
            sampling: SamplingPreset::LINE_OF_SIGHT,
            batch_size: VISIBILITY_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCoverage {
    pub bounds: GridBounds,
    pub cell_size: f64,
    /// Row 0 is the southernmost row; values count the stations seeing the cell.
    pub visible_counts: Array2<u8>,
    pub stations: Vec<Station>,
    pub coverage_percentage: f64,
}

impl GridCoverage {
    pub fn rows(&self) -> usize {
        self.visible_counts.nrows()
    }

    pub fn cols(&self) -> usize {
        self.visible_counts.ncols()
    }
}

struct GridLayout {
    rows: usize,
    cols: usize,
    lat_step: f64,
    lon_step: f64,
}

impl GridLayout {
    fn new(bounds: &GridBounds, cell_size: f64) -> VisibilityResult<Self> {
        let meters_per_degree = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        let mid_lat = ((bounds.min_lat + bounds.max_lat) / 2.0).to_radians();
        let lat_step = cell_size / meters_per_degree;
        let lon_step = cell_size / (meters_per_degree * mid_lat.cos().max(1e-6));

        let rows = (((bounds.max_lat - bounds.min_lat) / lat_step).ceil() as usize).max(1);
        let cols = (((bounds.max_lon - bounds.min_lon) / lon_step).ceil() as usize).max(1);
        if rows.saturating_mul(cols) > MAX_GRID_CELLS {
            return Err(AnalysisError::InvalidInput(format!(
                "grid of {}x{} cells exceeds the {} cell limit",
                rows, cols, MAX_GRID_CELLS
            )));
        }
        Ok(Self {
            rows,
            cols,
            lat_step,
            lon_step,
        })
    }

    fn centre(&self, bounds: &GridBounds, row: usize, col: usize) -> (f64, f64) {
        (
            bounds.min_lon + (col as f64 + 0.5) * self.lon_step,
            bounds.min_lat + (row as f64 + 0.5) * self.lat_step,
        )
    }
}

impl<P: ElevationProvider + 'static> VisibilityEngine<P> {
    /// Counts, for every grid cell, the stations with clear line of sight to
    /// a target standing `target_height` above the cell centre.
    pub async fn analyze_grid(
        &self,
        bounds: &GridBounds,
        stations: &[StationConfig],
        options: &GridOptions,
        control: RunControl<'_>,
    ) -> VisibilityResult<GridCoverage> {
        bounds.validate()?;
        validate_stations(stations)?;
        if !options.cell_size.is_finite() || options.cell_size <= 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "cell size must be positive, got {}",
                options.cell_size
            )));
        }
        if options.batch_size == 0 {
            return Err(AnalysisError::InvalidInput("batch size must be at least 1".into()));
        }
        let layout = GridLayout::new(bounds, options.cell_size)?;
        control.check_abort()?;
        self.provider.ensure_ready().await;

        let stations: Arc<[Station]> =
            resolve_stations(stations, &self.terrain, &self.metrics).await.into();

        let cells: Vec<(usize, usize)> = (0..layout.rows)
            .flat_map(|row| (0..layout.cols).map(move |col| (row, col)))
            .collect();
        let total = cells.len();
        let checker = LineOfSightChecker::new(options.sampling, options.minimum_clearance);
        let mut counts = Array2::<u8>::zeros((layout.rows, layout.cols));
        let mut progress = control.tracker(AnalysisPhase::Visibility);

        for (batch_idx, batch) in cells.chunks(options.batch_size).enumerate() {
            control.check_abort()?;
            let centres: Vec<(f64, f64)> = batch
                .iter()
                .map(|&(row, col)| layout.centre(bounds, row, col))
                .collect();
            let elevations = self.terrain.batch_elevations(&centres).await;

            let targets = centres
                .iter()
                .enumerate()
                .map(|(idx, &(lon, lat))| {
                    let (ground, substituted) =
                        resolve_elevation(elevations.get(idx).copied().flatten(), lon, lat);
                    if substituted {
                        self.metrics.record_elevation_fallback();
                    }
                    (idx, Point3D::new(lon, lat, ground + options.target_height))
                })
                .collect();

            let resolved =
                visible_stations_batch(&self.terrain, checker, &stations, &self.metrics, targets)
                    .await;
            for (idx, visible) in resolved {
                let (row, col) = batch[idx];
                counts[[row, col]] = visible.len().min(u8::MAX as usize) as u8;
            }

            let done = (batch_idx * options.batch_size + batch.len()).min(total);
            progress.report(done, total);
            tokio::task::yield_now().await;
        }

        let covered = counts.iter().filter(|&&count| count > 0).count();
        let coverage_percentage = covered as f64 / total as f64 * 100.0;
        self.logger.record(&format!(
            "grid {}x{}: {:.1}% of cells visible",
            layout.rows, layout.cols, coverage_percentage
        ));

        Ok(GridCoverage {
            bounds: *bounds,
            cell_size: options.cell_size,
            visible_counts: counts,
            stations: stations.to_vec(),
            coverage_percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::testing::{flat, FnTerrain};
    use crate::elevation::ElevationCache;
    use crate::prelude::StationKind;

    fn station() -> StationConfig {
        StationConfig::new(StationKind::Observer, 0.0, 0.0, 10.0).with_elevation(0.0)
    }

    #[tokio::test]
    async fn flat_grid_is_fully_covered() {
        let engine =
            VisibilityEngine::new(Arc::new(flat(0.0)), Arc::new(ElevationCache::default()));
        let bounds = GridBounds::new(0.0, 0.0, 0.005, 0.005);

        let coverage = engine
            .analyze_grid(&bounds, &[station()], &GridOptions::default(), RunControl::default())
            .await
            .unwrap();

        // ~556 m square at 100 m cells.
        assert_eq!((coverage.rows(), coverage.cols()), (6, 6));
        assert!(coverage.visible_counts.iter().all(|&count| count == 1));
        assert_eq!(coverage.coverage_percentage, 100.0);
    }

    #[tokio::test]
    async fn wall_hides_cells_behind_it() {
        // 100 m wall running east-west just north of the station.
        let terrain = FnTerrain::new(|_, lat| {
            Some(if (0.0015..0.0025).contains(&lat) { 100.0 } else { 0.0 })
        });
        let engine = VisibilityEngine::new(Arc::new(terrain), Arc::new(ElevationCache::default()));
        let bounds = GridBounds::new(-0.0005, 0.0, 0.0005, 0.005);
        let options = GridOptions {
            cell_size: 50.0,
            ..Default::default()
        };

        let coverage = engine
            .analyze_grid(&bounds, &[station()], &options, RunControl::default())
            .await
            .unwrap();

        let rows = coverage.rows();
        assert!(coverage.visible_counts.row(0).iter().all(|&c| c == 1));
        assert!(coverage.visible_counts.row(rows - 1).iter().all(|&c| c == 0));
        assert!(coverage.coverage_percentage > 0.0 && coverage.coverage_percentage < 100.0);
    }

    #[tokio::test]
    async fn repeated_grid_is_served_from_the_cache() {
        let provider = Arc::new(flat(0.0));
        let engine = VisibilityEngine::new(provider.clone(), Arc::new(ElevationCache::default()));
        let bounds = GridBounds::new(0.0, 0.0, 0.005, 0.005);

        for _ in 0..2 {
            engine
                .analyze_grid(&bounds, &[station()], &GridOptions::default(), RunControl::default())
                .await
                .unwrap();
        }

        let snapshot = engine.metrics();
        assert_eq!(snapshot.cache_misses, provider.queries());
        assert!(snapshot.cache_hits >= snapshot.cache_misses);
    }

    #[tokio::test]
    async fn oversized_or_inverted_grids_are_rejected() {
        let engine =
            VisibilityEngine::new(Arc::new(flat(0.0)), Arc::new(ElevationCache::default()));
        let inverted = GridBounds::new(1.0, 1.0, 0.0, 0.0);
        assert!(engine
            .analyze_grid(&inverted, &[station()], &GridOptions::default(), RunControl::default())
            .await
            .is_err());

        let huge = GridBounds::new(0.0, 0.0, 10.0, 10.0);
        let options = GridOptions {
            cell_size: 10.0,
            ..Default::default()
        };
        let err = engine
            .analyze_grid(&huge, &[station()], &options, RunControl::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }
}
