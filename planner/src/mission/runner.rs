use crate::mission::config::MissionConfig;
use crate::terrain::SyntheticTerrain;
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use viscore::analysis::{GridCoverage, RunControl};
use viscore::elevation::RetryingProvider;
use viscore::telemetry::MetricsSnapshot;
use viscore::{
    check_station_to_station_los, AnalysisPhase, AnalysisResult, ElevationCache, VisibilityEngine,
};

#[derive(Debug, Clone, Serialize)]
pub struct StationLink {
    pub from: usize,
    pub to: usize,
    pub clear: bool,
    pub obstruction_distance_m: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissionReport {
    pub name: String,
    pub analysis: AnalysisResult,
    pub station_links: Vec<StationLink>,
    pub grid: Option<GridCoverage>,
    pub metrics: MetricsSnapshot,
}

/// Runs missions against synthetic terrain, sharing one elevation cache
/// across every mission it executes.
#[derive(Clone)]
pub struct Runner {
    cache: Arc<ElevationCache>,
}

impl Runner {
    pub fn new(cache: Arc<ElevationCache>) -> Self {
        Self { cache }
    }

    pub async fn execute(&self, mission: &MissionConfig) -> anyhow::Result<MissionReport> {
        let path = mission.flight_path()?;
        let terrain = SyntheticTerrain::from_config(&mission.terrain)
            .context("building synthetic terrain")?;
        log::info!("[{}] terrain {:?}", mission.name, terrain.config());
        let provider = Arc::new(RetryingProvider::new(terrain));
        let engine = VisibilityEngine::new(provider.clone(), self.cache.clone());

        let listener = |phase: AnalysisPhase, percent: f64| {
            log::debug!("[{}] {:?} {:.0}%", mission.name, phase, percent);
        };
        let analysis = engine
            .analyze_with(
                &path,
                &mission.stations,
                &mission.analysis,
                RunControl::default().with_progress(&listener),
            )
            .await
            .with_context(|| format!("analyzing mission {}", mission.name))?;

        let mut station_links = Vec::new();
        for (i, from) in analysis.stations.iter().enumerate() {
            for to in &analysis.stations[i + 1..] {
                let profile = check_station_to_station_los(from, to, provider.as_ref())
                    .await
                    .with_context(|| {
                        format!("checking stations {} and {}", from.index, to.index)
                    })?;
                station_links.push(StationLink {
                    from: from.index,
                    to: to.index,
                    clear: profile.clear,
                    obstruction_distance_m: profile.obstruction_distance_m,
                });
            }
        }

        let grid = match &mission.grid {
            Some(grid) => Some(
                engine
                    .analyze_grid(
                        &grid.bounds,
                        &mission.stations,
                        &grid.options,
                        RunControl::default(),
                    )
                    .await
                    .context("analyzing grid coverage")?,
            ),
            None => None,
        };

        Ok(MissionReport {
            name: mission.name.clone(),
            analysis,
            station_links,
            grid,
            metrics: engine.metrics(),
        })
    }
}
