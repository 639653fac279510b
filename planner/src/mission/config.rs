use crate::terrain::TerrainConfig;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use viscore::analysis::{GridBounds, GridOptions};
use viscore::{AnalysisOptions, FlightPath, Point3D, StationConfig, StationKind};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridConfig {
    pub bounds: GridBounds,
    #[serde(default)]
    pub options: GridOptions,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MissionConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Inline flight path vertices.
    #[serde(default)]
    pub path: Option<FlightPath>,
    /// GeoJSON file holding the flight path, relative to the mission file.
    #[serde(default)]
    pub path_geojson: Option<PathBuf>,
    pub stations: Vec<StationConfig>,
    #[serde(default)]
    pub analysis: AnalysisOptions,
    #[serde(default)]
    pub terrain: TerrainConfig,
    #[serde(default)]
    pub grid: Option<GridConfig>,
}

fn default_name() -> String {
    "mission".to_string()
}

impl MissionConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading mission config {}", path_ref.display()))?;
        let mut config: MissionConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing mission config {}", path_ref.display()))?;

        if let (Some(geojson), Some(dir)) = (config.path_geojson.as_mut(), path_ref.parent()) {
            if geojson.is_relative() {
                *geojson = dir.join(&*geojson);
            }
        }
        Ok(config)
    }

    /// Two waypoints 1.1 km due north over a 200 m step ridge at 500 m.
    pub fn demo() -> Self {
        let path = FlightPath::new(vec![
            Point3D::new(0.0, 0.0, 100.0),
            Point3D::new(0.0, 0.01, 100.0),
        ])
        .ok();
        Self {
            name: "ridge-demo".to_string(),
            path,
            path_geojson: None,
            stations: vec![
                StationConfig::new(StationKind::GroundControl, 0.0, 0.0, 50.0),
                StationConfig::new(StationKind::Observer, 0.0005, 0.006, 2.0),
            ],
            analysis: AnalysisOptions::default(),
            terrain: TerrainConfig::Ridge {
                origin_lat: 0.0,
                distance_m: 500.0,
                base: 0.0,
                height: 200.0,
            },
            grid: None,
        }
    }

    pub fn with_overrides(mut self, sample_interval: Option<f64>, clearance: Option<f64>) -> Self {
        if let Some(interval) = sample_interval {
            self.analysis.sample_interval = interval;
        }
        if let Some(clearance) = clearance {
            self.analysis.minimum_clearance = clearance;
        }
        self
    }

    /// Resolves the flight path from the inline vertices or the GeoJSON file.
    pub fn flight_path(&self) -> anyhow::Result<FlightPath> {
        match (&self.path, &self.path_geojson) {
            (Some(path), None) => Ok(path.clone()),
            (None, Some(file)) => {
                let contents = fs::read_to_string(file)
                    .with_context(|| format!("reading flight path {}", file.display()))?;
                let document: serde_json::Value = serde_json::from_str(&contents)
                    .with_context(|| format!("parsing flight path {}", file.display()))?;
                FlightPath::from_geojson(&document)
                    .with_context(|| format!("reading LineString from {}", file.display()))
            }
            (Some(_), Some(_)) => bail!("mission sets both `path` and `path_geojson`"),
            (None, None) => bail!("mission has no flight path"),
        }
    }
}
