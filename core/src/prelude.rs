use serde::{Deserialize, Serialize};

/// Geographic position with altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub lon: f64,
    pub lat: f64,
    pub alt: f64,
}

impl Point3D {
    pub fn new(lon: f64, lat: f64, alt: f64) -> Self {
        Self { lon, lat, alt }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite() && self.alt.is_finite()
    }

    pub fn with_alt(self, alt: f64) -> Self {
        Self { alt, ..self }
    }
}

/// How the altitude stored on a flight path is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AltitudeMode {
    /// Sea-level referenced; used unchanged.
    #[default]
    Absolute,
    /// Height above the terrain under each sample.
    RelativeToTerrain,
    /// Constant height above ground, resolved like `RelativeToTerrain`.
    TerrainFollowing,
}

impl AltitudeMode {
    /// Resolves a path altitude to an absolute one given the terrain below it.
    pub fn resolve(self, path_alt: f64, terrain: f64) -> f64 {
        match self {
            AltitudeMode::Absolute => path_alt,
            AltitudeMode::RelativeToTerrain | AltitudeMode::TerrainFollowing => {
                terrain + path_alt
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StationKind {
    GroundControl,
    Observer,
    Repeater,
}

/// A user-placed station before its absolute altitude is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub kind: StationKind,
    pub lon: f64,
    pub lat: f64,
    /// Recorded ground elevation; looked up from terrain when absent.
    #[serde(default)]
    pub elevation: Option<f64>,
    /// Antenna / eye height above ground.
    #[serde(default)]
    pub height_offset: f64,
}

impl StationConfig {
    pub fn new(kind: StationKind, lon: f64, lat: f64, height_offset: f64) -> Self {
        Self {
            kind,
            lon,
            lat,
            elevation: None,
            height_offset,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// Builds the run-scoped station once ground elevation is known.
    pub fn resolve(&self, index: usize, ground: f64) -> Station {
        Station {
            kind: self.kind,
            position: Point3D::new(self.lon, self.lat, ground + self.height_offset),
            index,
        }
    }
}

/// Station with an absolute position, immutable for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub kind: StationKind,
    pub position: Point3D,
    pub index: usize,
}

/// Phases reported to progress listeners, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisPhase {
    Stations,
    Sampling,
    Elevation,
    Visibility,
    Segments,
}

/// Common error type for visibility analysis.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("elevation unavailable at ({lon}, {lat})")]
    ElevationUnavailable { lon: f64, lat: f64 },
    #[error("analysis aborted")]
    Aborted,
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type VisibilityResult<T> = Result<T, AnalysisError>;

pub(crate) fn ensure_finite(point: &Point3D, what: &str) -> VisibilityResult<()> {
    if point.is_finite() {
        Ok(())
    } else {
        Err(AnalysisError::InvalidInput(format!(
            "{} has non-finite coordinates ({}, {}, {})",
            what, point.lon, point.lat, point.alt
        )))
    }
}
