use crate::prelude::{ensure_finite, AnalysisError, Point3D, VisibilityResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Validated flight path polyline (at least two finite vertices).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point3D>", into = "Vec<Point3D>")]
pub struct FlightPath {
    vertices: Vec<Point3D>,
}

impl FlightPath {
    pub fn new(vertices: Vec<Point3D>) -> VisibilityResult<Self> {
        if vertices.len() < 2 {
            return Err(AnalysisError::InvalidInput(format!(
                "flight path needs at least 2 vertices, got {}",
                vertices.len()
            )));
        }
        for vertex in &vertices {
            ensure_finite(vertex, "flight path vertex")?;
        }
        Ok(Self { vertices })
    }

    /// Reads the first feature of a GeoJSON document, which must be a LineString.
    ///
    /// Accepts a FeatureCollection, a single Feature, or a bare geometry.
    /// Positions without a third ordinate get altitude 0.
    pub fn from_geojson(document: &Value) -> VisibilityResult<Self> {
        let geometry = match document.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => document
                .get("features")
                .and_then(Value::as_array)
                .and_then(|features| features.first())
                .and_then(|feature| feature.get("geometry"))
                .ok_or_else(|| {
                    AnalysisError::InvalidInput("feature collection has no features".into())
                })?,
            Some("Feature") => document
                .get("geometry")
                .ok_or_else(|| AnalysisError::InvalidInput("feature has no geometry".into()))?,
            _ => document,
        };

        match geometry.get("type").and_then(Value::as_str) {
            Some("LineString") => {}
            other => {
                return Err(AnalysisError::InvalidInput(format!(
                    "flight path must be a LineString, got {}",
                    other.unwrap_or("nothing")
                )))
            }
        }

        let positions = geometry
            .get("coordinates")
            .and_then(Value::as_array)
            .ok_or_else(|| AnalysisError::InvalidInput("LineString has no coordinates".into()))?;

        let vertices = positions
            .iter()
            .map(parse_position)
            .collect::<VisibilityResult<Vec<_>>>()?;
        Self::new(vertices)
    }

    pub fn vertices(&self) -> &[Point3D] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

impl TryFrom<Vec<Point3D>> for FlightPath {
    type Error = AnalysisError;

    fn try_from(vertices: Vec<Point3D>) -> VisibilityResult<Self> {
        Self::new(vertices)
    }
}

impl From<FlightPath> for Vec<Point3D> {
    fn from(path: FlightPath) -> Self {
        path.vertices
    }
}

fn parse_position(position: &Value) -> VisibilityResult<Point3D> {
    let ordinates = position
        .as_array()
        .ok_or_else(|| AnalysisError::InvalidInput("position is not an array".into()))?;
    let ordinate = |idx: usize| ordinates.get(idx).and_then(Value::as_f64);

    match (ordinate(0), ordinate(1)) {
        (Some(lon), Some(lat)) => Ok(Point3D::new(lon, lat, ordinate(2).unwrap_or(0.0))),
        _ => Err(AnalysisError::InvalidInput(format!(
            "position {} lacks numeric lon/lat",
            position
        ))),
    }
}
