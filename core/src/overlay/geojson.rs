use crate::analysis::VisibilitySegment;
use crate::overlay::MapOverlayRenderer;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const VISIBLE_STROKE: &str = "#00c853";
pub const HIDDEN_STROKE: &str = "#d50000";

/// Keeps one GeoJSON FeatureCollection of styled line features per layer.
#[derive(Debug, Clone, Default)]
pub struct GeoJsonOverlay {
    layers: BTreeMap<String, Value>,
}

impl GeoJsonOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, layer_id: &str) -> Option<&Value> {
        self.layers.get(layer_id)
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    fn feature(segment: &VisibilitySegment) -> Value {
        let coordinates: Vec<[f64; 3]> = segment
            .coordinates
            .iter()
            .map(|point| [point.lon, point.lat, point.alt])
            .collect();
        let stations: Vec<usize> = segment.visible_from_stations.iter().copied().collect();

        json!({
            "type": "Feature",
            "properties": {
                "visible": segment.is_visible,
                "stations": stations,
                "stroke": if segment.is_visible { VISIBLE_STROKE } else { HIDDEN_STROKE },
                "dashed": !segment.is_visible,
            },
            "geometry": {
                "type": "LineString",
                "coordinates": coordinates,
            }
        })
    }
}

impl MapOverlayRenderer for GeoJsonOverlay {
    fn draw_segments(&mut self, layer_id: &str, segments: &[VisibilitySegment]) {
        let features: Vec<Value> = segments.iter().map(Self::feature).collect();
        self.layers.insert(
            layer_id.to_string(),
            json!({ "type": "FeatureCollection", "features": features }),
        );
    }

    fn clear_segments(&mut self, layer_id: &str) {
        self.layers.remove(layer_id);
    }
}
