pub mod geojson;

pub use geojson::GeoJsonOverlay;

use crate::analysis::VisibilitySegment;

/// Presentation sink for visibility segments, one layer per analysis.
pub trait MapOverlayRenderer {
    fn draw_segments(&mut self, layer_id: &str, segments: &[VisibilitySegment]);
    fn clear_segments(&mut self, layer_id: &str);
}
