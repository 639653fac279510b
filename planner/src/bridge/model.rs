use crate::mission::runner::{MissionReport, StationLink};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use viscore::overlay::{GeoJsonOverlay, MapOverlayRenderer};

/// What the HTTP bridge hands to map clients: headline figures plus the
/// styled overlay layer of the latest mission.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReportModel {
    pub mission: Option<String>,
    pub status: String,
    pub coverage_percentage: f64,
    pub visible_length: f64,
    pub total_length: f64,
    pub station_links: Vec<StationLinkView>,
    pub overlay: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationLinkView {
    pub from: usize,
    pub to: usize,
    pub clear: bool,
}

impl From<&StationLink> for StationLinkView {
    fn from(link: &StationLink) -> Self {
        Self {
            from: link.from,
            to: link.to,
            clear: link.clear,
        }
    }
}

impl ReportModel {
    pub fn from_report(report: &MissionReport) -> Self {
        let mut overlay = GeoJsonOverlay::new();
        overlay.draw_segments(&report.name, &report.analysis.segments);

        Self {
            mission: Some(report.name.clone()),
            status: "ok".to_string(),
            coverage_percentage: report.analysis.coverage_percentage,
            visible_length: report.analysis.visible_length,
            total_length: report.analysis.total_length,
            station_links: report.station_links.iter().map(StationLinkView::from).collect(),
            overlay: overlay.layer(&report.name).cloned().unwrap_or(Value::Null),
        }
    }
}
