use crate::analysis::sampler::SamplePoint;
use crate::analysis::segments::VisibilitySegment;
use crate::geo::line_length;
use crate::prelude::Station;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStats {
    pub station_index: usize,
    pub visible_length: f64,
    pub coverage_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStatistics {
    pub total_length: f64,
    pub visible_length: f64,
    pub coverage_percentage: f64,
    pub per_station: Vec<StationStats>,
}

pub struct StatisticsAggregator;

impl StatisticsAggregator {
    pub fn compute(
        samples: &[SamplePoint],
        segments: &[VisibilitySegment],
        stations: &[Station],
    ) -> PathStatistics {
        let total_length = samples
            .last()
            .map(|sample| sample.distance_from_start)
            .unwrap_or(0.0);
        let visible_length: f64 = segments
            .iter()
            .filter(|segment| segment.is_visible)
            .map(|segment| line_length(&segment.coordinates))
            .sum();

        let per_station = stations
            .iter()
            .map(|station| {
                let length = Self::station_visible_length(samples, station.index);
                StationStats {
                    station_index: station.index,
                    visible_length: length,
                    coverage_percentage: coverage(length, total_length),
                }
            })
            .collect();

        PathStatistics {
            total_length,
            visible_length,
            coverage_percentage: coverage(visible_length, total_length),
            per_station,
        }
    }

    /// Sums the along-path distance covered by each contiguous run of samples
    /// the station can see.
    pub fn station_visible_length(samples: &[SamplePoint], station: usize) -> f64 {
        let mut length = 0.0;
        let mut run_start: Option<f64> = None;
        let mut previous = 0.0;

        for sample in samples {
            let distance = sample.distance_from_start;
            match (sample.is_visible_from(station), run_start) {
                (true, None) => run_start = Some(distance),
                (false, Some(start)) => {
                    length += previous - start;
                    run_start = None;
                }
                _ => {}
            }
            previous = distance;
        }
        if let Some(start) = run_start {
            length += previous - start;
        }
        length
    }
}

/// Percentage of `part` over `total`, 0 for an empty path, capped to [0, 100].
pub fn coverage(part: f64, total: f64) -> f64 {
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    (part / total * 100.0).clamp(0.0, 100.0)
}
