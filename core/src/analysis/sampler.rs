use crate::geo::{haversine_distance, interpolate, FlightPath};
use crate::prelude::{AnalysisError, Point3D, VisibilityResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_SAMPLE_INTERVAL: f64 = 10.0;

/// One point along the flight path.
///
/// Created by [`PathSampler`]; `terrain_elevation` and `visible_from` are
/// filled in by the engine's elevation and visibility phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub position: Point3D,
    pub distance_from_start: f64,
    pub terrain_elevation: Option<f64>,
    pub visible_from: Option<BTreeSet<usize>>,
}

impl SamplePoint {
    fn new(position: Point3D, distance_from_start: f64) -> Self {
        Self {
            position,
            distance_from_start,
            terrain_elevation: None,
            visible_from: None,
        }
    }

    /// Visible iff at least one station sees the point.
    pub fn is_visible(&self) -> bool {
        self.visible_from.as_ref().is_some_and(|set| !set.is_empty())
    }

    pub fn is_visible_from(&self, station: usize) -> bool {
        self.visible_from
            .as_ref()
            .is_some_and(|set| set.contains(&station))
    }
}

/// Densifies a flight path while keeping every original vertex.
#[derive(Debug, Clone, Copy)]
pub struct PathSampler {
    interval: f64,
}

impl PathSampler {
    pub fn new(interval: f64) -> VisibilityResult<Self> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "sample interval must be positive, got {}",
                interval
            )));
        }
        Ok(Self { interval })
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn sample(&self, path: &FlightPath) -> VisibilityResult<Vec<SamplePoint>> {
        self.sample_vertices(path.vertices())
    }

    pub fn sample_vertices(&self, vertices: &[Point3D]) -> VisibilityResult<Vec<SamplePoint>> {
        if vertices.len() < 2 {
            return Err(AnalysisError::InvalidInput(format!(
                "flight path needs at least 2 vertices, got {}",
                vertices.len()
            )));
        }

        let segment_lengths: Vec<f64> = vertices
            .windows(2)
            .map(|pair| haversine_distance(&pair[0], &pair[1]))
            .collect();
        let total_length: f64 = segment_lengths.iter().sum();
        let densify = (total_length / self.interval).ceil() as usize > vertices.len();

        let mut samples = Vec::with_capacity(vertices.len());
        let mut cumulative = 0.0;

        for (idx, (start, end)) in vertices.iter().zip(vertices.iter().skip(1)).enumerate() {
            let length = segment_lengths[idx];
            samples.push(SamplePoint::new(*start, cumulative));

            if densify {
                let inserted = ((length / self.interval).ceil() as usize).saturating_sub(1);
                for step in 1..=inserted {
                    let fraction = step as f64 / (inserted + 1) as f64;
                    samples.push(SamplePoint::new(
                        interpolate(start, end, fraction),
                        cumulative + length * fraction,
                    ));
                }
            }
            cumulative += length;
        }
        if let Some(last) = vertices.last() {
            samples.push(SamplePoint::new(*last, cumulative));
        }

        samples.sort_by(|a, b| a.distance_from_start.total_cmp(&b.distance_from_start));
        Ok(samples)
    }
}

impl Default for PathSampler {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn north_path(lat_end: f64) -> Vec<Point3D> {
        vec![Point3D::new(0.0, 0.0, 100.0), Point3D::new(0.0, lat_end, 200.0)]
    }

    #[test]
    fn long_segment_is_densified_evenly() {
        let sampler = PathSampler::default();
        let samples = sampler.sample_vertices(&north_path(0.01)).unwrap();

        // ~1112 m at 10 m spacing -> 112 slices, 111 inserted points.
        assert_eq!(samples.len(), 113);
        assert_eq!(samples[0].position, Point3D::new(0.0, 0.0, 100.0));
        assert_eq!(samples[112].position, Point3D::new(0.0, 0.01, 200.0));

        let mid = &samples[56];
        assert!((mid.position.alt - 150.0).abs() < 1e-9);
    }

    #[test]
    fn distances_are_monotonic_and_end_at_total_length() {
        let vertices = vec![
            Point3D::new(0.0, 0.0, 50.0),
            Point3D::new(0.001, 0.0, 50.0),
            Point3D::new(0.001, 0.002, 80.0),
            Point3D::new(0.0, 0.002, 80.0),
        ];
        let samples = PathSampler::new(7.5).unwrap().sample_vertices(&vertices).unwrap();

        assert!(samples
            .windows(2)
            .all(|pair| pair[1].distance_from_start >= pair[0].distance_from_start));
        let total = crate::geo::line_length(&vertices);
        let last = samples.last().unwrap().distance_from_start;
        assert!((last - total).abs() < 1e-6);
        for vertex in &vertices {
            assert!(samples.iter().any(|s| s.position == *vertex));
        }
    }

    #[test]
    fn short_path_keeps_only_vertices() {
        // ~11 m path with a 10 m interval needs 2 samples; 2 vertices suffice.
        let samples = PathSampler::default()
            .sample_vertices(&north_path(0.0001))
            .unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(PathSampler::new(0.0).is_err());
        assert!(PathSampler::new(f64::NAN).is_err());
        let err = PathSampler::default()
            .sample_vertices(&[Point3D::new(0.0, 0.0, 0.0)])
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn visibility_helpers_treat_unset_as_hidden() {
        let mut sample = SamplePoint::new(Point3D::new(0.0, 0.0, 0.0), 0.0);
        assert!(!sample.is_visible());
        sample.visible_from = Some(BTreeSet::from([2]));
        assert!(sample.is_visible());
        assert!(sample.is_visible_from(2));
        assert!(!sample.is_visible_from(0));
    }
}
