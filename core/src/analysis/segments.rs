use crate::analysis::sampler::SamplePoint;
use crate::prelude::Point3D;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximal run of samples sharing the same visible/hidden state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilitySegment {
    pub coordinates: Vec<Point3D>,
    pub is_visible: bool,
    /// Union of the stations seeing any point of the segment.
    pub visible_from_stations: BTreeSet<usize>,
}

/// Segments built from a sample sequence plus the samples left out because
/// their run was a single point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentPlan {
    pub segments: Vec<VisibilitySegment>,
    pub dropped_points: usize,
}

pub struct SegmentBuilder;

impl SegmentBuilder {
    /// Splits `samples` wherever the aggregate visibility flips.
    ///
    /// Runs with fewer than two coordinates are not emitted, so a single
    /// sample caught between two transitions (or at either end of the path)
    /// contributes to `dropped_points` instead of a segment.
    pub fn build(samples: &[SamplePoint]) -> SegmentPlan {
        let mut plan = SegmentPlan::default();
        let mut current: Option<VisibilitySegment> = None;

        for sample in samples {
            let visible = sample.is_visible();
            let continues = current
                .as_ref()
                .is_some_and(|segment| segment.is_visible == visible);

            if !continues {
                if let Some(finished) = current.take() {
                    Self::emit(&mut plan, finished);
                }
                current = Some(VisibilitySegment {
                    coordinates: Vec::new(),
                    is_visible: visible,
                    visible_from_stations: BTreeSet::new(),
                });
            }

            if let Some(segment) = current.as_mut() {
                segment.coordinates.push(sample.position);
                if let Some(stations) = &sample.visible_from {
                    segment.visible_from_stations.extend(stations.iter().copied());
                }
            }
        }

        if let Some(finished) = current {
            Self::emit(&mut plan, finished);
        }
        plan
    }

    fn emit(plan: &mut SegmentPlan, segment: VisibilitySegment) {
        if segment.coordinates.len() >= 2 {
            plan.segments.push(segment);
        } else {
            plan.dropped_points += segment.coordinates.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(visibility: &[&[usize]]) -> Vec<SamplePoint> {
        visibility
            .iter()
            .enumerate()
            .map(|(idx, stations)| SamplePoint {
                position: Point3D::new(0.0, idx as f64 * 0.001, 100.0),
                distance_from_start: idx as f64 * 111.0,
                terrain_elevation: Some(0.0),
                visible_from: Some(stations.iter().copied().collect()),
            })
            .collect()
    }

    #[test]
    fn uniform_visibility_yields_one_segment() {
        let plan = SegmentBuilder::build(&samples(&[&[0], &[0, 1], &[1]]));
        assert_eq!(plan.segments.len(), 1);
        assert!(plan.segments[0].is_visible);
        assert_eq!(plan.segments[0].coordinates.len(), 3);
        assert_eq!(
            plan.segments[0].visible_from_stations,
            BTreeSet::from([0, 1])
        );
        assert_eq!(plan.dropped_points, 0);
    }

    #[test]
    fn transitions_partition_samples_without_overlap() {
        let plan = SegmentBuilder::build(&samples(&[&[0], &[0], &[], &[], &[], &[1], &[1]]));
        let lens: Vec<usize> = plan.segments.iter().map(|s| s.coordinates.len()).collect();
        assert_eq!(lens, vec![2, 3, 2]);
        assert_eq!(
            plan.segments.iter().map(|s| s.is_visible).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        assert!(plan.segments[1].visible_from_stations.is_empty());
    }

    #[test]
    fn trailing_single_point_run_is_dropped() {
        let plan = SegmentBuilder::build(&samples(&[&[0], &[0], &[0], &[]]));
        assert_eq!(plan.segments.len(), 1);
        assert_eq!(plan.segments[0].coordinates.len(), 3);
        assert_eq!(plan.dropped_points, 1);
    }

    #[test]
    fn leading_and_interior_single_point_runs_are_dropped() {
        let plan = SegmentBuilder::build(&samples(&[&[], &[2], &[2], &[], &[2], &[2]]));
        assert_eq!(plan.segments.len(), 2);
        assert!(plan.segments.iter().all(|s| s.is_visible));
        assert_eq!(plan.dropped_points, 2);
    }

    #[test]
    fn empty_input_yields_no_segments() {
        assert_eq!(SegmentBuilder::build(&[]), SegmentPlan::default());
    }
}
