pub mod control;
pub mod engine;
pub mod grid;
pub mod line_of_sight;
pub mod profile;
pub mod sampler;
pub mod segments;
pub mod statistics;

mod stations;

pub use control::{AbortSignal, ProgressListener, RunControl};
pub use engine::{AnalysisOptions, AnalysisResult, VisibilityEngine};
pub use grid::{GridBounds, GridCoverage, GridOptions};
pub use line_of_sight::{LineOfSightChecker, SamplingPreset};
pub use profile::{ProfileAnalyzer, ProfileOptions, ProfilePoint, ProfileResult};
pub use sampler::{PathSampler, SamplePoint};
pub use segments::{SegmentBuilder, SegmentPlan, VisibilitySegment};
pub use statistics::{PathStatistics, StationStats, StatisticsAggregator};
