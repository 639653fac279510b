use crate::elevation::{resolve_elevation, ElevationProvider};
use crate::prelude::{AnalysisError, Station, StationConfig, VisibilityResult};
use crate::telemetry::MetricsRecorder;

pub(crate) fn validate_stations(stations: &[StationConfig]) -> VisibilityResult<()> {
    if stations.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "at least one station is required".into(),
        ));
    }
    for (index, station) in stations.iter().enumerate() {
        let finite = station.lon.is_finite()
            && station.lat.is_finite()
            && station.height_offset.is_finite()
            && station.elevation.map_or(true, f64::is_finite);
        if !finite {
            return Err(AnalysisError::InvalidInput(format!(
                "station {} has non-finite coordinates",
                index
            )));
        }
    }
    Ok(())
}

/// Gives every station an absolute position: recorded elevation (or a
/// terrain lookup when missing) plus its height offset. Indices follow
/// input order.
pub(crate) async fn resolve_stations<P: ElevationProvider>(
    stations: &[StationConfig],
    provider: &P,
    metrics: &MetricsRecorder,
) -> Vec<Station> {
    let lookups: Vec<(f64, f64)> = stations
        .iter()
        .filter(|station| station.elevation.is_none())
        .map(|station| (station.lon, station.lat))
        .collect();
    let mut fetched = if lookups.is_empty() {
        Vec::new()
    } else {
        provider.batch_elevations(&lookups).await
    }
    .into_iter();

    stations
        .iter()
        .enumerate()
        .map(|(index, config)| {
            let ground = match config.elevation {
                Some(elevation) => elevation,
                None => {
                    let (elevation, substituted) =
                        resolve_elevation(fetched.next().flatten(), config.lon, config.lat);
                    if substituted {
                        metrics.record_elevation_fallback();
                    }
                    elevation
                }
            };
            config.resolve(index, ground)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::testing::FnTerrain;
    use crate::prelude::StationKind;

    #[tokio::test]
    async fn missing_elevation_is_looked_up_once_per_station() {
        let terrain = FnTerrain::new(|lon, _| Some(lon * 100.0));
        let metrics = MetricsRecorder::new();
        let configs = vec![
            StationConfig::new(StationKind::GroundControl, 1.0, 0.0, 2.0),
            StationConfig::new(StationKind::Observer, 2.0, 0.0, 1.5).with_elevation(7.0),
            StationConfig::new(StationKind::Repeater, 3.0, 0.0, 10.0),
        ];

        let stations = resolve_stations(&configs, &terrain, &metrics).await;

        assert_eq!(terrain.queries(), 2);
        let alts: Vec<f64> = stations.iter().map(|s| s.position.alt).collect();
        assert_eq!(alts, vec![102.0, 8.5, 310.0]);
        assert_eq!(
            stations.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn empty_or_non_finite_stations_are_rejected() {
        assert!(validate_stations(&[]).is_err());
        let bad = StationConfig::new(StationKind::Observer, f64::NAN, 0.0, 1.0);
        assert!(validate_stations(&[bad]).is_err());
    }
}
