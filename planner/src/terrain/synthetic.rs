use anyhow::ensure;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use viscore::geo::EARTH_RADIUS_M;
use viscore::ElevationProvider;

/// Offline terrain models used to exercise the core without DEM tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TerrainConfig {
    Flat {
        #[serde(default)]
        elevation: f64,
    },
    /// Elevation steps from `base` to `base + height` once a point lies more
    /// than `distance_m` north of `origin_lat`.
    Ridge {
        origin_lat: f64,
        distance_m: f64,
        #[serde(default)]
        base: f64,
        height: f64,
    },
    /// Seeded Gaussian hills scattered around a centre point.
    Hills {
        seed: u64,
        count: usize,
        center_lon: f64,
        center_lat: f64,
        radius_m: f64,
        max_height: f64,
        #[serde(default)]
        base: f64,
    },
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig::Flat { elevation: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Hill {
    lon: f64,
    lat: f64,
    height: f64,
    sigma_m: f64,
}

#[derive(Debug, Clone)]
pub struct SyntheticTerrain {
    config: TerrainConfig,
    hills: Vec<Hill>,
}

fn meters_per_degree() -> f64 {
    EARTH_RADIUS_M * std::f64::consts::PI / 180.0
}

fn build_hills(
    seed: u64,
    count: usize,
    center_lon: f64,
    center_lat: f64,
    radius_m: f64,
    max_height: f64,
) -> Vec<Hill> {
    let mut rng = StdRng::seed_from_u64(seed);
    let lat_scale = meters_per_degree();
    let lon_scale = lat_scale * center_lat.to_radians().cos().max(1e-6);

    (0..count)
        .map(|_| {
            let bearing = rng.gen_range(0.0..std::f64::consts::TAU);
            let range = radius_m * rng.gen_range(0.0f64..1.0).sqrt();
            Hill {
                lon: center_lon + range * bearing.sin() / lon_scale,
                lat: center_lat + range * bearing.cos() / lat_scale,
                height: rng.gen_range(0.2..1.0) * max_height,
                sigma_m: rng.gen_range(0.05..0.25) * radius_m,
            }
        })
        .collect()
}

impl SyntheticTerrain {
    pub fn from_config(config: &TerrainConfig) -> anyhow::Result<Self> {
        let hills = match *config {
            TerrainConfig::Flat { elevation } => {
                ensure!(elevation.is_finite(), "flat terrain elevation must be finite");
                Vec::new()
            }
            TerrainConfig::Ridge {
                distance_m, height, ..
            } => {
                ensure!(
                    distance_m.is_finite() && height.is_finite(),
                    "ridge terrain needs finite distance and height"
                );
                Vec::new()
            }
            TerrainConfig::Hills {
                seed,
                count,
                center_lon,
                center_lat,
                radius_m,
                max_height,
                ..
            } => {
                ensure!(radius_m > 0.0, "hill radius must be positive");
                ensure!(max_height >= 0.0, "hill height must not be negative");
                build_hills(seed, count, center_lon, center_lat, radius_m, max_height)
            }
        };
        Ok(Self {
            config: config.clone(),
            hills,
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn sample(&self, lon: f64, lat: f64) -> f64 {
        match self.config {
            TerrainConfig::Flat { elevation } => elevation,
            TerrainConfig::Ridge {
                origin_lat,
                distance_m,
                base,
                height,
            } => {
                if (lat - origin_lat) * meters_per_degree() > distance_m {
                    base + height
                } else {
                    base
                }
            }
            TerrainConfig::Hills { base, .. } => {
                let lat_scale = meters_per_degree();
                base + self
                    .hills
                    .iter()
                    .map(|hill| {
                        let lon_scale = lat_scale * hill.lat.to_radians().cos().max(1e-6);
                        let dx = (lon - hill.lon) * lon_scale;
                        let dy = (lat - hill.lat) * lat_scale;
                        let d2 = dx * dx + dy * dy;
                        hill.height * (-d2 / (2.0 * hill.sigma_m * hill.sigma_m)).exp()
                    })
                    .sum::<f64>()
            }
        }
    }
}

impl ElevationProvider for SyntheticTerrain {
    async fn elevation(&self, lon: f64, lat: f64) -> Option<f64> {
        Some(self.sample(lon, lat))
    }

    async fn batch_elevations(&self, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        points
            .iter()
            .map(|&(lon, lat)| Some(self.sample(lon, lat)))
            .collect()
    }
}
