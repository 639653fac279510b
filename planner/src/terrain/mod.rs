pub mod synthetic;

pub use synthetic::{SyntheticTerrain, TerrainConfig};
