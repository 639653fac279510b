pub mod distance;
pub mod path;

pub use distance::{haversine_distance, interpolate, line_length, EARTH_RADIUS_M};
pub use path::FlightPath;
