pub mod cache;
pub mod cached;
pub mod provider;
pub mod retry;

pub use cache::{CacheKey, CoordinatePrecision, ElevationCache, DEFAULT_CACHE_CAPACITY};
pub use cached::CachedProvider;
pub use provider::{resolve_elevation, ElevationProvider};
pub use retry::RetryingProvider;
