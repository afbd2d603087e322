// Service exports
pub mod analysis;
pub mod atlas;
pub mod memory;
pub mod postgres;
pub mod redis_store;
pub mod store;

pub use analysis::{AnalysisClient, AnalysisRequest, Enricher, EnrichmentError, PersonData};
pub use atlas::{AtlasClient, AtlasCredentials, AtlasError, BearerToken, RiskCheckRequest, ScreeningProvider, TokenCache};
pub use memory::MemoryCacheStore;
pub use postgres::PostgresCacheStore;
pub use redis_store::{CacheKey, RedisCacheStore};
pub use store::{CacheError, CacheStore};
