// Core screening exports
pub mod classifier;
pub mod fingerprint;
pub mod screener;
pub mod summary;

pub use classifier::{Classification, ClassifyError, ResponseClassifier, DEFAULT_CHECK_TYPE};
pub use fingerprint::{normalize, QueryError};
pub use screener::{Screener, ScreeningError, ScreeningPolicy, CACHE_TTL_HOURS, STORE_TIMEOUT_SECS};
pub use summary::{ScreeningStatus, StatusSummary};
