//! Resilient page fetching: caching, retry, and bounded-parallel pagination
//! over the trace store.

pub mod cache;
pub mod fetcher;
pub mod paginator;

pub use cache::{CacheKey, PageCache};
pub use fetcher::{PageFetchResult, PageFetcher, Window};
