//! TTL cache for fetched pages.
//!
//! Pages are keyed by the exact query that produced them (time window, page
//! index, user filter), so two requests for the same window within the TTL
//! share one upstream fetch. Entries expire wholesale after the TTL; there is
//! no partial refresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;

use crate::tracestore::RunRecord;

use super::Window;

/// Identity of one cached page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    page: usize,
    user: String,
}

impl CacheKey {
    pub fn new(window: Window, page: usize, user_filter: Option<&str>) -> Self {
        Self {
            start: window.start,
            end: window.end,
            page,
            // Unfiltered queries share a sentinel so they never collide with
            // a real user id.
            user: user_filter.map_or_else(|| "all".to_string(), str::to_string),
        }
    }
}

/// Shared TTL page cache. Cloning is cheap; clones share the same store.
#[derive(Debug, Clone)]
pub struct PageCache {
    inner: Cache<CacheKey, Arc<Vec<RunRecord>>>,
}

impl PageCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Vec<RunRecord>>> {
        self.inner.get(key).await
    }

    pub async fn put(&self, key: CacheKey, records: Vec<RunRecord>) {
        self.inner.insert(key, Arc::new(records)).await;
    }
}
