//! Single-page fetching with cache lookup and linear-backoff retry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::Config;
use crate::tracestore::{RunFilter, RunQuery, RunRecord, TraceStore};

use super::cache::{CacheKey, PageCache};

/// The time window a dashboard request covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Outcome of one page fetch. `success: false` means every attempt failed;
/// the records are then empty, and the page was not cached.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFetchResult {
    pub records: Vec<RunRecord>,
    pub success: bool,
}

/// Fetches pages from the trace store, consulting the cache first and
/// retrying transient failures with linearly increasing backoff.
#[derive(Clone)]
pub struct PageFetcher {
    store: Arc<dyn TraceStore>,
    cache: PageCache,
    project: String,
    pub(crate) page_size: usize,
    pub(crate) max_parallel: usize,
    retry_attempts: u32,
    backoff_unit: Duration,
}

impl PageFetcher {
    pub fn new(store: Arc<dyn TraceStore>, cache: PageCache, config: &Config) -> Self {
        Self {
            store,
            cache,
            project: config.trace_store.project.clone(),
            page_size: config.fetch.page_size,
            max_parallel: config.fetch.max_parallel_requests,
            retry_attempts: config.fetch.retry_attempts,
            backoff_unit: config.fetch.backoff_unit,
        }
    }

    /// Fetch one page. A cache hit bypasses the store entirely. On a miss,
    /// the store is tried up to `retry_attempts` times, waiting
    /// `backoff_unit * attempt` between attempts; only a successful response
    /// is cached. Exhausted retries yield an unsuccessful, empty result
    /// rather than an error so the paginator can decide what the failure
    /// means for the whole window.
    pub async fn fetch_page(
        &self,
        window: Window,
        page: usize,
        user_filter: Option<&str>,
    ) -> PageFetchResult {
        let key = CacheKey::new(window, page, user_filter);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(page, "page served from cache");
            return PageFetchResult {
                records: cached.as_ref().clone(),
                success: true,
            };
        }

        let filter = user_filter.map_or(RunFilter::RootOnly, RunFilter::user);
        let query = RunQuery {
            project: self.project.clone(),
            start_time: window.start,
            end_time: window.end,
            limit: self.page_size,
            offset: page * self.page_size,
            filter,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.list_runs(&query).await {
                Ok(records) => {
                    self.cache.put(key, records.clone()).await;
                    return PageFetchResult {
                        records,
                        success: true,
                    };
                }
                Err(e) => {
                    if attempt >= self.retry_attempts {
                        warn!(page, attempts = attempt, "page fetch failed, giving up: {e:#}");
                        return PageFetchResult {
                            records: Vec::new(),
                            success: false,
                        };
                    }
                    debug!(page, attempt, "page fetch failed, retrying: {e:#}");
                    tokio::time::sleep(self.backoff_unit * attempt).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedStore, test_config};

    fn window() -> Window {
        let end = Utc::now();
        Window {
            start: end - chrono::Duration::days(7),
            end,
        }
    }

    fn fetcher_over(store: Arc<ScriptedStore>) -> PageFetcher {
        let config = test_config();
        let cache = PageCache::new(config.cache.capacity, config.cache.ttl);
        PageFetcher::new(store, cache, &config)
    }

    #[test_log::test(tokio::test)]
    async fn repeated_fetch_hits_cache_and_returns_identical_records() {
        let store = Arc::new(ScriptedStore::with_pages(vec![ScriptedStore::page_of(5)]));
        let fetcher = fetcher_over(store.clone());
        let w = window();

        let first = fetcher.fetch_page(w, 0, None).await;
        let second = fetcher.fetch_page(w, 0, None).await;

        assert!(first.success);
        assert_eq!(first, second);
        assert_eq!(store.call_count(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn exhausted_retries_yield_empty_unsuccessful_result() {
        let store = Arc::new(ScriptedStore::always_failing());
        let fetcher = fetcher_over(store.clone());

        let result = fetcher.fetch_page(window(), 0, None).await;

        assert!(!result.success);
        assert!(result.records.is_empty());
        assert_eq!(store.call_count(), 3);
    }

    #[test_log::test(tokio::test)]
    async fn failed_pages_are_not_cached() {
        let store = Arc::new(ScriptedStore::always_failing());
        let fetcher = fetcher_over(store.clone());
        let w = window();

        fetcher.fetch_page(w, 0, None).await;
        fetcher.fetch_page(w, 0, None).await;

        // Two fetches, three attempts each.
        assert_eq!(store.call_count(), 6);
    }

    #[test_log::test(tokio::test)]
    async fn user_filter_replaces_root_only_filter() {
        let store = Arc::new(ScriptedStore::with_pages(vec![ScriptedStore::page_of(1)]));
        let fetcher = fetcher_over(store.clone());

        fetcher.fetch_page(window(), 0, Some("u42")).await;

        let queries = store.recorded_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].filter, RunFilter::user("u42"));
    }

    #[test_log::test(tokio::test)]
    async fn offset_is_page_times_page_size() {
        let store = Arc::new(ScriptedStore::with_pages(vec![
            ScriptedStore::page_of(100),
            ScriptedStore::page_of(100),
            ScriptedStore::page_of(100),
        ]));
        let fetcher = fetcher_over(store.clone());

        fetcher.fetch_page(window(), 2, None).await;

        let queries = store.recorded_queries();
        assert_eq!(queries[0].offset, 200);
        assert_eq!(queries[0].limit, 100);
    }
}
