//! Bounded-parallel pagination over the trace store.
//!
//! Page 0 is fetched synchronously to establish whether the window has any
//! data at all. Further pages are fetched concurrently, never more than
//! `max_parallel_requests` in flight, ramping up one page at a time so a
//! short or empty page stops submission before speculative pages are issued.

use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::errors::{Error, Result};
use crate::tracestore::RunRecord;

use super::fetcher::{PageFetcher, Window};

impl PageFetcher {
    /// Fetch every page of the window and concatenate the results. Pages
    /// fetched in the same wave land in completion order.
    ///
    /// A failed page 0 aborts the whole request, since there is no way to
    /// distinguish "no data" from "store down" without it. Failures on later
    /// pages degrade to an empty page and end pagination, returning whatever
    /// accumulated so far.
    #[instrument(skip(self), fields(user = user_filter.unwrap_or("all")))]
    pub async fn fetch_all(
        &self,
        window: Window,
        user_filter: Option<&str>,
    ) -> Result<Vec<RunRecord>> {
        let first = self.fetch_page(window, 0, user_filter).await;
        if !first.success {
            return Err(Error::PipelineFailure);
        }

        let mut records = first.records;
        if records.len() < self.page_size {
            debug!(total = records.len(), "single short page, window exhausted");
            return Ok(records);
        }

        let mut tasks: JoinSet<PageTask> = JoinSet::new();
        let mut next_page = 1;
        let mut exhausted = false;

        // Probe one page past the full first page before fanning out, so a
        // two-page window costs exactly two fetches.
        self.spawn_page(&mut tasks, window, next_page, user_filter);
        next_page += 1;

        while let Some(joined) = tasks.join_next().await {
            let task = joined.map_err(|_| Error::Internal {
                operation: "join page fetch task".to_string(),
            })?;

            if task.result.records.is_empty() {
                exhausted = true;
            } else {
                let short = task.result.records.len() < self.page_size;
                records.extend(task.result.records);
                if short {
                    exhausted = true;
                }
            }

            if !exhausted {
                while tasks.len() < self.max_parallel {
                    self.spawn_page(&mut tasks, window, next_page, user_filter);
                    next_page += 1;
                }
            }
        }

        debug!(total = records.len(), pages = next_page, "pagination complete");
        Ok(records)
    }

    fn spawn_page(
        &self,
        tasks: &mut JoinSet<PageTask>,
        window: Window,
        page: usize,
        user_filter: Option<&str>,
    ) {
        let fetcher = self.clone();
        let user = user_filter.map(str::to_string);
        tasks.spawn(async move {
            let result = fetcher.fetch_page(window, page, user.as_deref()).await;
            PageTask { result }
        });
    }
}

struct PageTask {
    result: super::fetcher::PageFetchResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::PageCache;
    use crate::test_utils::{ScriptedStore, test_config};
    use chrono::Utc;
    use std::sync::Arc;

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
    async fn short_first_page_stops_after_one_fetch() {
        let store = Arc::new(ScriptedStore::with_pages(vec![ScriptedStore::page_of(40)]));
        let fetcher = fetcher_over(store.clone());

        let records = fetcher.fetch_all(window(), None).await.unwrap();

        assert_eq!(records.len(), 40);
        assert_eq!(store.call_count(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn full_page_then_empty_costs_exactly_two_fetches() {
        let store = Arc::new(ScriptedStore::with_pages(vec![
            ScriptedStore::page_of(100),
            Vec::new(),
        ]));
        let fetcher = fetcher_over(store.clone());

        let records = fetcher.fetch_all(window(), None).await.unwrap();

        assert_eq!(records.len(), 100);
        assert_eq!(store.call_count(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn short_second_page_ends_pagination() {
        let store = Arc::new(ScriptedStore::with_pages(vec![
            ScriptedStore::page_of(100),
            ScriptedStore::page_of(50),
        ]));
        let fetcher = fetcher_over(store.clone());

        let records = fetcher.fetch_all(window(), None).await.unwrap();

        assert_eq!(records.len(), 150);
        assert_eq!(store.call_count(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn three_page_window_drains_the_fan_out() {
        let store = Arc::new(ScriptedStore::with_pages(vec![
            ScriptedStore::page_of(100),
            ScriptedStore::page_of(100),
            ScriptedStore::page_of(40),
        ]));
        let fetcher = fetcher_over(store.clone());

        let records = fetcher.fetch_all(window(), None).await.unwrap();

        // The second page came back full, so the fan-out topped up to three
        // in-flight probes before the short third page ended submission.
        assert_eq!(records.len(), 240);
        assert_eq!(store.call_count(), 5);
    }

    #[test_log::test(tokio::test)]
    async fn failed_first_page_is_a_pipeline_failure() {
        let store = Arc::new(ScriptedStore::always_failing());
        let fetcher = fetcher_over(store);

        let err = fetcher.fetch_all(window(), None).await.unwrap_err();
        assert!(matches!(err, Error::PipelineFailure));
    }

    #[test_log::test(tokio::test)]
    async fn later_page_failure_returns_partial_results() {
        let store = Arc::new(ScriptedStore::with_pages_then_failures(vec![
            ScriptedStore::page_of(100),
        ]));
        let fetcher = fetcher_over(store);

        // Page 1 fails all retries, degrading to an empty page.
        let records = fetcher.fetch_all(window(), None).await.unwrap();
        assert_eq!(records.len(), 100);
    }
}
