//! Shared test fixtures: a scriptable in-memory trace store and config
//! presets tuned for fast tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::config::Config;
use crate::tracestore::{RunExtra, RunMetadata, RunQuery, RunRecord, TokenUsage, TraceStore};

/// Config preset with zero backoff so retry tests finish instantly.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.trace_store.project = "test-project".to_string();
    config.fetch.backoff_unit = Duration::ZERO;
    config
}

/// A minimal run attributed to a user and model, with fixed token usage.
pub fn user_run(user: &str, model: &str, start: DateTime<Utc>) -> RunRecord {
    RunRecord {
        id: Some(format!("run-{user}-{}", start.timestamp_millis())),
        start_time: Some(start.into()),
        end_time: Some((start + chrono::Duration::seconds(2)).into()),
        extra: Some(RunExtra {
            metadata: Some(RunMetadata {
                user_id: Some(json!(user)),
                ls_model_name: Some(model.to_string()),
                token_usage: Some(TokenUsage {
                    prompt_tokens: Some(100),
                    completion_tokens: Some(50),
                }),
                ..Default::default()
            }),
        }),
        ..Default::default()
    }
}

/// Trace store that serves pre-scripted pages keyed by `offset / limit`.
/// Pages beyond the script come back empty (or fail, for the
/// `with_pages_then_failures` variant). Every call is counted and its query
/// recorded for assertions.
pub struct ScriptedStore {
    pages: Vec<Vec<RunRecord>>,
    beyond_script_fails: bool,
    calls: AtomicUsize,
    queries: Mutex<Vec<RunQuery>>,
}

impl ScriptedStore {
    pub fn with_pages(pages: Vec<Vec<RunRecord>>) -> Self {
        Self {
            pages,
            beyond_script_fails: false,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Scripted pages, then failures for anything past them.
    pub fn with_pages_then_failures(pages: Vec<Vec<RunRecord>>) -> Self {
        Self {
            beyond_script_fails: true,
            ..Self::with_pages(pages)
        }
    }

    /// Every call fails.
    pub fn always_failing() -> Self {
        Self::with_pages_then_failures(Vec::new())
    }

    /// A page of `n` distinct anonymous records.
    pub fn page_of(n: usize) -> Vec<RunRecord> {
        (0..n)
            .map(|i| RunRecord {
                id: Some(format!("r{i}")),
                ..Default::default()
            })
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded_queries(&self) -> Vec<RunQuery> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl TraceStore for ScriptedStore {
    async fn list_runs(&self, query: &RunQuery) -> anyhow::Result<Vec<RunRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().expect("queries lock").push(query.clone());

        let page = query.offset / query.limit.max(1);
        match self.pages.get(page) {
            Some(records) => Ok(records.clone()),
            None if self.beyond_script_fails => Err(anyhow!("scripted failure for page {page}")),
            None => Ok(Vec::new()),
        }
    }
}
