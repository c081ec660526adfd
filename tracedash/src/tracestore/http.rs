//! HTTP implementation of [`TraceStore`] against the trace store's
//! `POST /runs/query` endpoint.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::config::TraceStoreConfig;

use super::{RunQuery, RunRecord, TraceStore};

/// Trace-store client speaking the store's JSON query API.
#[derive(Debug, Clone)]
pub struct HttpTraceStore {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListRunsResponse {
    runs: Vec<RunRecord>,
}

impl HttpTraceStore {
    pub fn new(config: &TraceStoreConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.api_timeout)
            .build()
            .context("failed to build HTTP client for trace store")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl TraceStore for HttpTraceStore {
    async fn list_runs(&self, query: &RunQuery) -> anyhow::Result<Vec<RunRecord>> {
        let url = ensure_slash(&self.base_url)
            .join("runs/query")
            .context("failed to construct runs/query URL")?;

        let body = json!({
            "project": query.project,
            "start_time": query.start_time.to_rfc3339(),
            "end_time": query.end_time.to_rfc3339(),
            "limit": query.limit,
            "offset": query.offset,
            "filter": query.filter.to_wire(),
        });

        debug!(%url, offset = query.offset, limit = query.limit, "querying trace store");

        let mut request = self.client.post(url.clone()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("failed to reach trace store at {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("trace store returned {status}: {text}"));
        }

        let parsed: ListRunsResponse = response
            .json()
            .await
            .context("failed to parse trace store response")?;
        Ok(parsed.runs)
    }
}

/// Ensure the base URL ends with a slash so `Url::join` appends rather than
/// replaces the final path segment.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut fixed = url.clone();
        fixed.set_path(&format!("{}/", url.path()));
        fixed
    }
}
