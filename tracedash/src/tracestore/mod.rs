//! Remote trace-store client abstraction.
//!
//! The dashboard pipeline treats the trace store as an opaque, possibly-slow,
//! possibly-failing collaborator exposing a single operation: list one page of
//! root-level run records for a time window. The [`TraceStore`] trait is the
//! seam the fetch pipeline is built against; [`HttpTraceStore`] is the
//! production implementation backed by `reqwest`.

pub mod http;

pub use http::HttpTraceStore;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One recorded execution trace ("run") as returned by the trace store.
///
/// Every field is optional and independently absent: records are produced by
/// heterogeneous upstream instrumentation, and a missing field must degrade
/// only the statistics that depend on it, never the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRecord {
    pub id: Option<String>,
    pub start_time: Option<Timestamp>,
    /// Absent while the run is still in flight.
    pub end_time: Option<Timestamp>,
    pub is_root: Option<bool>,
    pub parent_run_id: Option<String>,
    /// Any non-null value signals the run failed.
    pub error: Option<Value>,
    pub extra: Option<RunExtra>,
    pub inputs: Option<RunInputs>,
}

impl RunRecord {
    /// Instrumentation metadata, when the producer attached any.
    pub fn metadata(&self) -> Option<&RunMetadata> {
        self.extra.as_ref()?.metadata.as_ref()
    }

    /// Whether the record carries a non-null error value.
    pub fn has_error(&self) -> bool {
        matches!(&self.error, Some(value) if !value.is_null())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunExtra {
    pub metadata: Option<RunMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMetadata {
    /// User identity; producers send either a string or a bare number.
    pub user_id: Option<Value>,
    pub company: Option<String>,
    pub ls_model_name: Option<String>,
    pub token_usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens.unwrap_or(0) + self.completion_tokens.unwrap_or(0)
    }
}

/// Inputs the run was invoked with. Producers disagree on where the user
/// query lives, so all known keys are modeled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunInputs {
    pub user_profile: Option<UserProfile>,
    pub user_input: Option<Value>,
    pub user_q: Option<Value>,
    pub input: Option<Value>,
}

impl RunInputs {
    /// The user query string, taken from the first populated key among
    /// `user_input`, `user_q`, `input`. A populated key whose value is not a
    /// non-blank string yields nothing; there is no fallthrough to later keys.
    pub fn query(&self) -> Option<&str> {
        let value = self
            .user_input
            .as_ref()
            .or(self.user_q.as_ref())
            .or(self.input.as_ref())?;
        let text = value.as_str()?;
        if text.trim().is_empty() { None } else { Some(text) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    #[serde(rename = "userId")]
    pub user_id: Option<Value>,
    pub company: Option<String>,
}

/// A run timestamp, which may arrive already parsed (RFC 3339) or as a raw
/// ISO-8601 string that still needs interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Parsed(DateTime<Utc>),
    Raw(String),
}

impl Timestamp {
    /// Resolve to a UTC instant. Naive timestamps are coerced to UTC.
    pub fn to_utc(&self) -> anyhow::Result<DateTime<Utc>> {
        match self {
            Timestamp::Parsed(instant) => Ok(*instant),
            Timestamp::Raw(raw) => parse_iso8601(raw),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Timestamp::Parsed(instant)
    }
}

fn parse_iso8601(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| anyhow!("unparseable timestamp {raw:?}: {e}"))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Normalize a user identity value to its string form.
pub fn normalize_user_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Server-side record filter, composed into the trace store's filter DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum RunFilter {
    /// Top-level runs only (no parent).
    RootOnly,
    /// Equality on a dotted metadata/inputs field path.
    FieldEq { field: String, value: String },
    /// Logical OR of sub-filters.
    Or(Vec<RunFilter>),
}

impl RunFilter {
    /// Filter matching runs attributed to `user_id` through either identity
    /// path. Note this *replaces* the root-only predicate when applied; the
    /// two filters are mutually exclusive by design.
    pub fn user(user_id: &str) -> Self {
        RunFilter::Or(vec![
            RunFilter::FieldEq {
                field: "metadata.user_id".to_string(),
                value: user_id.to_string(),
            },
            RunFilter::FieldEq {
                field: "inputs.user_profile.userId".to_string(),
                value: user_id.to_string(),
            },
        ])
    }

    /// Render into the trace store's wire filter format.
    pub fn to_wire(&self) -> Value {
        match self {
            RunFilter::RootOnly => json!({ "is_root": true }),
            RunFilter::FieldEq { field, value } => json!({ field.as_str(): value }),
            RunFilter::Or(filters) => {
                let clauses: Vec<Value> = filters.iter().map(RunFilter::to_wire).collect();
                json!({ "$or": clauses })
            }
        }
    }
}

/// One page-sized "list runs" request.
#[derive(Debug, Clone, PartialEq)]
pub struct RunQuery {
    pub project: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub limit: usize,
    pub offset: usize,
    pub filter: RunFilter,
}

/// The trace-store collaborator. Implementations do not manage retry or
/// caching; that belongs to the fetch pipeline layered on top.
#[async_trait]
pub trait TraceStore: Send + Sync {
    async fn list_runs(&self, query: &RunQuery) -> anyhow::Result<Vec<RunRecord>>;
}
