//! Single-pass metrics aggregation over run records.
//!
//! The accumulator is a plain data structure; [`aggregator::aggregate`] fills
//! it in one traversal of the record batch. Ordered collections (`BTreeMap`,
//! `BTreeSet`) keep the derived output deterministic for a given input batch.

pub mod aggregator;

use std::collections::{BTreeMap, BTreeSet};

/// Per-model cost in dollars per token.
pub fn cost_per_token(model: &str) -> f64 {
    match model {
        "gpt-4o-mini" => 0.000_01,
        "gpt-4o" => 0.000_03,
        "llama3-70b-8192" => 0.000_01,
        _ => 0.000_01,
    }
}

/// Everything the single aggregation pass learns about a record batch.
#[derive(Debug, Default, PartialEq)]
pub struct MetricsAccumulator {
    pub unique_users: BTreeSet<String>,
    /// Invocation count per model name.
    pub models: BTreeMap<String, u64>,
    pub companies: BTreeSet<String>,
    /// Sum of run durations in seconds, over records with both timestamps.
    pub total_duration: f64,
    pub error_count: u64,
    pub time_metrics: TimeMetrics,
    pub engagement: EngagementMetrics,
    pub model_metrics: ModelMetrics,
    pub query_metrics: QueryMetrics,
}

#[derive(Debug, Default, PartialEq)]
pub struct TimeMetrics {
    /// Request count per hour of day, formatted "HH:00".
    pub peak_hours: BTreeMap<String, u64>,
    /// Request count per weekday name.
    pub weekday_distribution: BTreeMap<String, u64>,
    /// Raw per-model latency samples in seconds.
    pub avg_response_time_by_model: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Default, PartialEq)]
pub struct EngagementMetrics {
    /// Users active within the last 24 hours.
    pub users_24h: BTreeSet<String>,
    /// Users active within the last 7 days.
    pub users_7d: BTreeSet<String>,
    /// Users whose earliest run in the batch is their first appearance.
    pub new_users: BTreeSet<String>,
    /// Users seen again after their first appearance in the batch.
    pub returning_users: BTreeSet<String>,
    pub sessions_by_user: BTreeMap<String, u64>,
    pub total_unique_users: u64,
    pub active_users: u64,
}

#[derive(Debug, Default, PartialEq)]
pub struct ErrorTally {
    pub errors: u64,
    pub total: u64,
}

#[derive(Debug, Default, PartialEq)]
pub struct ModelMetrics {
    pub model_error_rates: BTreeMap<String, ErrorTally>,
    /// Raw per-model latency samples in seconds, mirrored from the time
    /// metrics for model-centric views.
    pub model_latencies: BTreeMap<String, Vec<f64>>,
    pub token_usage_by_model: BTreeMap<String, u64>,
    pub cost_by_model: BTreeMap<String, f64>,
}

#[derive(Debug, Default, PartialEq)]
pub struct BucketTally {
    pub success: u64,
    pub total: u64,
}

#[derive(Debug, Default, PartialEq)]
pub struct QueryMetrics {
    /// Character length of every extracted query.
    pub query_lengths: Vec<u64>,
    /// Counts per complexity class: short (<100), medium (<500), long.
    pub query_complexity: BTreeMap<String, u64>,
    /// Success/total per 100-character length bucket.
    pub success_by_length: BTreeMap<u64, BucketTally>,
    /// Mean over the non-zero lengths seen during the pass.
    pub avg_query_length: f64,
}
