//! Dashboard overview response assembly.
//!
//! These types are the JSON contract of `/api/dashboard/overview`. Assembly
//! converts the aggregation pass's working state into client-facing form:
//! ordered sets become sorted lists, derived ratios are computed and rounded,
//! and everything gets a stable field layout for the OpenAPI schema.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::metrics::MetricsAccumulator;

/// Query parameters for the overview endpoint.
#[derive(Debug, Deserialize, IntoParams)]
pub struct OverviewQuery {
    /// Days of history to cover, 1 to 30. Defaults to 7.
    pub days: Option<i64>,
    /// Restrict to a single user's traces instead of root runs.
    pub user_id: Option<String>,
}

/// Full response envelope.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OverviewResponse {
    pub metrics: DashboardMetrics,
    pub time_period: TimePeriod,
    /// Wall-clock seconds spent building this response, rounded to 2 places.
    pub processing_time: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TimePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardMetrics {
    /// Every distinct user seen in the window, sorted.
    pub unique_users: Vec<String>,
    /// Invocation count per model.
    pub models: BTreeMap<String, u64>,
    /// Every distinct (normalized) company, sorted.
    pub companies: Vec<String>,
    /// Sum of all run durations in seconds.
    pub total_duration: f64,
    pub error_count: u64,
    /// Mean duration over all runs in the window, rounded to 3 places.
    /// Absent when the window held no runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_response_time: Option<f64>,
    /// Percentage of runs that errored, rounded to 2 places. Absent when the
    /// window held no runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    pub time_metrics: TimeMetricsView,
    pub engagement_metrics: EngagementMetricsView,
    pub model_metrics: ModelMetricsView,
    pub query_metrics: QueryMetricsView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TimeMetricsView {
    /// Request count per "HH:00" hour of day.
    pub peak_hours: BTreeMap<String, u64>,
    /// Request count per weekday name.
    pub weekday_distribution: BTreeMap<String, u64>,
    /// Raw latency samples in seconds, per model.
    pub avg_response_time_by_model: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EngagementMetricsView {
    pub users_24h: Vec<String>,
    pub users_7d: Vec<String>,
    pub new_users: Vec<String>,
    pub returning_users: Vec<String>,
    pub sessions_by_user: BTreeMap<String, u64>,
    pub total_unique_users: u64,
    pub active_users: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorTallyView {
    pub errors: u64,
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModelMetricsView {
    pub model_error_rates: BTreeMap<String, ErrorTallyView>,
    pub model_latencies: BTreeMap<String, Vec<f64>>,
    pub token_usage_by_model: BTreeMap<String, u64>,
    pub cost_by_model: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BucketTallyView {
    pub success: u64,
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryMetricsView {
    pub query_lengths: Vec<u64>,
    pub query_complexity: BTreeMap<String, u64>,
    /// Keyed by the lower bound of each 100-character length bucket.
    pub success_by_length: BTreeMap<String, BucketTallyView>,
    /// Mean query length over every extracted query.
    pub avg_query_length: f64,
}

impl DashboardMetrics {
    /// Turn the aggregation pass's working state into the response shape.
    ///
    /// `total_runs` is the denominator for the derived ratios and counts
    /// every fetched record, including ones the pass skipped as malformed.
    /// The mean query length is recomputed here over all lengths, zeros
    /// included, replacing the pass's non-zero-only figure.
    pub fn from_accumulator(acc: MetricsAccumulator, total_runs: usize) -> Self {
        let (average_response_time, error_rate) = if total_runs > 0 {
            (
                Some(round_to(acc.total_duration / total_runs as f64, 3)),
                Some(round_to(
                    acc.error_count as f64 / total_runs as f64 * 100.0,
                    2,
                )),
            )
        } else {
            (None, None)
        };

        let lengths = &acc.query_metrics.query_lengths;
        let avg_query_length = if lengths.is_empty() {
            acc.query_metrics.avg_query_length
        } else {
            lengths.iter().sum::<u64>() as f64 / lengths.len() as f64
        };

        Self {
            unique_users: acc.unique_users.into_iter().collect(),
            models: acc.models,
            companies: acc.companies.into_iter().collect(),
            total_duration: acc.total_duration,
            error_count: acc.error_count,
            average_response_time,
            error_rate,
            time_metrics: TimeMetricsView {
                peak_hours: acc.time_metrics.peak_hours,
                weekday_distribution: acc.time_metrics.weekday_distribution,
                avg_response_time_by_model: acc.time_metrics.avg_response_time_by_model,
            },
            engagement_metrics: EngagementMetricsView {
                users_24h: acc.engagement.users_24h.into_iter().collect(),
                users_7d: acc.engagement.users_7d.into_iter().collect(),
                new_users: acc.engagement.new_users.into_iter().collect(),
                returning_users: acc.engagement.returning_users.into_iter().collect(),
                sessions_by_user: acc.engagement.sessions_by_user,
                total_unique_users: acc.engagement.total_unique_users,
                active_users: acc.engagement.active_users,
            },
            model_metrics: ModelMetricsView {
                model_error_rates: acc
                    .model_metrics
                    .model_error_rates
                    .into_iter()
                    .map(|(model, t)| {
                        (
                            model,
                            ErrorTallyView {
                                errors: t.errors,
                                total: t.total,
                            },
                        )
                    })
                    .collect(),
                model_latencies: acc.model_metrics.model_latencies,
                token_usage_by_model: acc.model_metrics.token_usage_by_model,
                cost_by_model: acc.model_metrics.cost_by_model,
            },
            query_metrics: QueryMetricsView {
                query_lengths: acc.query_metrics.query_lengths,
                query_complexity: acc.query_metrics.query_complexity,
                success_by_length: acc
                    .query_metrics
                    .success_by_length
                    .into_iter()
                    .map(|(bucket, t)| {
                        (
                            bucket.to_string(),
                            BucketTallyView {
                                success: t.success,
                                total: t.total,
                            },
                        )
                    })
                    .collect(),
                avg_query_length,
            },
        }
    }
}

/// Round to `places` decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
