//! Dashboard overview endpoint.

use std::time::Instant;

use axum::{Json, extract::Query, extract::State};
use chrono::{Duration, Utc};
use tracing::{debug, instrument};

use crate::AppState;
use crate::api::models::dashboard::{
    DashboardMetrics, OverviewQuery, OverviewResponse, TimePeriod, round_to,
};
use crate::errors::{Error, Result};
use crate::fetch::Window;
use crate::metrics::aggregator::aggregate;

/// Build the dashboard overview for the requested window.
#[utoipa::path(
    get,
    path = "/api/dashboard/overview",
    params(OverviewQuery),
    responses(
        (status = 200, description = "Aggregated dashboard metrics", body = OverviewResponse),
        (status = 400, description = "Invalid days parameter"),
        (status = 500, description = "Trace store unavailable or pipeline failure"),
    ),
    tag = "dashboard"
)]
#[instrument(skip(state, params), fields(days, user = params.user_id.as_deref().unwrap_or("all")))]
pub async fn get_overview(
    State(state): State<AppState>,
    Query(params): Query<OverviewQuery>,
) -> Result<Json<OverviewResponse>> {
    let started = Instant::now();

    let days = params.days.unwrap_or(7);
    if !(1..=30).contains(&days) {
        return Err(Error::BadRequest {
            message: format!("Days must be between 1 and 30, got {days}"),
        });
    }
    tracing::Span::current().record("days", days);

    let end = Utc::now();
    let window = Window {
        start: end - Duration::days(days),
        end,
    };

    debug!("Fetching overview data for {days} days");
    let runs = state
        .fetcher
        .fetch_all(window, params.user_id.as_deref())
        .await?;
    debug!("Processing {} runs", runs.len());

    let total_runs = runs.len();
    let metrics = DashboardMetrics::from_accumulator(aggregate(&runs), total_runs);

    Ok(Json(OverviewResponse {
        metrics,
        time_period: TimePeriod {
            start: window.start,
            end: window.end,
        },
        processing_time: round_to(started.elapsed().as_secs_f64(), 2),
    }))
}
