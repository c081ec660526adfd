//! OpenAPI document for the HTTP API.

use utoipa::OpenApi;

use crate::api::models::dashboard::{
    BucketTallyView, DashboardMetrics, EngagementMetricsView, ErrorTallyView, ModelMetricsView,
    OverviewResponse, QueryMetricsView, TimeMetricsView, TimePeriod,
};

#[derive(OpenApi)]
#[openapi(
    paths(crate::api::handlers::dashboard::get_overview),
    components(schemas(
        OverviewResponse,
        TimePeriod,
        DashboardMetrics,
        TimeMetricsView,
        EngagementMetricsView,
        ModelMetricsView,
        ErrorTallyView,
        QueryMetricsView,
        BucketTallyView,
    )),
    tags(
        (name = "dashboard", description = "Aggregated trace analytics")
    ),
    info(
        title = "tracedash",
        description = "Dashboard analytics over a remote trace store"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_includes_the_overview_path() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/dashboard/overview"));
    }
}
