//! Application error types and their HTTP mapping.
//!
//! Every error that can reach a handler converts into a JSON body of the form
//! `{"detail": "..."}` with an appropriate status code. Messages for internal
//! failures are deliberately descriptive (they include the underlying error
//! text) since the dashboard is an operator-facing surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Client supplied an invalid parameter.
    #[error("{message}")]
    BadRequest { message: String },

    /// The first page of trace data could not be fetched, so the dashboard
    /// has nothing to build on.
    #[error("Failed to fetch initial data")]
    PipelineFailure,

    /// An internal operation failed.
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Catch-all for errors bubbling up from lower layers.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PipelineFailure | Error::Internal { .. } | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message surfaced to the API client in the `detail` field.
    pub fn user_message(&self) -> String {
        match self {
            Error::Other(e) => format!("Error in dashboard overview: {e}"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Error::BadRequest { message } => {
                debug!("Bad request: {message}");
            }
            Error::PipelineFailure => {
                error!("Initial trace fetch failed; aborting dashboard build");
            }
            Error::Internal { operation } => {
                error!("Internal error: failed to {operation}");
            }
            Error::Other(e) => {
                error!("Unhandled error in dashboard pipeline: {e:#}");
            }
        }

        let body = Json(json!({ "detail": self.user_message() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_as_expected() {
        let bad = Error::BadRequest {
            message: "Days must be between 1 and 30".to_string(),
        };
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::PipelineFailure.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            Error::Other(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn wrapped_errors_keep_their_context_in_the_message() {
        let err = Error::Other(anyhow::anyhow!("connection refused"));
        assert_eq!(
            err.user_message(),
            "Error in dashboard overview: connection refused"
        );
    }

    #[test]
    fn pipeline_failure_message_is_stable() {
        assert_eq!(
            Error::PipelineFailure.user_message(),
            "Failed to fetch initial data"
        );
    }
}
