//! Gateway error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The cluster command-line tool exited nonzero.
    #[error("{0}")]
    ClusterCommand(String),

    /// The VCS API answered with a non-success status; carries the response body.
    #[error("{body}")]
    VcsApi { status: u16, body: String },

    /// A trigger request was rejected before any external call.
    #[error("{0}")]
    Validation(String),

    /// The delegated run generator script is missing.
    #[error("{0}")]
    GeneratorUnavailable(String),

    /// The delegated run generator script exited nonzero.
    #[error("{0}")]
    GeneratorFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (
            status,
            axum::Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let response = GatewayError::Validation("stack is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn external_failures_map_to_server_error() {
        let errors = [
            GatewayError::ClusterCommand("kubectl exited with code 1".to_string()),
            GatewayError::VcsApi {
                status: 404,
                body: "Not Found".to_string(),
            },
            GatewayError::GeneratorUnavailable("generate-run.sh not found".to_string()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn vcs_error_message_is_response_body() {
        let err = GatewayError::VcsApi {
            status: 403,
            body: "{\"message\":\"API rate limit exceeded\"}".to_string(),
        };
        assert_eq!(err.to_string(), "{\"message\":\"API rate limit exceeded\"}");
    }
}
