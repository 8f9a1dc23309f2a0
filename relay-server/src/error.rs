use async_openai::error::OpenAIError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_shared::ErrorDetail;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The completion endpoint rejected or dropped the call.
    #[error("{0}")]
    Upstream(String),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl From<OpenAIError> for RelayError {
    fn from(e: OpenAIError) -> Self {
        match e {
            OpenAIError::ApiError(api_err) => RelayError::Upstream(api_err.message),
            other => RelayError::Upstream(other.to_string()),
        }
    }
}

/// Non-streaming failures surface as a 500 with the message as `detail`.
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = Json(ErrorDetail {
            detail: self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
