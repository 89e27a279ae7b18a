use crate::error::ChallengeError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_code: &'static str,
    pub message: String,
}

/// A [`ChallengeError`] rendered as a structured HTTP error.
#[derive(Debug)]
pub struct ApiError(pub ChallengeError);

impl From<ChallengeError> for ApiError {
    fn from(err: ChallengeError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ChallengeError::InvalidPaymentSession(_) => StatusCode::BAD_REQUEST,
            ChallengeError::InvalidSession(_) => StatusCode::NOT_FOUND,
            ChallengeError::ProtocolMismatch(_) => StatusCode::CONFLICT,
            ChallengeError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::warn!(error = %self.0, error_code = self.0.code(), "Request rejected");
        }
        let body = ErrorBody {
            error_code: self.0.code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
