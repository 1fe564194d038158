use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crates::domain::errors::{ErrorKind, PipelineError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(err) => match err.kind() {
                ErrorKind::NoStreamAvailable => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::DownloadError | ErrorKind::UploadError | ErrorKind::InferenceError => {
                    StatusCode::BAD_GATEWAY
                }
                // Reported inside a 200 result, never raised.
                ErrorKind::MalformedResponse | ErrorKind::SchemaError => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (kind, message) = match self {
            AppError::BadRequest(msg) => (None, msg),
            AppError::Pipeline(err) => {
                let kind = err.kind();
                if kind == ErrorKind::ConfigurationError {
                    error!(error = %err, "backend: service is misconfigured");
                    // Don't leak configuration detail to the client.
                    (Some(kind), "Service is not configured for analysis".to_string())
                } else {
                    (Some(kind), err.to_string())
                }
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            kind,
            message,
        });

        (status, body).into_response()
    }
}
