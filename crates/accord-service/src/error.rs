use accord_adapters::AdapterError;
use accord_core::AccordError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Startup failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Request failures rendered as `{"error": ...}`. Unknown sessions also carry the
/// `start` route that opens them.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Accord(#[from] AccordError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Http { status, .. } => *status,
            ApiError::Accord(err) => status_for(err),
        }
    }
}

fn status_for(err: &AccordError) -> StatusCode {
    match err {
        AccordError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AccordError::DocumentClosed { .. }
        | AccordError::InvalidTransition(_)
        | AccordError::Incomplete { .. } => StatusCode::CONFLICT,
        AccordError::Validation(_)
        | AccordError::UnknownField(_)
        | AccordError::CorrectionNotPermitted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AccordError::ExtractionUnavailable(_) | AccordError::ComplianceUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AccordError::Persistence { .. }
        | AccordError::Store(_)
        | AccordError::InvalidRegistry(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = match &self {
            ApiError::Accord(AccordError::SessionNotFound(subject_id)) => serde_json::json!({
                "error": self.to_string(),
                "start": format!("/v1/sessions/{}/start", subject_id),
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
