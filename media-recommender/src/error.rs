use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

/// Every failure a recommendation request can end in.
///
/// Parse failures of the classifier output are not represented here: they
/// are recovered inside the classifier and never reach a caller.
#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    /// Missing or malformed input; the caller can fix it.
    #[error("{0}")]
    Validation(String),

    /// The completion endpoint itself failed.
    #[error("Classification failed: {0}")]
    Classification(String),

    /// Provider secrets are not configured.
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Network error: {message}")]
    Network {
        status: Option<u16>,
        message: String,
    },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type RecommendResult<T> = Result<T, RecommendError>;

impl RecommendError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecommendError::Validation(_) => StatusCode::BAD_REQUEST,
            RecommendError::NotFound(_) => StatusCode::NOT_FOUND,
            RecommendError::Conflict(_) => StatusCode::CONFLICT,
            RecommendError::Classification(_) | RecommendError::Network { .. } => {
                StatusCode::BAD_GATEWAY
            }
            RecommendError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RecommendError::Credential(_)
            | RecommendError::Storage(_)
            | RecommendError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RecommendError::Validation(_) => "ValidationError",
            RecommendError::Classification(_) => "ClassificationError",
            RecommendError::Credential(_) => "CredentialError",
            RecommendError::Network { .. } => "NetworkError",
            RecommendError::Timeout(_) => "TimeoutError",
            RecommendError::NotFound(_) => "NotFound",
            RecommendError::Conflict(_) => "Conflict",
            RecommendError::Storage(_) => "StorageError",
            RecommendError::Internal(_) => "InternalError",
        }
    }
}

impl From<sqlx::Error> for RecommendError {
    fn from(err: sqlx::Error) -> Self {
        RecommendError::Storage(err.to_string())
    }
}

impl IntoResponse for RecommendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();

        let body = match &self {
            RecommendError::Validation(message)
            | RecommendError::NotFound(message)
            | RecommendError::Conflict(message) => {
                warn!(kind, %message, "request rejected");
                json!({ "error": message })
            }
            RecommendError::Network {
                status: upstream_status,
                message,
            } => {
                error!(kind, ?upstream_status, %message, "upstream request failed");
                json!({
                    "error": kind,
                    "details": {
                        "upstream_status": upstream_status,
                        "message": message,
                    }
                })
            }
            other => {
                error!(kind, error = %other, "request failed");
                json!({ "error": kind, "details": other.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}
