use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Application error, mapped onto the JSON error envelope the frontend
/// consumes: `{"success": false, "error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Business-rule conflict, e.g. the pool filled up between the precheck
    /// and the admission transaction.
    #[error("{0}")]
    Conflict(String),

    /// Signature mismatch on a payment callback. Treated as potential
    /// tampering: rejected outright, never retried.
    #[error("Payment verification failed. Please contact support.")]
    SignatureRejected,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::SignatureRejected => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Gateway(msg) => {
                error!(target: "gateway", error = %msg, "Payment gateway call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to create payment order. Please try again.".to_string(),
                )
            }
            ApiError::Internal(err) => {
                error!(error = ?err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorBody {
            success: false,
            error: message,
        });
        (status, body).into_response()
    }
}

/// Success envelope: `{"success": true, "message": ..., <data fields>}`.
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    ok_with_message(data, "Success")
}

pub fn ok_with_message<T: Serialize>(data: T, message: impl Into<String>) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data,
    })
}
