use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::core::dialog::{APOLOGY_REPLY, TurnFault};

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed request input. Nothing was attempted.
    #[error("{0}")]
    Validation(String),

    /// The turn failed unexpectedly after being accepted.
    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    ok: bool,
    reply: &'a str,
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TurnFault> for AppError {
    fn from(fault: TurnFault) -> Self {
        AppError::Internal(fault.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            AppError::Validation(message) => message.clone(),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "internal error".to_string()
            }
        };

        let body = ErrorBody {
            ok: false,
            reply: APOLOGY_REPLY,
            error,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_of(error: AppError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_is_bad_request() {
        let (status, body) = body_of(AppError::Validation("businessId is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "businessId is required");
        assert_eq!(body["reply"], APOLOGY_REPLY);
    }

    #[tokio::test]
    async fn test_internal_hides_detail() {
        let fault = TurnFault::Panicked("index out of bounds".into());
        let (status, body) = body_of(fault.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal error");
        assert_eq!(body["reply"], APOLOGY_REPLY);
    }
}
