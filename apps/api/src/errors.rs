use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::captions::models::CaptionResponse;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every error renders in the success shape — `{"captions": [{"caption": <message>, "hashtags": ""}]}` —
/// so callers decode one body format regardless of status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(e.body_text())
        } else {
            AppError::Validation(e.body_text())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => {
                tracing::warn!("Rejected request: {msg}");
                (StatusCode::BAD_REQUEST, format!("Error: {msg}"))
            }
            AppError::PayloadTooLarge(msg) => {
                tracing::warn!("Rejected upload: {msg}");
                (StatusCode::PAYLOAD_TOO_LARGE, format!("Error: {msg}"))
            }
            AppError::Llm(LlmError::Upstream { message }) => {
                tracing::error!("Upstream model error: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("API Error: {message}"),
                )
            }
            AppError::Llm(e) => {
                tracing::error!("LLM transport error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}"))
            }
        };

        (status, Json(CaptionResponse::message(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::models::CaptionRecord;

    async fn render(error: AppError) -> (StatusCode, CaptionResponse) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upstream_error_renders_api_error_caption() {
        let (status, body) = render(AppError::Llm(LlmError::Upstream {
            message: "invalid image".to_string(),
        }))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body.captions,
            vec![CaptionRecord::new("API Error: invalid image", "")]
        );
    }

    #[tokio::test]
    async fn test_transport_error_renders_generic_caption() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let (status, body) = render(AppError::Llm(LlmError::Parse(parse_err))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.captions.len(), 1);
        assert!(body.captions[0].caption.starts_with("Error: JSON parse error"));
        assert!(body.captions[0].hashtags.is_empty());
    }

    #[tokio::test]
    async fn test_validation_error_is_bad_request() {
        let (status, body) = render(AppError::Validation("missing image".to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.captions, vec![CaptionRecord::new("Error: missing image", "")]);
    }
}
