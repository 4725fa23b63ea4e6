//! 统一的 API 错误类型：处理器返回的错误在此转换为 HTTP 响应。

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::deploy::DeployFailure;

#[derive(Debug)]
pub enum ApiError {
    /// Handled failure; the caller only sees the route's generic message.
    Failure(&'static str),
    MethodNotAllowed(&'static str),
    NotFound,
    /// Error that escaped a handler; the cause is echoed back.
    Unhandled(String),
    Deploy(DeployFailure),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Failure(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
            ApiError::MethodNotAllowed(msg) => {
                let mut response = (StatusCode::METHOD_NOT_ALLOWED, msg).into_response();
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
                response
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            ApiError::Unhandled(msg) => {
                let mut response = (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal Server Error: {msg}"),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
                response
            }
            ApiError::Deploy(failure) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "message": "Failed to deploy project",
                    "error": failure,
                })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    #[tokio::test]
    async fn failure_hides_cause_behind_generic_message() {
        let response = ApiError::Failure("Failed to list files").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Failed to list files");
    }

    #[tokio::test]
    async fn unhandled_echoes_cause() {
        let response = ApiError::Unhandled("Invalid path".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/plain"))
        );
        assert_eq!(body_text(response).await, "Internal Server Error: Invalid path");
    }

    #[tokio::test]
    async fn not_found_body() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Not Found");
    }
}
