//! Diagnostic routes: health, time, echo, uuid, log retrieval, redirects
//! and the catch-all 404.

use axum::body::Bytes;
use axum::extract::{Extension, OriginalUri};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::REPOSITORY_URL;
use crate::error::ApiError;
use crate::http::{ClientAgent, agent_name};
use crate::request_log::{RequestLog, request_line};

pub async fn health(
    agent: ClientAgent,
    Extension(log): Extension<Arc<RequestLog>>,
) -> &'static str {
    log.record(&request_line("Health check", "", agent_name(&agent)))
        .await;
    "OK"
}

pub async fn current_time(
    agent: ClientAgent,
    Extension(log): Extension<Arc<RequestLog>>,
) -> String {
    log.record(&request_line("Time", "", agent_name(&agent)))
        .await;
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn echo(
    agent: ClientAgent,
    Extension(log): Extension<Arc<RequestLog>>,
    body: Bytes,
) -> String {
    log.record(&request_line("Echo", "", agent_name(&agent)))
        .await;
    String::from_utf8_lossy(&body).into_owned()
}

pub async fn hello_world(
    agent: ClientAgent,
    Extension(log): Extension<Arc<RequestLog>>,
) -> &'static str {
    log.record(&request_line("Hello World", "", agent_name(&agent)))
        .await;
    "Hello, World!"
}

/// Time-ordered v7 UUID.
pub async fn new_uuid(
    agent: ClientAgent,
    Extension(log): Extension<Arc<RequestLog>>,
) -> String {
    log.record(&request_line("UUID", "", agent_name(&agent)))
        .await;
    Uuid::now_v7().to_string()
}

/// Returns this run's log file verbatim.
pub async fn read_log(
    agent: ClientAgent,
    Extension(log): Extension<Arc<RequestLog>>,
) -> Result<String, ApiError> {
    log.record(&request_line("Log", "", agent_name(&agent)))
        .await;
    match log.contents().await {
        Ok(contents) => Ok(contents),
        Err(err) => {
            log.record_error(&format!("Error reading log: {err}")).await;
            Err(ApiError::Failure("Failed to read log"))
        }
    }
}

pub async fn repository_redirect() -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, REPOSITORY_URL)],
        "Redirecting to github repo",
    )
        .into_response()
}

pub async fn not_found(
    OriginalUri(uri): OriginalUri,
    agent: ClientAgent,
    Extension(log): Extension<Arc<RequestLog>>,
) -> ApiError {
    log.record(&request_line("Fetch", &uri.to_string(), agent_name(&agent)))
        .await;
    ApiError::NotFound
}
