//! HTTP 辅助工具：CORS 响应头、预检短路与请求追踪。

use axum::body::Body as AxumBody;
use axum::extract::OptionalFromRequestParts;
use axum::extract::connect_info::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header};
use axum::{middleware, response::IntoResponse, response::Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, MakeSpan, TraceLayer};
use tracing::{Level, Span, info_span};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, POST, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Adds the permissive CORS headers to every response.
///
/// `OPTIONS` requests are answered here with an empty 204 and never reach
/// a route handler.
pub async fn cors_headers(
    request: Request<AxumBody>,
    next: middleware::Next,
) -> Result<Response, StatusCode> {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };
    apply_cors(response.headers_mut());
    Ok(response)
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        info_span!(
            env!("CARGO_CRATE_NAME"),
            client_ip,
            method = ?request.method(),
            path = ?request.uri().path(),
        )
    }
}

/// 构建请求追踪层（请求与响应事件为 DEBUG 级别）。
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan> {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG))
}

/// Raw `User-Agent` header, decoded lossily.
///
/// Extracted as `Option<UserAgentHeader>`; a header that is not valid
/// UTF-8 or visible ASCII is still accepted, never rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAgentHeader(pub String);

impl<S> OptionalFromRequestParts<S> for UserAgentHeader
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .headers
            .get(header::USER_AGENT)
            .map(|value| {
                UserAgentHeader(String::from_utf8_lossy(value.as_bytes()).into_owned())
            }))
    }
}

/// Optional `User-Agent` header as extracted by the handlers.
pub type ClientAgent = Option<UserAgentHeader>;

pub fn agent_name(agent: &ClientAgent) -> Option<&str> {
    agent.as_ref().map(|UserAgentHeader(agent)| agent.as_str())
}
