//! Request span and access log events for the HTTP layer.
use crate::personalize::client::{FORWARDED_FOR, client_address, peer_address};
use axum::{
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use std::time::Duration;
use tracing::{Span, field};

pub const TARGET: &str = "access_log";

/// Span covering one request. The image handler fills in `artifact` once the
/// personalized file exists.
pub fn request_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let peer = peer_address(request);
    let client = client_address(request.headers(), &peer);

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %path,
        image = image_name(path).unwrap_or("-"),
        client = %client,
        artifact = field::Empty,
    )
}

pub fn log_request(request: &Request<Body>, _span: &Span) {
    let headers = request.headers();
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };

    tracing::info!(
        target: TARGET,
        forwarded_for = %header_str(FORWARDED_FOR),
        range = %header_str(header::RANGE.as_str()),
        if_modified_since = %header_str(header::IF_MODIFIED_SINCE.as_str()),
        "request"
    );
}

pub fn log_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    let headers = response.headers();
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };

    tracing::info!(
        target: TARGET,
        status = response.status().as_u16(),
        outcome = outcome(response.status()),
        size = %header_str(header::CONTENT_LENGTH),
        content_range = %header_str(header::CONTENT_RANGE),
        latency_ms = latency.as_millis() as u64,
        "response"
    );
}

/// Segment after `/image/`, as requested (still percent-encoded).
pub fn image_name(path: &str) -> Option<&str> {
    path.strip_prefix("/image/").filter(|name| !name.is_empty())
}

pub fn outcome(status: StatusCode) -> &'static str {
    match status {
        StatusCode::PARTIAL_CONTENT => "partial",
        StatusCode::NOT_MODIFIED => "not_modified",
        s if s.is_success() => "served",
        s if s.is_client_error() => "rejected",
        s if s.is_server_error() => "failed",
        _ => "other",
    }
}
