//! Response handling and transformation.
//!
//! # Responsibilities
//! - Rebuild a backend response for the client
//! - Strip hop-by-hop headers, add the attempt diagnostic header
//! - Produce the synthetic responses (chaos, exhausted, oversized body)
//!
//! # Design Decisions
//! - Synthetic bodies are fixed strings; backend URLs and error details stay in logs

use axum::body::Body;
use axum::http::{response::Parts, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::request::strip_hop_by_hop;

/// The 1-based attempt that produced the forwarded response.
pub const X_LB_ATTEMPTS: HeaderName = HeaderName::from_static("x-lb-attempts");

pub fn chaos_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Simulated error (chaos)").into_response()
}

pub fn all_backends_failed() -> Response {
    (StatusCode::BAD_GATEWAY, "All backends failed").into_response()
}

pub fn body_too_large() -> Response {
    (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
}

/// Rebuild a backend response for the client around its streaming body.
pub fn forwarded(mut parts: Parts, body: Body, attempt: u32) -> Response {
    strip_hop_by_hop(&mut parts.headers);
    parts.headers.insert(X_LB_ATTEMPTS, HeaderValue::from(attempt));
    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_keeps_status_and_headers() {
        let (parts, ()) = Response::builder()
            .status(StatusCode::CREATED)
            .header("content-type", "application/json")
            .header("connection", "close")
            .header("x-backend-tag", "alpha")
            .body(())
            .unwrap()
            .into_parts();

        let response = forwarded(parts, Body::from("{}"), 2);
        assert_eq!(response.status(), StatusCode::CREATED);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["x-backend-tag"], "alpha");
        assert_eq!(headers[X_LB_ATTEMPTS], "2");
        assert!(headers.get("connection").is_none());
    }

    #[test]
    fn test_synthetic_statuses() {
        assert_eq!(chaos_error().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(all_backends_failed().status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_too_large().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
