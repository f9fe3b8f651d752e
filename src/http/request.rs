//! Request handling and transformation.
//!
//! # Responsibilities
//! - Build the upstream request for one attempt from the buffered original
//! - Rewrite the URI onto the backend (single-host reverse-proxy joining)
//! - Strip hop-by-hop headers, replace Host, append X-Forwarded-For
//!
//! # Design Decisions
//! - The original request is preserved; every attempt builds a fresh copy
//! - Upstream requests always go out as HTTP/1.1

use std::net::IpAddr;

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Request, Uri};
use url::{Position, Url};

use crate::load_balancer::backend::Backend;
use crate::resilience::retries::AttemptError;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Join the backend base URL with the inbound path and query.
pub fn upstream_uri(base: &Url, original: &Uri) -> Result<Uri, AttemptError> {
    let authority = &base[Position::BeforeHost..Position::AfterPort];
    let path = format!("{}{}", base.path().trim_end_matches('/'), original.path());

    let query = match (base.query().filter(|q| !q.is_empty()), original.query()) {
        (Some(b), Some(o)) => format!("?{b}&{o}"),
        (Some(b), None) => format!("?{b}"),
        (None, Some(o)) => format!("?{o}"),
        (None, None) => String::new(),
    };

    format!("{}://{}{}{}", base.scheme(), authority, path, query)
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| AttemptError::Build(e.to_string()))
}

/// Build the request for one attempt against `backend`.
pub fn build_upstream(
    parts: &Parts,
    body: &Bytes,
    backend: &Backend,
    client_ip: Option<IpAddr>,
) -> Result<Request<Body>, AttemptError> {
    let uri = upstream_uri(&backend.base_url, &parts.uri)?;

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    if let Some(ip) = client_ip {
        let forwarded = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{prior}, {ip}"),
            None => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .body(Body::from(body.clone()))
        .map_err(|e| AttemptError::Build(e.to_string()))?;
    *request.headers_mut() = headers;

    Ok(request)
}
