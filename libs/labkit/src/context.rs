//! Per-request correlation id.
//!
//! The id is request-scoped: it lives in the request extensions, on the request
//! span, and in the response header. Nothing holds it across requests.

use std::fmt;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::{HeaderName, HeaderValue};
use tower_http::request_id::MakeRequestId;

pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation id of the current request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Fresh time-ordered id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Arc::from(uuid::Uuid::now_v7().to_string()))
    }

    /// Accept a caller-supplied id: 1..=128 visible ASCII characters.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let ok = !raw.is_empty()
            && raw.len() <= MAX_REQUEST_ID_LEN
            && raw.bytes().all(|b| b.is_ascii_graphic());
        ok.then(|| Self(Arc::from(raw)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `MakeRequestId` for `SetRequestIdLayer`: only called when the caller sent no id.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(
        &mut self,
        _request: &http::Request<B>,
    ) -> Option<tower_http::request_id::RequestId> {
        HeaderValue::from_str(RequestId::generate().as_str())
            .ok()
            .map(tower_http::request_id::RequestId::new)
    }
}

/// Resolve the request id from the header, replacing unusable caller values,
/// then expose it in extensions and on the current span.
pub async fn push_request_id(
    State(header): State<HeaderName>,
    mut req: Request,
    next: Next,
) -> Response {
    let supplied = req
        .headers()
        .get(&header)
        .and_then(|v| v.to_str().ok())
        .and_then(RequestId::parse);

    let (id, replaced) = match supplied {
        Some(id) => (id, false),
        None => (RequestId::generate(), true),
    };

    let header_value = HeaderValue::from_str(id.as_str()).ok();
    if replaced {
        if let Some(value) = &header_value {
            req.headers_mut().insert(header.clone(), value.clone());
        }
    }

    tracing::Span::current().record("request_id", id.as_str());
    req.extensions_mut().insert(id);

    let mut res = next.run(req).await;
    if let Some(value) = header_value {
        res.headers_mut().insert(header, value);
    }
    res
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_visible_ascii() {
        assert_eq!(RequestId::parse("abc-123").unwrap().as_str(), "abc-123");
        assert!(RequestId::parse("").is_none());
        assert!(RequestId::parse("has space").is_none());
        assert!(RequestId::parse(&"x".repeat(129)).is_none());
        assert!(RequestId::parse(&"x".repeat(128)).is_some());
    }

    #[test]
    fn generated_ids_are_unique_uuids() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(a.as_str()).is_ok());
    }
}
