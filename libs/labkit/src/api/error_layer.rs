//! Terminal error handler.
//!
//! Snapshots the request context before the inner service runs, then turns
//! any `PendingError` found on the response into one structured log record and
//! one error envelope. Responses without a pending error pass through untouched,
//! except the bare 413 of the body limit layer.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequestParts, RawPathParams, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, HeaderName, StatusCode, header};
use labkit_errors::TaxonomyError;
use serde_json::Value;

use super::boundary::{ApiError, BODY_TOO_LARGE, PendingError, unreadable_body};
use super::responder::Responder;
use crate::classify::Classifier;
use crate::config::{PipelineConfig, PipelineConfigError};
use crate::context::RequestId;

const REDACTED: &str = "[REDACTED]";

/// Shared state of the terminal handler.
#[derive(Debug, Clone)]
pub struct ErrorPipeline {
    classifier: Classifier,
    redact_headers: Vec<HeaderName>,
    redact_body_fields: Vec<String>,
    log_request_body: bool,
    body_log_limit: usize,
    body_limit: Option<usize>,
}

impl ErrorPipeline {
    /// # Errors
    /// Returns an error when a redacted header name is invalid.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self, PipelineConfigError> {
        Ok(Self {
            classifier: Classifier::from_config(cfg),
            redact_headers: cfg.redacted_headers()?,
            redact_body_fields: cfg.redact_body_fields.clone(),
            log_request_body: cfg.log_request_body,
            body_log_limit: cfg.body_log_limit_bytes,
            body_limit: None,
        })
    }

    /// Never buffer more than `bytes` of a request body for the log record.
    #[must_use]
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    fn redact_headers(&self, headers: &HeaderMap) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (name, value) in headers {
            let shown = if self.redact_headers.contains(name) {
                REDACTED.to_owned()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            out.entry(name.as_str().to_owned())
                .and_modify(|v: &mut String| {
                    v.push_str(", ");
                    v.push_str(&shown);
                })
                .or_insert(shown);
        }
        out
    }

    fn declares_oversized_body(&self, headers: &HeaderMap) -> bool {
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok()?.parse::<usize>().ok());
        matches!((declared, self.body_limit), (Some(len), Some(limit)) if len > limit)
    }

    fn render_body(&self, bytes: &[u8]) -> Option<String> {
        if !self.log_request_body || bytes.is_empty() {
            return None;
        }
        if let Ok(mut json) = serde_json::from_slice::<Value>(bytes) {
            if let Some(obj) = json.as_object_mut() {
                for field in &self.redact_body_fields {
                    if let Some(v) = obj.get_mut(field) {
                        *v = Value::from(REDACTED);
                    }
                }
            }
            return Some(truncate(&json.to_string(), self.body_log_limit));
        }
        Some(truncate(&String::from_utf8_lossy(bytes), self.body_log_limit))
    }
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_owned();
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…[truncated]", &s[..end])
}

/// Request context captured for the error log record.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub request_id: RequestId,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub params: BTreeMap<String, String>,
    pub client_addr: Option<SocketAddr>,
    pub user_agent: Option<String>,
}

impl ErrorPipeline {
    /// Buffer the body (so it can be logged) and capture request context.
    async fn snapshot(&self, req: Request) -> (Request, RequestSnapshot, Option<TaxonomyError>) {
        let (mut parts, body) = req.into_parts();

        let params = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(raw) => raw
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
            Err(_) => BTreeMap::new(),
        };

        // Oversized declared bodies are left for the body limit layer to reject.
        let (body, logged_body, read_failure) =
            if !self.log_request_body || self.declares_oversized_body(&parts.headers) {
                (body, None, None)
            } else {
                match axum::body::to_bytes(body, self.body_limit.unwrap_or(usize::MAX)).await {
                    Ok(bytes) => {
                        let logged = self.render_body(&bytes);
                        (Body::from(bytes), logged, None)
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "request body could not be buffered");
                        (Body::empty(), None, Some(unreadable_body(&e)))
                    }
                }
            };

        let snapshot = RequestSnapshot {
            request_id: parts
                .extensions
                .get::<RequestId>()
                .cloned()
                .unwrap_or_else(RequestId::generate),
            method: parts.method.to_string(),
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: self.redact_headers(&parts.headers),
            body: logged_body,
            params,
            client_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        };

        (Request::from_parts(parts, body), snapshot, read_failure)
    }
}

macro_rules! log_failure {
    ($level:ident, $err:expr, $rule:expr, $chain:expr, $ctx:expr) => {
        tracing::$level!(
            error.name = $err.name(),
            error.code = %$err.code(),
            error.status = $err.status().as_u16(),
            error.kind = $err.kind().as_str(),
            error.operational = $err.is_operational(),
            error.details = ?$err.details(),
            error.rule = $rule,
            error.chain = ?$chain,
            request_id = %$ctx.request_id,
            http.method = %$ctx.method,
            http.path = %$ctx.path,
            http.query = ?$ctx.query,
            http.headers = ?$ctx.headers,
            http.body = ?$ctx.body,
            http.params = ?$ctx.params,
            client.address = ?$ctx.client_addr,
            user_agent = ?$ctx.user_agent,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}",
            $err.message()
        )
    };
}

fn log_classified(err: &TaxonomyError, rule: &str, chain: &[String], ctx: &RequestSnapshot) {
    if err.is_server_fault() {
        log_failure!(error, err, rule, chain, ctx);
    } else {
        log_failure!(warn, err, rule, chain, ctx);
    }
}

/// Terminal error handler. Apply with `Router::layer` so path parameters are
/// already matched when it runs.
pub async fn error_handling_middleware(
    State(pipeline): State<Arc<ErrorPipeline>>,
    req: Request,
    next: Next,
) -> Response {
    let (req, ctx, read_failure) = pipeline.snapshot(req).await;

    if let Some(err) = read_failure {
        log_classified(&err, "passthrough", &[], &ctx);
        return Responder::new(ctx.request_id)
            .taxonomy_error(&err)
            .into_response();
    }

    let mut response = next.run(req).await;
    let pending = match response.extensions_mut().remove::<PendingError>() {
        Some(pending) => pending,
        // The body limit layer answers in plain text; give it the envelope.
        None if response.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::from(TaxonomyError::validation(BODY_TOO_LARGE)).into_pending()
        }
        None => return response,
    };

    let (rule, classified, facts) = pending.classify(pipeline.classifier());
    log_classified(&classified, rule, &facts.chain, &ctx);

    let mut out = Responder::new(ctx.request_id)
        .taxonomy_error(&classified)
        .into_response();
    // Keep headers set by inner layers (e.g. WWW-Authenticate), but never a stale body length.
    for (name, value) in response.headers() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            out.headers_mut().append(name.clone(), value.clone());
        }
    }
    out
}
