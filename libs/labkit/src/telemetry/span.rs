//! Request span for `TraceLayer`.
//!
//! `request_id`, `status` and `latency_ms` start empty and are recorded later by
//! `push_request_id` and on response.

use std::time::Duration;

use http::{HeaderName, Request, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer};
use tracing::Span;
use tracing::field::Empty;

#[derive(Debug, Clone)]
pub struct RequestSpan {
    header: HeaderName,
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, req: &Request<B>) -> Span {
        let supplied = req
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("n/a");

        tracing::info_span!(
            "http_request",
            method = %req.method(),
            path = %req.uri().path(),
            supplied_request_id = %supplied,
            request_id = Empty,
            status = Empty,
            latency_ms = Empty,
            "user_agent.original" = req
                .headers()
                .get(http::header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("unknown"),
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordOutcome;

impl<B> OnResponse<B> for RecordOutcome {
    fn on_response(self, res: &Response<B>, latency: Duration, span: &Span) {
        span.record("status", res.status().as_u16());
        span.record("latency_ms", latency.as_millis());
        tracing::debug!(parent: span, "request completed");
    }
}

pub type PipelineTraceLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, DefaultOnRequest, RecordOutcome>;

#[must_use]
pub fn trace_layer(header: HeaderName) -> PipelineTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan { header })
        .on_response(RecordOutcome)
}
