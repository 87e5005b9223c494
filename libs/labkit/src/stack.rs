//! Assembles the full request pipeline around an application router.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use http::{Method, Uri};
use labkit_errors::TaxonomyError;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::api::boundary::{ApiError, panic_response};
use crate::api::error_layer::{ErrorPipeline, error_handling_middleware};
use crate::classify::Classifier;
use crate::config::{PipelineConfig, PipelineConfigError};
use crate::context::{MakeRequestUuid, push_request_id};
use crate::telemetry::trace_layer;

/// Builder for the middleware stack shared by every LabOps service.
#[derive(Debug, Clone)]
#[must_use]
pub struct Pipeline {
    config: PipelineConfig,
    classifier: Option<Classifier>,
    body_limit: Option<usize>,
    timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            classifier: None,
            body_limit: None,
            timeout: None,
        }
    }

    /// Replace the classifier derived from configuration.
    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = Some(bytes);
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Wrap `router` with the pipeline.
    ///
    /// Runtime order (outermost -> innermost):
    ///   1. `SetRequestId`        - keep the caller's id or mint one
    ///   2. `PropagateRequestId`  - echo the id on the response
    ///   3. Trace                - one span per request
    ///   4. `push_request_id`     - validate the id, record it on the span and in extensions
    ///   5. `ErrorHandling`       - classify, log and format every failure
    ///   6. `BodyLimit`           - reject oversized bodies
    ///   7. `CatchPanic`          - turn panics into pending errors
    ///   8. Timeout              - bound handler time
    ///   9. Router
    ///
    /// A known path requested with an unrouted method is answered like an
    /// unknown path, with a `NotFound` envelope.
    ///
    /// # Errors
    /// Returns an error when a configured header name is invalid.
    pub fn apply(self, mut router: Router) -> Result<Router, PipelineConfigError> {
        let header = self.config.request_id_header()?;
        let mut errors = ErrorPipeline::from_config(&self.config)?;
        if let Some(classifier) = self.classifier {
            errors = errors.with_classifier(classifier);
        }
        if let Some(bytes) = self.body_limit {
            errors = errors.with_body_limit(bytes);
        }

        router = router.method_not_allowed_fallback(route_not_found);

        // 8) Timeout
        if let Some(limit) = self.timeout {
            router = router.layer(from_fn_with_state(limit, enforce_timeout));
        }

        // 7) Panics travel the error channel
        router = router.layer(CatchPanicLayer::custom(panic_response));

        // 6) Body limit
        if let Some(bytes) = self.body_limit {
            router = router.layer(RequestBodyLimitLayer::new(bytes));
            router = router.layer(DefaultBodyLimit::max(bytes));
        }

        // 5) Terminal error handler
        router = router.layer(from_fn_with_state(
            Arc::new(errors),
            error_handling_middleware,
        ));

        // 4) Record request_id into span + extensions
        router = router.layer(from_fn_with_state(header.clone(), push_request_id));

        // 3) Trace
        router = router.layer(trace_layer(header.clone()));

        // 2) PropagateRequestId
        router = router.layer(PropagateRequestIdLayer::new(header.clone()));

        // 1) SetRequestId (registered last, runs first)
        router = router.layer(SetRequestIdLayer::new(header, MakeRequestUuid));

        Ok(router)
    }
}

/// Bounds handler time; an elapsed deadline surfaces as `ServiceUnavailable`.
pub async fn enforce_timeout(State(limit): State<Duration>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(res) => res,
        Err(elapsed) => ApiError::from(elapsed).into_response(),
    }
}

/// Router fallback: unmatched paths and methods become `NotFound` envelopes.
pub async fn route_not_found(method: Method, uri: Uri) -> ApiError {
    TaxonomyError::not_found(format!("Route {method} {} not found", uri.path())).into()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::{get, post};
    use http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(pipeline: Pipeline) -> Router {
        let router = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/echo", post(|body: String| async move { body }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .route(
                "/boom",
                get(|| async {
                    let items: Vec<u8> = Vec::new();
                    format!("{}", items[3])
                }),
            )
            .fallback(route_not_found);
        pipeline.apply(router).unwrap()
    }

    async fn json(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unmatched_route_is_not_found_envelope() {
        let res = app(Pipeline::new(PipelineConfig::default()))
            .oneshot(
                http::Request::get("/nowhere")
                    .header("x-request-id", "trace-me-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()["x-request-id"], "trace-me-1");
        let v = json(res).await;
        assert_eq!(v["code"], "NOT_FOUND");
        assert_eq!(v["requestId"], "trace-me-1");
    }

    #[tokio::test]
    async fn panics_become_internal_envelopes() {
        let res = app(Pipeline::new(PipelineConfig::default()))
            .oneshot(http::Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = json(res).await;
        assert_eq!(v["code"], "INTERNAL_ERROR");
        assert_eq!(v["error"]["kind"], "SYSTEM");
    }

    #[tokio::test]
    async fn timeouts_become_service_unavailable() {
        let res = app(Pipeline::new(PipelineConfig::default()).timeout(Duration::from_millis(50)))
            .oneshot(http::Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let v = json(res).await;
        assert_eq!(v["code"], "SERVICE_UNAVAILABLE");
        assert_eq!(v["error"]["details"]["reason"], "timed out");
    }

    #[tokio::test]
    async fn unrouted_method_is_not_found_envelope() {
        let res = app(Pipeline::new(PipelineConfig::default()))
            .oneshot(http::Request::delete("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let v = json(res).await;
        assert_eq!(v["code"], "NOT_FOUND");
        assert_eq!(v["message"], "Route DELETE /ok not found");
        assert_eq!(v["success"], false);
    }

    #[tokio::test]
    async fn declared_oversized_body_is_validation_envelope() {
        let res = app(Pipeline::new(PipelineConfig::default()).body_limit(16))
            .oneshot(
                http::Request::post("/echo")
                    .header("x-request-id", "big-body-1")
                    .header("content-length", "64")
                    .body(Body::from("x".repeat(64)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.headers()["content-type"], "application/json");
        assert_eq!(res.headers()["x-request-id"], "big-body-1");
        let v = json(res).await;
        assert_eq!(v["code"], "VALIDATION_ERROR");
        assert_eq!(v["message"], "Request body too large");
        assert_eq!(v["requestId"], "big-body-1");
    }

    #[tokio::test]
    async fn streamed_oversized_body_is_validation_envelope() {
        let res = app(Pipeline::new(PipelineConfig::default()).body_limit(16))
            .oneshot(
                http::Request::post("/echo")
                    .body(Body::from("x".repeat(64)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let v = json(res).await;
        assert_eq!(v["code"], "VALIDATION_ERROR");
        assert_eq!(v["message"], "Request body too large");
    }

    #[tokio::test]
    async fn bodies_within_limit_reach_the_handler() {
        let res = app(Pipeline::new(PipelineConfig::default()).body_limit(16))
            .oneshot(http::Request::post("/echo").body(Body::from("short")).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"short");
    }

    #[tokio::test]
    async fn generated_request_id_matches_envelope() {
        let res = app(Pipeline::new(PipelineConfig::default()))
            .oneshot(http::Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = res.headers()["x-request-id"].to_str().unwrap().to_owned();
        assert_eq!(json(res).await["requestId"], header.as_str());
    }
}
