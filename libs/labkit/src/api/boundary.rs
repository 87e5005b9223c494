//! Error channel between handlers and the terminal error handler.
//!
//! Handlers return `ApiResult<T>`. Any failure converted with `?` becomes an
//! `ApiError`, whose `IntoResponse` does not serialize anything: it parks the
//! error in the response extensions as a `PendingError` for
//! `error_handling_middleware` to classify, log and format exactly once.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};
use http_body_util::LengthLimitError;
use labkit_errors::TaxonomyError;

use super::envelope::generic_failure_body;
use crate::classify::{Classifier, Facts, PanicFault};
use crate::context::RequestId;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) const BODY_TOO_LARGE: &str = "Request body too large";

/// Map a failed body read onto the taxonomy. Overruns of the configured body
/// limit are reported as such, anything else as an unreadable body.
#[must_use]
pub(crate) fn unreadable_body(err: &axum::Error) -> TaxonomyError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return TaxonomyError::validation(BODY_TOO_LARGE);
        }
        source = e.source();
    }
    TaxonomyError::validation("Request body could not be read")
}

/// Standard result type for handlers.
pub type ApiResult<T = super::responder::ApiResponse> = Result<T, ApiError>;

enum Repr {
    Taxonomy(TaxonomyError),
    Foreign(BoxError),
}

impl fmt::Debug for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Taxonomy(e) => fmt::Debug::fmt(e, f),
            Self::Foreign(e) => fmt::Debug::fmt(e, f),
        }
    }
}

/// Any failure raised by a handler or middleware.
///
/// Deliberately not `std::error::Error`, so every `E: Into<BoxError>` converts with `?`.
#[derive(Debug)]
pub struct ApiError(Repr);

impl<E> From<E> for ApiError
where
    E: Into<BoxError>,
{
    fn from(err: E) -> Self {
        match err.into().downcast::<TaxonomyError>() {
            Ok(taxonomy) => Self(Repr::Taxonomy(*taxonomy)),
            Err(foreign) => Self(Repr::Foreign(foreign)),
        }
    }
}

impl ApiError {
    /// The taxonomy error, when the handler raised one directly.
    #[must_use]
    pub fn taxonomy(&self) -> Option<&TaxonomyError> {
        match &self.0 {
            Repr::Taxonomy(e) => Some(e),
            Repr::Foreign(_) => None,
        }
    }

    #[must_use]
    pub fn into_pending(self) -> PendingError {
        PendingError(Arc::new(self.0))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self
            .taxonomy()
            .map_or(StatusCode::INTERNAL_SERVER_ERROR, TaxonomyError::status);

        // Body only reaches the wire when no error handler is installed.
        let mut res = (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            generic_failure_body(RequestId::generate().as_str()),
        )
            .into_response();
        res.extensions_mut().insert(self.into_pending());
        res
    }
}

/// Error parked in response extensions, awaiting the terminal handler.
#[derive(Debug, Clone)]
pub struct PendingError(Arc<Repr>);

impl PendingError {
    /// Classify the parked error, returning the matching rule name and the facts
    /// gathered from the source chain.
    #[must_use]
    pub fn classify(&self, classifier: &Classifier) -> (&'static str, TaxonomyError, Facts) {
        let facts = match self.0.as_ref() {
            Repr::Taxonomy(e) => Facts::gather(e),
            Repr::Foreign(e) => Facts::gather(e.as_ref()),
        };
        let (rule, classified) = classifier.classify_facts(&facts);
        (rule, classified, facts)
    }
}

/// Panic handler for `tower_http::catch_panic::CatchPanicLayer::custom`.
///
/// The panic travels the same channel as a returned error: it is parked as a
/// non-operational fault and classified by the terminal handler.
#[must_use]
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "non-string panic payload".to_owned()
    };
    ApiError::from(PanicFault(detail)).into_response()
}

/// Run detached async work and forward its failure, including a panic or
/// cancellation of the spawned task, into the handler error channel.
///
/// # Errors
/// Returns the work's own error, or the join failure when the task did not finish.
pub async fn settle<F, T, E>(work: F) -> ApiResult<T>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ApiError::from(err)),
        Err(join) if join.is_panic() => {
            let payload = join.into_panic();
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            Err(ApiError::from(PanicFault(detail)))
        }
        Err(join) => Err(ApiError::from(join)),
    }
}
