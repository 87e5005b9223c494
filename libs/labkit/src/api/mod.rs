//! HTTP surface of the pipeline: envelopes, the error channel, the terminal
//! error handler and request validation.

pub mod boundary;
pub mod envelope;
pub mod error_layer;
pub mod extract;
pub mod responder;
pub mod validation;

pub use boundary::{ApiError, ApiResult, BoxError, PendingError, panic_response, settle};
pub use envelope::{Envelope, ErrorBody, PaginationMeta};
pub use error_layer::{ErrorPipeline, RequestSnapshot, error_handling_middleware};
pub use extract::{SectionError, ValidBody, ValidHeaders, ValidParams, ValidQuery};
pub use responder::{ApiResponse, Responder};
pub use validation::{ValidatedSections, ValidationLayer, validate_request};

/// Prelude module that re-exports common API types for handler authors
pub mod prelude {
    // Result type and error channel
    pub use super::boundary::{ApiError, ApiResult, settle};

    // Response sugar
    pub use super::envelope::PaginationMeta;
    pub use super::responder::{ApiResponse, Responder};

    // Validated request sections
    pub use super::extract::{ValidBody, ValidHeaders, ValidParams, ValidQuery};
    pub use super::validation::{ValidationLayer, validate_request};

    // Taxonomy and schema grammar
    pub use labkit_errors::{Target, TaxonomyError};
    pub use labkit_validation::{Field, ObjectRule, Predicate, Schema, ValidationOptions};

    // Useful axum bits (common in handlers)
    pub use axum::{http::StatusCode, response::IntoResponse};
}
