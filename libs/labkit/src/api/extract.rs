//! Typed access to sanitized request sections.
//!
//! `ValidBody<T>` and friends deserialize from `ValidatedSections`, so they
//! only ever see data that already passed the route's `ValidationLayer`.

use axum::extract::FromRequestParts;
use http::request::Parts;
use labkit_errors::Target;
use serde::de::DeserializeOwned;

use super::boundary::ApiError;
use super::validation::ValidatedSections;

/// Handler/route wiring mistakes. Never caused by client input, so they
/// classify as internal faults.
#[derive(Debug, thiserror::Error)]
pub enum SectionError {
    #[error("{0} section was not validated for this route")]
    NotValidated(Target),
    #[error("validated {target} section does not fit the handler type: {message}")]
    Mismatch { target: Target, message: String },
}

fn section<T: DeserializeOwned>(parts: &Parts, target: Target) -> Result<T, SectionError> {
    let value = parts
        .extensions
        .get::<ValidatedSections>()
        .and_then(|sections| sections.get(target))
        .ok_or(SectionError::NotValidated(target))?;
    T::deserialize(value).map_err(|e| SectionError::Mismatch {
        target,
        message: e.to_string(),
    })
}

macro_rules! valid_section {
    ($(#[$doc:meta])* $name:ident => $target:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name<T>(pub T);

        impl<T, S> FromRequestParts<S> for $name<T>
        where
            T: DeserializeOwned + Send,
            S: Send + Sync,
        {
            type Rejection = ApiError;

            async fn from_request_parts(
                parts: &mut Parts,
                _state: &S,
            ) -> Result<Self, Self::Rejection> {
                Ok(Self(section(parts, $target)?))
            }
        }
    };
}

valid_section!(
    /// Sanitized JSON body.
    ValidBody => Target::Body
);
valid_section!(
    /// Sanitized query string.
    ValidQuery => Target::Query
);
valid_section!(
    /// Sanitized path parameters.
    ValidParams => Target::Params
);
valid_section!(
    /// Sanitized declared headers.
    ValidHeaders => Target::Headers
);
