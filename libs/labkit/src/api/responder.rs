//! Response formatter bound to the current request's correlation id.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use http::request::Parts;
use http::{StatusCode, header};
use labkit_errors::{ErrorKind, ResponseCode, TaxonomyError};
use serde::Serialize;
use serde_json::Value;

use super::envelope::{Envelope, ErrorBody, PaginationMeta, generic_failure_body};
use crate::context::RequestId;

/// Serialized envelope plus status, ready to become an HTTP response.
#[derive(Debug, Clone)]
#[must_use]
pub struct ApiResponse {
    status: StatusCode,
    body: Option<Vec<u8>>,
}

impl ApiResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// `None` for bodiless responses such as 204.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    fn generic_failure(request_id: &RequestId) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: Some(generic_failure_body(request_id.as_str()).into_bytes()),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (
                self.status,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response(),
            None => self.status.into_response(),
        }
    }
}

/// Builds envelopes for one request. Extracted per handler call from the
/// `RequestId` extension; a fresh id is generated when none was assigned.
#[derive(Debug, Clone)]
pub struct Responder {
    request_id: RequestId,
}

impl<S: Send + Sync> FromRequestParts<S> for Responder {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(RequestId::generate);
        Ok(Self::new(request_id))
    }
}

impl Responder {
    #[must_use]
    pub fn new(request_id: RequestId) -> Self {
        Self { request_id }
    }

    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// 200 / `OK`.
    pub fn success<T: Serialize>(&self, data: T, message: impl Into<String>) -> ApiResponse {
        self.success_with(data, message, StatusCode::OK, ResponseCode::Ok)
    }

    /// Success with an explicit status and code.
    pub fn success_with<T: Serialize>(
        &self,
        data: T,
        message: impl Into<String>,
        status: StatusCode,
        code: ResponseCode,
    ) -> ApiResponse {
        self.render(
            status,
            Envelope {
                success: true,
                code,
                message: message.into(),
                data: Some(data),
                error: None,
                pagination: None,
                timestamp: Utc::now(),
                request_id: self.request_id.to_string(),
            },
        )
    }

    /// 201 / `CREATED`.
    pub fn created<T: Serialize>(&self, data: T, message: impl Into<String>) -> ApiResponse {
        self.success_with(data, message, StatusCode::CREATED, ResponseCode::Created)
    }

    /// 200 with `pagination` next to the item list.
    pub fn paginated<T: Serialize>(
        &self,
        items: Vec<T>,
        pagination: PaginationMeta,
        message: impl Into<String>,
    ) -> ApiResponse {
        self.render(
            StatusCode::OK,
            Envelope {
                success: true,
                code: ResponseCode::Ok,
                message: message.into(),
                data: Some(items),
                error: None,
                pagination: Some(pagination),
                timestamp: Utc::now(),
                request_id: self.request_id.to_string(),
            },
        )
    }

    pub fn error(
        &self,
        message: impl Into<String>,
        status: StatusCode,
        code: ResponseCode,
        kind: ErrorKind,
        details: Option<Value>,
    ) -> ApiResponse {
        self.render::<()>(
            status,
            Envelope {
                success: false,
                code,
                message: message.into(),
                data: None,
                error: Some(ErrorBody { kind, details }),
                pagination: None,
                timestamp: Utc::now(),
                request_id: self.request_id.to_string(),
            },
        )
    }

    /// Error envelope for an already classified failure.
    pub fn taxonomy_error(&self, err: &TaxonomyError) -> ApiResponse {
        self.error(
            err.message(),
            err.status(),
            err.code(),
            err.kind(),
            err.details().cloned(),
        )
    }

    /// 204 without a body.
    pub fn no_content(&self) -> ApiResponse {
        ApiResponse {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }

    fn render<T: Serialize>(&self, status: StatusCode, envelope: Envelope<T>) -> ApiResponse {
        match serde_json::to_vec(&envelope) {
            Ok(body) => ApiResponse {
                status,
                body: Some(body),
            },
            Err(e) => {
                tracing::error!(
                    error = %e,
                    request_id = %self.request_id,
                    "failed to serialize response envelope"
                );
                ApiResponse::generic_failure(&self.request_id)
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn responder() -> Responder {
        Responder::new(RequestId::parse("req-42").unwrap())
    }

    fn body(res: &ApiResponse) -> Value {
        serde_json::from_slice(res.body().unwrap()).unwrap()
    }

    #[test]
    fn success_envelope() {
        let res = responder().success(json!({"id": 1}), "Loaded");
        assert_eq!(res.status(), StatusCode::OK);

        let v = body(&res);
        assert_eq!(v["success"], true);
        assert_eq!(v["code"], "OK");
        assert_eq!(v["message"], "Loaded");
        assert_eq!(v["data"], json!({"id": 1}));
        assert_eq!(v["requestId"], "req-42");
        assert!(v["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(v.get("error").is_none());
    }

    #[test]
    fn created_uses_201() {
        let res = responder().created(json!({"id": 7}), "Created");
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(body(&res)["code"], "CREATED");
    }

    #[test]
    fn paginated_envelope() {
        let res = responder().paginated(vec![1, 2, 3], PaginationMeta::new(2, 3, 95), "Page");
        let v = body(&res);
        assert_eq!(v["data"], json!([1, 2, 3]));
        assert_eq!(
            v["pagination"],
            json!({"page": 2, "pageSize": 3, "total": 95, "totalPages": 32})
        );
    }

    #[test]
    fn taxonomy_error_envelope() {
        let err = TaxonomyError::conflict("Resource already exists")
            .with_details(json!({"constraint": "samples_barcode_key"}));
        let res = responder().taxonomy_error(&err);
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let v = body(&res);
        assert_eq!(v["success"], false);
        assert_eq!(v["code"], "CONFLICT");
        assert_eq!(v["error"]["kind"], "BUSINESS");
        assert_eq!(v["error"]["details"]["constraint"], "samples_barcode_key");
    }

    #[test]
    fn unserializable_data_degrades_to_generic_failure() {
        // JSON object keys must be strings
        let mut bad: HashMap<Vec<u8>, u8> = HashMap::new();
        bad.insert(vec![1], 1);

        let res = responder().success(bad, "never");
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = body(&res);
        assert_eq!(v["code"], "INTERNAL_ERROR");
        assert_eq!(v["requestId"], "req-42");
        assert!(v["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn no_content_has_no_body() {
        let res = responder().no_content();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.body().is_none());
    }
}
