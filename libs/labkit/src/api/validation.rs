//! Request validation middleware.
//!
//! A `ValidationLayer` binds one schema per request section. Every bound
//! section is validated independently and all violations are aggregated
//! before the request is rejected. On success the sanitized sections replace
//! the raw ones and are also stored as `ValidatedSections` for the `Valid*`
//! extractors.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, RawPathParams, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::request::Parts;
use http::uri::PathAndQuery;
use http::{HeaderMap, HeaderName, HeaderValue, Uri, header};
use labkit_errors::{FieldViolation, Target, TaxonomyError};
use labkit_validation::{Schema, ValidationOptions, ValidationResult, validate};
use serde_json::{Map, Value};

use super::boundary::{ApiError, unreadable_body};

pub const VALIDATION_FAILED: &str = "Validation failed";

/// Target → schema map plus engine options.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ValidationLayer {
    schemas: BTreeMap<Target, Schema>,
    options: ValidationOptions,
}

impl ValidationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a single section.
    pub fn single(target: Target, schema: Schema) -> Self {
        Self::new().target(target, schema)
    }

    pub fn target(mut self, target: Target, schema: Schema) -> Self {
        self.schemas.insert(target, schema);
        self
    }

    pub fn body(self, schema: Schema) -> Self {
        self.target(Target::Body, schema)
    }

    pub fn query(self, schema: Schema) -> Self {
        self.target(Target::Query, schema)
    }

    pub fn params(self, schema: Schema) -> Self {
        self.target(Target::Params, schema)
    }

    pub fn headers(self, schema: Schema) -> Self {
        self.target(Target::Headers, schema)
    }

    pub fn options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Validate every bound section of `req`.
    ///
    /// # Errors
    /// Returns a validation error carrying the violations of all failed sections,
    /// or the failure that prevented a section from being read or rewritten.
    pub async fn apply(&self, req: Request) -> Result<Request, ApiError> {
        if self.is_empty() {
            return Ok(req);
        }
        let (mut parts, body) = req.into_parts();

        let (bytes, passthrough) = if self.schemas.contains_key(&Target::Body) {
            let bytes = axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(|e| unreadable_body(&e))?;
            (Some(bytes), None)
        } else {
            (None, Some(body))
        };

        let mut violations = Vec::new();
        let mut sanitized = BTreeMap::new();
        for (&target, schema) in &self.schemas {
            let raw = match read_section(target, &mut parts, bytes.as_ref()).await {
                Ok(raw) => raw,
                Err(violation) => {
                    violations.push(violation.at(target));
                    continue;
                }
            };
            match validate(schema, &raw, &self.options) {
                ValidationResult::Valid(clean) => {
                    sanitized.insert(target, clean);
                }
                ValidationResult::Invalid(errors) => {
                    violations.extend(errors.into_iter().map(|v| v.at(target)));
                }
            }
        }

        if !violations.is_empty() {
            tracing::debug!(
                violations = violations.len(),
                "request rejected by validation"
            );
            return Err(TaxonomyError::invalid_fields(VALIDATION_FAILED, &violations).into());
        }

        let body = match sanitized.get(&Target::Body) {
            Some(clean) => {
                let encoded = serde_json::to_vec(clean)?;
                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(encoded.len()));
                parts.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                Body::from(encoded)
            }
            None => passthrough.unwrap_or_default(),
        };
        if let Some(clean) = sanitized.get(&Target::Query) {
            rewrite_query(&mut parts, clean)?;
        }
        if let (Some(clean), Some(schema)) = (
            sanitized.get(&Target::Headers),
            self.schemas.get(&Target::Headers),
        ) {
            rewrite_headers(&mut parts.headers, schema, clean);
        }

        match parts.extensions.get_mut::<ValidatedSections>() {
            Some(existing) => existing.0.extend(sanitized),
            None => {
                parts.extensions.insert(ValidatedSections(sanitized));
            }
        }
        Ok(Request::from_parts(parts, body))
    }
}

/// Sanitized sections of the current request, keyed by target.
#[derive(Debug, Clone, Default)]
pub struct ValidatedSections(BTreeMap<Target, Value>);

impl ValidatedSections {
    #[must_use]
    pub fn get(&self, target: Target) -> Option<&Value> {
        self.0.get(&target)
    }

    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.0.keys().copied()
    }
}

/// Middleware entry point for `axum::middleware::from_fn_with_state`.
///
/// Bind it with `route_layer` so path parameters are matched before it runs.
pub async fn validate_request(
    State(layer): State<Arc<ValidationLayer>>,
    req: Request,
    next: Next,
) -> Response {
    match layer.apply(req).await {
        Ok(req) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

async fn read_section(
    target: Target,
    parts: &mut Parts,
    body: Option<&Bytes>,
) -> Result<Value, FieldViolation> {
    match target {
        Target::Body => read_body(body.map_or(&[][..], |b| &b[..])),
        Target::Query => Ok(read_query(parts.uri.query().unwrap_or_default())),
        Target::Params => Ok(match RawPathParams::from_request_parts(parts, &()).await {
            Ok(raw) => Value::Object(
                raw.iter()
                    .map(|(k, v)| (k.to_owned(), Value::from(v)))
                    .collect(),
            ),
            Err(_) => Value::Null,
        }),
        Target::Headers => Ok(read_headers(&parts.headers)),
    }
}

fn read_body(bytes: &[u8]) -> Result<Value, FieldViolation> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| {
        FieldViolation::new("body", "json", format!("\"body\" must be valid JSON: {e}"))
    })
}

/// Decode a query string; repeated keys collect into an array.
fn read_query(query: &str) -> Value {
    let mut out = Map::new();
    for (key, value) in form_pairs(query) {
        push_repeated(&mut out, key, Value::String(value));
    }
    Value::Object(out)
}

fn form_pairs(query: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query).unwrap_or_default()
}

fn read_headers(headers: &HeaderMap) -> Value {
    let mut out = Map::new();
    for (name, value) in headers {
        let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
        push_repeated(&mut out, name.as_str().to_owned(), Value::String(text));
    }
    Value::Object(out)
}

fn push_repeated(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn encode_query(clean: &Value) -> Result<String, serde_urlencoded::ser::Error> {
    let mut pairs = Vec::new();
    if let Value::Object(map) = clean {
        for (key, value) in map {
            match value {
                Value::Array(items) => {
                    pairs.extend(items.iter().filter_map(scalar_text).map(|v| (key.as_str(), v)));
                }
                other => pairs.extend(scalar_text(other).map(|v| (key.as_str(), v))),
            }
        }
    }
    serde_urlencoded::to_string(pairs)
}

fn rewrite_query(parts: &mut Parts, clean: &Value) -> Result<(), ApiError> {
    let query = encode_query(clean)?;
    let path = parts.uri.path();
    let path_and_query = if query.is_empty() {
        PathAndQuery::try_from(path)?
    } else {
        PathAndQuery::try_from(format!("{path}?{query}"))?
    };
    let mut uri = parts.uri.clone().into_parts();
    uri.path_and_query = Some(path_and_query);
    parts.uri = Uri::from_parts(uri)?;
    Ok(())
}

/// Rewrite only the headers the schema declares; transport headers stay as sent.
fn rewrite_headers(headers: &mut HeaderMap, schema: &Schema, clean: &Value) {
    for name in schema.field_names() {
        let Ok(header_name) = HeaderName::try_from(name) else {
            continue;
        };
        let Some(text) = clean.get(name).and_then(scalar_text) else {
            continue;
        };
        if let Ok(value) = HeaderValue::try_from(text) {
            headers.insert(header_name, value);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use labkit_validation::Field;
    use serde_json::json;

    #[test]
    fn query_repeated_keys_become_arrays() {
        let v = read_query("tag=a&tag=b&page=2");
        assert_eq!(v, json!({"tag": ["a", "b"], "page": "2"}));
    }

    #[test]
    fn empty_body_reads_as_null() {
        assert_eq!(read_body(b"").unwrap(), Value::Null);
        assert_eq!(read_body(b"  \n").unwrap(), Value::Null);
    }

    #[test]
    fn malformed_body_is_a_json_violation() {
        let v = read_body(b"{not json").unwrap_err();
        assert_eq!(v.rule, "json");
        assert_eq!(v.field, "body");
    }

    #[test]
    fn sanitized_query_is_re_encoded() {
        let q = encode_query(&json!({"page": 2, "tag": ["a", "b"], "skip": null})).unwrap();
        assert_eq!(q, "page=2&tag=a&tag=b");
    }

    #[test]
    fn only_declared_headers_are_rewritten() {
        let mut headers = HeaderMap::new();
        headers.insert("x-lab-site", HeaderValue::from_static(" North "));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        let schema = Schema::new().field("x-lab-site", Field::string());
        rewrite_headers(&mut headers, &schema, &json!({"x-lab-site": "NORTH"}));

        assert_eq!(headers["x-lab-site"], "NORTH");
        assert_eq!(headers["accept"], "*/*");
    }

    #[tokio::test]
    async fn empty_layer_is_a_no_op() {
        let req = http::Request::post("/x?raw=1").body(Body::from("not json")).unwrap();
        let out = ValidationLayer::new().apply(req).await.unwrap();
        assert_eq!(out.uri().query(), Some("raw=1"));
        assert!(out.extensions().get::<ValidatedSections>().is_none());
    }

    #[tokio::test]
    async fn sections_are_replaced_and_recorded() {
        let layer = ValidationLayer::new()
            .body(Schema::new().field("name", Field::string().required()))
            .query(Schema::new().field("page", Field::integer().default_value(json!(1))));

        let req = http::Request::post("/samples?page=3&debug=1")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"serum","extra":true}"#))
            .unwrap();
        let out = layer.apply(req).await.unwrap();

        assert_eq!(out.uri().query(), Some("page=3"));
        let sections = out.extensions().get::<ValidatedSections>().unwrap().clone();
        assert_eq!(sections.get(Target::Query), Some(&json!({"page": 3})));
        assert_eq!(sections.get(Target::Body), Some(&json!({"name": "serum"})));

        let bytes = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"name":"serum"}"#);
    }

    #[tokio::test]
    async fn unvalidated_body_passes_through() {
        let layer = ValidationLayer::single(
            Target::Query,
            Schema::new().field("page", Field::integer()),
        );
        let req = http::Request::post("/upload?page=1")
            .body(Body::from("raw payload"))
            .unwrap();
        let out = layer.apply(req).await.unwrap();
        let bytes = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"raw payload");
    }
}
