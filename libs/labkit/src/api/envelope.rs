//! Wire envelope shared by every response.

use chrono::{DateTime, SecondsFormat, Utc};
use labkit_errors::{ErrorKind, OPAQUE_INTERNAL_MESSAGE, ResponseCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

/// `{ success, code, message, data | error, pagination?, timestamp, requestId }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    pub code: ResponseCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct ErrorBody {
    pub kind: ErrorKind,
    /// Always present on the wire; `null` when the error carries no details
    #[serde(default)]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    /// `total_pages = ceil(total / page_size)`, `0` when `page_size` is `0`.
    #[must_use]
    pub const fn new(page: u64, page_size: u64, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Self {
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

/// Last-resort body when the envelope itself cannot be serialized. Only plain
/// strings are interpolated, so this always yields a complete envelope.
#[must_use]
pub(crate) fn generic_failure_body(request_id: &str) -> String {
    format!(
        r#"{{"success":false,"code":"INTERNAL_ERROR","message":"{OPAQUE_INTERNAL_MESSAGE}","error":{{"kind":"SYSTEM","details":null}},"timestamp":"{}","requestId":{}}}"#,
        Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Value::from(request_id),
    )
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(PaginationMeta::new(1, 10, 95).total_pages, 10);
        assert_eq!(PaginationMeta::new(1, 10, 100).total_pages, 10);
        assert_eq!(PaginationMeta::new(1, 10, 101).total_pages, 11);
        assert_eq!(PaginationMeta::new(1, 10, 0).total_pages, 0);
        assert_eq!(PaginationMeta::new(1, 0, 5).total_pages, 0);
    }

    #[test]
    fn error_envelope_wire_shape() {
        let env: Envelope<()> = Envelope {
            success: false,
            code: ResponseCode::NotFound,
            message: "Sample not found".to_owned(),
            data: None,
            error: Some(ErrorBody {
                kind: ErrorKind::Business,
                details: None,
            }),
            pagination: None,
            timestamp: Utc::now(),
            request_id: "req-1".to_owned(),
        };

        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["code"], "NOT_FOUND");
        assert_eq!(v["error"], json!({"kind": "BUSINESS", "details": null}));
        assert_eq!(v["requestId"], "req-1");
        assert!(v.get("data").is_none());
        assert!(v.get("pagination").is_none());
    }

    #[test]
    fn generic_body_is_a_complete_envelope() {
        let v: Value = serde_json::from_str(&generic_failure_body("req-\"7\"")).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["code"], "INTERNAL_ERROR");
        assert_eq!(v["message"], OPAQUE_INTERNAL_MESSAGE);
        assert_eq!(v["error"], json!({"kind": "SYSTEM", "details": null}));
        assert_eq!(v["requestId"], "req-\"7\"");

        let env: Envelope<Value> = serde_json::from_value(v).unwrap();
        assert!(env.timestamp <= Utc::now());
    }
}
