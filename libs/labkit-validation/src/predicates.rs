//! Custom predicate library
//!
//! Atomic predicates take one raw field value and either accept it or return a
//! `Rejection` carrying a rule tag and a message tail (the engine prefixes the
//! field label). Cross-field rules (`ObjectRule`) receive the partially validated
//! object and name the field they blame.

use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};

/// Why a predicate refused a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub rule: &'static str,
    pub message: String,
}

impl Rejection {
    pub fn new(rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}

type CheckFn = dyn Fn(&Value) -> Result<(), Rejection> + Send + Sync;
type ObjectCheckFn = dyn Fn(&Map<String, Value>) -> Option<(String, Rejection)> + Send + Sync;

/// Named single-field predicate.
#[derive(Clone)]
pub struct Predicate {
    name: &'static str,
    check: Arc<CheckFn>,
}

impl Predicate {
    pub fn new<F>(name: &'static str, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), Rejection> + Send + Sync + 'static,
    {
        Self {
            name,
            check: Arc::new(check),
        }
    }

    /// Predicate over string values; other JSON types are rejected with `type`.
    pub fn on_str<F>(name: &'static str, check: F) -> Self
    where
        F: Fn(&str) -> Result<(), Rejection> + Send + Sync + 'static,
    {
        Self::new(name, move |value| match value.as_str() {
            Some(s) => check(s),
            None => Err(Rejection::new("type", "must be a string")),
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// # Errors
    /// Returns the `Rejection` produced by the predicate body.
    pub fn check(&self, value: &Value) -> Result<(), Rejection> {
        (self.check)(value)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Named cross-field rule evaluated on the partially validated object.
#[derive(Clone)]
pub struct ObjectRule {
    name: &'static str,
    check: Arc<ObjectCheckFn>,
}

impl ObjectRule {
    pub fn new<F>(name: &'static str, check: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Option<(String, Rejection)> + Send + Sync + 'static,
    {
        Self {
            name,
            check: Arc::new(check),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the blamed field name and rejection, if the rule fails.
    #[must_use]
    pub fn check(&self, object: &Map<String, Value>) -> Option<(String, Rejection)> {
        (self.check)(object)
    }
}

impl fmt::Debug for ObjectRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRule").field("name", &self.name).finish_non_exhaustive()
    }
}

// ===== pure checks ==========================================================

#[allow(clippy::expect_used)]
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email regex is valid")
});

/// Mainland mobile number: 11 digits starting with `1[3-9]`, optional `+86`/`86` prefix.
#[must_use]
pub fn is_mobile_phone(s: &str) -> bool {
    let digits = s
        .strip_prefix("+86")
        .or_else(|| s.strip_prefix("86").filter(|rest| rest.len() == 11))
        .unwrap_or(s);
    let bytes = digits.as_bytes();
    bytes.len() == 11
        && bytes.iter().all(u8::is_ascii_digit)
        && bytes[0] == b'1'
        && (b'3'..=b'9').contains(&bytes[1])
}

const ID_WEIGHTS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];
const ID_CHECK_CHARS: [u8; 11] = *b"10X98765432";

/// 18-character resident id: region, birth date, sequence, ISO 7064 MOD 11-2 check char.
#[must_use]
pub fn is_resident_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 18 || !bytes[..17].iter().all(u8::is_ascii_digit) {
        return false;
    }
    if NaiveDate::parse_from_str(&s[6..14], "%Y%m%d").is_err() {
        return false;
    }
    let sum: u32 = bytes[..17]
        .iter()
        .zip(ID_WEIGHTS)
        .map(|(b, w)| u32::from(b - b'0') * w)
        .sum();
    let expected = ID_CHECK_CHARS[(sum % 11) as usize];
    bytes[17].to_ascii_uppercase() == expected
}

/// Returns the first unmet strength requirement, `None` when the password is acceptable.
#[must_use]
pub fn password_weakness(s: &str) -> Option<&'static str> {
    let len = s.chars().count();
    if len < 8 {
        return Some("must be at least 8 characters long");
    }
    if len > 128 {
        return Some("must be at most 128 characters long");
    }
    if !s.chars().any(|c| c.is_ascii_lowercase()) {
        return Some("must contain a lowercase letter");
    }
    if !s.chars().any(|c| c.is_ascii_uppercase()) {
        return Some("must contain an uppercase letter");
    }
    if !s.chars().any(|c| c.is_ascii_digit()) {
        return Some("must contain a digit");
    }
    None
}

#[must_use]
pub fn is_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

#[must_use]
pub fn is_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

/// Parses RFC 3339 timestamps (normalized to UTC) and plain `YYYY-MM-DD` dates (midnight).
#[must_use]
pub fn parse_calendar_date(s: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ===== predicate constructors ===============================================

#[must_use]
pub fn phone() -> Predicate {
    Predicate::on_str("phone", |s| {
        if is_mobile_phone(s) {
            Ok(())
        } else {
            Err(Rejection::new("phone", "must be a valid mobile phone number"))
        }
    })
}

#[must_use]
pub fn id_number() -> Predicate {
    Predicate::on_str("id-number", |s| {
        if is_resident_id(s) {
            Ok(())
        } else {
            Err(Rejection::new("id-number", "must be a valid identity number"))
        }
    })
}

#[must_use]
pub fn password_strength() -> Predicate {
    Predicate::on_str("password", |s| match password_weakness(s) {
        None => Ok(()),
        Some(reason) => Err(Rejection::new("password", reason)),
    })
}

#[must_use]
pub fn email() -> Predicate {
    Predicate::on_str("email", |s| {
        if is_email(s) {
            Ok(())
        } else {
            Err(Rejection::new("email", "must be a valid email"))
        }
    })
}

#[must_use]
pub fn uuid() -> Predicate {
    Predicate::on_str("uuid", |s| {
        if is_uuid(s) {
            Ok(())
        } else {
            Err(Rejection::new("uuid", "must be a valid GUID"))
        }
    })
}

#[must_use]
pub fn date() -> Predicate {
    Predicate::on_str("date", |s| {
        if parse_calendar_date(s).is_some() {
            Ok(())
        } else {
            Err(Rejection::new("date", "must be a valid date"))
        }
    })
}

/// Uploaded-file descriptor check on `{ "size": <bytes>, "mimetype": "<type>" }`.
#[must_use]
pub fn file(max_bytes: u64, allowed_types: &[&str]) -> Predicate {
    let allowed: Vec<String> = allowed_types.iter().map(|t| t.to_ascii_lowercase()).collect();
    Predicate::new("file", move |value| {
        let Some(obj) = value.as_object() else {
            return Err(Rejection::new("type", "must be a file descriptor"));
        };
        let size = obj.get("size").and_then(Value::as_u64);
        match size {
            None => return Err(Rejection::new("file.size", "must declare a file size")),
            Some(n) if n > max_bytes => {
                return Err(Rejection::new(
                    "file.size",
                    format!("must not exceed {max_bytes} bytes"),
                ));
            }
            Some(_) => {}
        }
        let mime = obj
            .get("mimetype")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if allowed.is_empty() || allowed.contains(&mime) {
            Ok(())
        } else {
            Err(Rejection::new(
                "file.type",
                format!("type '{mime}' is not one of [{}]", allowed.join(", ")),
            ))
        }
    })
}

/// `end` must not precede `start`. Skips when either side is absent or unparseable;
/// field-level `date()` reports format problems.
#[must_use]
pub fn date_range(start: &'static str, end: &'static str) -> ObjectRule {
    ObjectRule::new("date.range", move |obj| {
        let from = obj.get(start).and_then(Value::as_str).and_then(parse_calendar_date)?;
        let to = obj.get(end).and_then(Value::as_str).and_then(parse_calendar_date)?;
        if to >= from {
            None
        } else {
            Some((
                end.to_owned(),
                Rejection::new("date.range", format!("must not be earlier than \"{start}\"")),
            ))
        }
    })
}
