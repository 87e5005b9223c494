//! Validation engine: checks and coerces one JSON payload against a `Schema`.
//!
//! `validate` is pure and never fails; the outcome is returned as a `ValidationResult`.
//! With `abort_early = false` every violation in the payload is collected in one pass.

use labkit_errors::FieldViolation;
use serde_json::{Map, Number, Value};

use crate::error::SchemaError;
use crate::options::ValidationOptions;
use crate::schema::{Constraint, Field, FieldType, Schema, Shape};

/// Outcome of one validation call. Sanitized data exists only when valid,
/// violations only when invalid.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum ValidationResult {
    Valid(Value),
    Invalid(Vec<FieldViolation>),
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Valid(v) => Some(v),
            Self::Invalid(_) => None,
        }
    }

    #[must_use]
    pub fn errors(&self) -> Option<&[FieldViolation]> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(e) => Some(e),
        }
    }

    /// # Errors
    /// Returns `SchemaError` with all violations when the result is invalid.
    pub fn into_result(self) -> Result<Value, SchemaError> {
        match self {
            Self::Valid(v) => Ok(v),
            Self::Invalid(e) => Err(SchemaError::new(e)),
        }
    }
}

/// Validate `data` against `schema`. A `null` payload is treated as an empty object
/// so absent request sections still surface `required` violations.
pub fn validate(schema: &Schema, data: &Value, options: &ValidationOptions) -> ValidationResult {
    let mut run = Run {
        options,
        violations: Vec::new(),
    };
    let empty = Value::Object(Map::new());
    let input = if data.is_null() { &empty } else { data };
    let sanitized = run.object(schema, input, "");

    if run.violations.is_empty() {
        ValidationResult::Valid(sanitized)
    } else {
        ValidationResult::Invalid(run.violations)
    }
}

struct Run<'o> {
    options: &'o ValidationOptions,
    violations: Vec<FieldViolation>,
}

impl Run<'_> {
    fn halted(&self) -> bool {
        self.options.abort_early && !self.violations.is_empty()
    }

    fn reject(
        &mut self,
        path: &str,
        rule: &str,
        tail: &str,
        value: Option<&Value>,
        sensitive: bool,
    ) {
        let label = if path.is_empty() { "value" } else { path };
        let mut v = FieldViolation::new(label, rule, format!("\"{label}\" {tail}"));
        if !sensitive {
            v.value = value.cloned();
        }
        self.violations.push(v);
    }

    fn object(&mut self, schema: &Schema, value: &Value, path: &str) -> Value {
        let Some(input) = value.as_object() else {
            let tail = format!("must be {}", FieldType::Object.describe());
            self.reject(path, "type", &tail, Some(value), false);
            return value.clone();
        };

        let mut out = Map::new();
        for (name, field) in &schema.fields {
            if self.halted() {
                return Value::Object(out);
            }
            let child = join(path, name);
            match input.get(name) {
                Some(v) => {
                    let cleaned = self.field(field, v, &child);
                    out.insert(name.clone(), cleaned);
                }
                None if field.required => {
                    self.reject(&child, "required", "is required", None, field.sensitive);
                }
                None => {
                    if let Some(default) = &field.default {
                        out.insert(name.clone(), default.clone());
                    }
                }
            }
        }

        for (key, v) in input {
            if schema.get(key).is_some() || self.options.strip_unknown {
                continue;
            }
            if self.options.allow_unknown {
                out.insert(key.clone(), v.clone());
                continue;
            }
            if self.halted() {
                break;
            }
            self.reject(&join(path, key), "unknown", "is not allowed", Some(v), false);
        }

        for rule in &schema.rules {
            if self.halted() {
                break;
            }
            if let Some((blamed, rejection)) = rule.check(&out) {
                let sensitive = schema.get(&blamed).is_some_and(|f| f.sensitive);
                let offending = out.get(&blamed).cloned();
                self.reject(
                    &join(path, &blamed),
                    rejection.rule,
                    &rejection.message,
                    offending.as_ref(),
                    sensitive,
                );
            }
        }

        Value::Object(out)
    }

    fn field(&mut self, field: &Field, value: &Value, path: &str) -> Value {
        if value.is_null() {
            if !field.nullable {
                self.reject(path, "nullable", "must not be null", None, field.sensitive);
            }
            return Value::Null;
        }

        let Some(coerced) = coerce(field.ty, value, self.options.convert) else {
            let tail = format!("must be {}", field.ty.describe());
            self.reject(path, "type", &tail, Some(value), field.sensitive);
            return value.clone();
        };

        let shaped = match &field.shape {
            Shape::Scalar => coerced,
            Shape::Array(items) => {
                let mut out = Vec::new();
                if let Value::Array(elements) = &coerced {
                    for (i, element) in elements.iter().enumerate() {
                        if self.halted() {
                            break;
                        }
                        out.push(self.field(items, element, &join(path, &i.to_string())));
                    }
                }
                Value::Array(out)
            }
            Shape::Object(schema) => self.object(schema, &coerced, path),
        };

        if field.required && shaped.as_str() == Some("") {
            self.reject(
                path,
                "required",
                "is not allowed to be empty",
                Some(&shaped),
                field.sensitive,
            );
            return shaped;
        }

        self.constraints(field, &shaped, path);
        shaped
    }

    fn constraints(&mut self, field: &Field, value: &Value, path: &str) {
        for constraint in &field.constraints {
            if self.halted() {
                return;
            }
            let failure: Option<(&str, String)> = match constraint {
                Constraint::MinLength(n) => length(value)
                    .filter(|len| len < n)
                    .map(|_| ("min-length", min_length_tail(value, *n))),
                Constraint::MaxLength(n) => length(value)
                    .filter(|len| len > n)
                    .map(|_| ("max-length", max_length_tail(value, *n))),
                Constraint::Min(n) => value
                    .as_f64()
                    .filter(|x| x < n)
                    .map(|_| ("min", format!("must be greater than or equal to {n}"))),
                Constraint::Max(n) => value
                    .as_f64()
                    .filter(|x| x > n)
                    .map(|_| ("max", format!("must be less than or equal to {n}"))),
                Constraint::Pattern(re) => value
                    .as_str()
                    .filter(|s| !re.is_match(s))
                    .map(|_| ("pattern", format!("fails to match the required pattern: {re}"))),
                Constraint::OneOf(allowed) => (!allowed.contains(value)).then(|| {
                    let listed: Vec<String> = allowed.iter().map(Value::to_string).collect();
                    ("one-of", format!("must be one of [{}]", listed.join(", ")))
                }),
                Constraint::Predicate(p) => p.check(value).err().map(|r| (r.rule, r.message)),
            };

            if let Some((rule, tail)) = failure {
                self.reject(path, rule, &tail, Some(value), field.sensitive);
            }
        }
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{path}.{name}")
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        _ => None,
    }
}

fn min_length_tail(value: &Value, n: usize) -> String {
    if value.is_array() {
        format!("must contain at least {n} items")
    } else {
        format!("length must be at least {n} characters long")
    }
}

fn max_length_tail(value: &Value, n: usize) -> String {
    if value.is_array() {
        format!("must contain less than or equal to {n} items")
    } else {
        format!("length must be less than or equal to {n} characters long")
    }
}

/// Type check with optional coercion. `None` means the value cannot satisfy the type.
fn coerce(ty: FieldType, value: &Value, convert: bool) -> Option<Value> {
    match (ty, value) {
        (FieldType::Any, v) => Some(v.clone()),
        (FieldType::String, Value::String(_))
        | (FieldType::Number, Value::Number(_))
        | (FieldType::Boolean, Value::Bool(_))
        | (FieldType::Array, Value::Array(_))
        | (FieldType::Object, Value::Object(_)) => Some(value.clone()),
        (FieldType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
        _ if !convert => None,
        (FieldType::Integer, Value::Number(n)) => n.as_f64().and_then(whole_number),
        (FieldType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (FieldType::Number, Value::String(s)) => parse_number(s.trim()),
        (FieldType::Boolean, Value::String(s)) => match s.trim() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldType::Array, scalar) if !scalar.is_object() => Some(Value::Array(vec![scalar.clone()])),
        (FieldType::Object, Value::String(s)) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(Value::is_object),
        _ => None,
    }
}

#[allow(
    clippy::float_cmp,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
fn whole_number(f: f64) -> Option<Value> {
    (f.is_finite() && f.trunc() == f && f >= i64::MIN as f64 && f <= i64::MAX as f64)
        .then(|| Value::from(f as i64))
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
