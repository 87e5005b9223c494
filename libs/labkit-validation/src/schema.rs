//! Schema grammar: an object schema is an ordered list of named fields plus
//! cross-field rules; a field is a type, presence flags and constraints.
//!
//! ```ignore
//! let schema = Schema::new()
//!     .field("username", Field::string().required().min_length(3).max_length(32))
//!     .field("phone", Field::string().with(predicates::phone()))
//!     .field("page", Field::integer().min(1.0).default_value(json!(1)));
//! ```

use regex::Regex;
use serde_json::Value;

use crate::predicates::{self, ObjectRule, Predicate};

/// Declared JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldType {
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Number => "a number",
            Self::Boolean => "a boolean",
            Self::Array => "an array",
            Self::Object => "an object",
            Self::Any => "a value",
        }
    }
}

/// Constraint applied after type checking and coercion.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Minimum string length (chars) or array item count
    MinLength(usize),
    /// Maximum string length (chars) or array item count
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Pattern(Regex),
    OneOf(Vec<Value>),
    Predicate(Predicate),
}

#[derive(Debug, Clone)]
pub(crate) enum Shape {
    Scalar,
    Array(Box<Field>),
    Object(Schema),
}

/// One field declaration.
#[derive(Debug, Clone)]
#[must_use]
pub struct Field {
    pub(crate) ty: FieldType,
    pub(crate) shape: Shape,
    pub(crate) required: bool,
    pub(crate) nullable: bool,
    pub(crate) sensitive: bool,
    pub(crate) default: Option<Value>,
    pub(crate) constraints: Vec<Constraint>,
}

impl Field {
    fn scalar(ty: FieldType) -> Self {
        Self {
            ty,
            shape: Shape::Scalar,
            required: false,
            nullable: false,
            sensitive: false,
            default: None,
            constraints: Vec::new(),
        }
    }

    pub fn string() -> Self {
        Self::scalar(FieldType::String)
    }

    pub fn integer() -> Self {
        Self::scalar(FieldType::Integer)
    }

    pub fn number() -> Self {
        Self::scalar(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::scalar(FieldType::Boolean)
    }

    pub fn any() -> Self {
        Self::scalar(FieldType::Any)
    }

    pub fn array(items: Field) -> Self {
        Self {
            shape: Shape::Array(Box::new(items)),
            ..Self::scalar(FieldType::Array)
        }
    }

    pub fn object(schema: Schema) -> Self {
        Self {
            shape: Shape::Object(schema),
            ..Self::scalar(FieldType::Object)
        }
    }

    /// String field checked by the mobile phone predicate.
    pub fn phone() -> Self {
        Self::string().with(predicates::phone())
    }

    /// String field checked by the resident id predicate.
    pub fn id_number() -> Self {
        Self::string().with(predicates::id_number())
    }

    /// Sensitive string field checked by the password strength predicate.
    pub fn password() -> Self {
        Self::string().sensitive().with(predicates::password_strength())
    }

    pub fn uuid() -> Self {
        Self::string().with(predicates::uuid())
    }

    pub fn email() -> Self {
        Self::string().with(predicates::email())
    }

    pub fn date() -> Self {
        Self::string().with(predicates::date())
    }

    pub fn file(max_bytes: u64, allowed_types: &[&str]) -> Self {
        Self::any().with(predicates::file(max_bytes, allowed_types))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Offending values of this field are never echoed in violations.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Value inserted into sanitized output when the field is absent.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.constraints.push(Constraint::MinLength(n));
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.constraints.push(Constraint::MaxLength(n));
        self
    }

    pub fn min(mut self, n: f64) -> Self {
        self.constraints.push(Constraint::Min(n));
        self
    }

    pub fn max(mut self, n: f64) -> Self {
        self.constraints.push(Constraint::Max(n));
        self
    }

    pub fn pattern(mut self, re: Regex) -> Self {
        self.constraints.push(Constraint::Pattern(re));
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constraints
            .push(Constraint::OneOf(values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.constraints.push(Constraint::Predicate(predicate));
        self
    }

    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.ty
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// Object schema bound to one request target.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Schema {
    pub(crate) fields: Vec<(String, Field)>,
    pub(crate) rules: Vec<ObjectRule>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field. Redeclaring a name replaces the earlier declaration in place.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = field;
        } else {
            self.fields.push((name, field));
        }
        self
    }

    pub fn rule(mut self, rule: ObjectRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.rules.is_empty()
    }

    /// Validate ad hoc with default options.
    ///
    /// # Errors
    /// Returns `SchemaError` carrying every violation when the payload is invalid.
    pub fn check(&self, data: &Value) -> Result<Value, crate::SchemaError> {
        crate::validate(self, data, &crate::ValidationOptions::default()).into_result()
    }
}
