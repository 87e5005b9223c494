use serde::{Deserialize, Serialize};

/// Engine switches. Deserializes from configuration with the same defaults as `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ValidationOptions {
    /// Keep unrecognized fields instead of rejecting them (ignored when `strip_unknown` is set)
    pub allow_unknown: bool,
    /// Silently drop unrecognized fields from the sanitized output
    pub strip_unknown: bool,
    /// Stop at the first violation instead of collecting all of them
    pub abort_early: bool,
    /// Coerce compatible types, e.g. numeric strings to numbers
    pub convert: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            allow_unknown: false,
            strip_unknown: true,
            abort_early: false,
            convert: true,
        }
    }
}

impl ValidationOptions {
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strip_unknown: false,
            convert: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn abort_early(mut self, yes: bool) -> Self {
        self.abort_early = yes;
        self
    }

    #[must_use]
    pub fn allow_unknown(mut self, yes: bool) -> Self {
        self.allow_unknown = yes;
        self
    }

    #[must_use]
    pub fn strip_unknown(mut self, yes: bool) -> Self {
        self.strip_unknown = yes;
        self
    }

    #[must_use]
    pub fn convert(mut self, yes: bool) -> Self {
        self.convert = yes;
        self
    }
}
