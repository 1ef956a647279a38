//! `Validate` response and its builder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConfigMap;

/// A single problem found in a configuration map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The offending configuration key.
    pub field: String,

    /// Human-readable description.
    pub message: String,

    /// Machine-readable code (e.g., "required", "invalid_type").
    #[serde(default)]
    pub code: String,
}

impl ValidationError {
    /// Creates a validation error.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

/// The outcome of a `Validate` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// True when `errors` is empty.
    pub valid: bool,

    /// Problems found, in discovery order.
    #[serde(default)]
    pub errors: Vec<ValidationError>,
}

impl ValidateResponse {
    /// Creates a response with no errors.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Creates a response with a single error.
    #[must_use]
    pub fn invalid(error: ValidationError) -> Self {
        Self {
            valid: false,
            errors: vec![error],
        }
    }

    /// Starts a [`ValidationBuilder`].
    #[must_use]
    pub fn builder() -> ValidationBuilder {
        ValidationBuilder::default()
    }
}

/// Accumulates validation errors, then produces a [`ValidateResponse`].
///
/// ```
/// use cadence_plugin::{ConfigMap, ValidateResponse};
///
/// let config = ConfigMap::new();
/// let response = ValidateResponse::builder()
///     .required(&config, "webhook_url")
///     .build();
/// assert!(!response.valid);
/// assert_eq!(response.errors[0].code, "required");
/// ```
#[derive(Debug, Default)]
pub struct ValidationBuilder {
    errors: Vec<ValidationError>,
}

impl ValidationBuilder {
    /// Records an error.
    #[must_use]
    pub fn add_error(
        mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        self.errors.push(ValidationError::new(field, message, code));
        self
    }

    /// Records an error when `condition` is false.
    #[must_use]
    pub fn check(
        self,
        condition: bool,
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        if condition {
            self
        } else {
            self.add_error(field, message, code)
        }
    }

    /// Requires `field` to be present, non-null and, for strings, non-empty.
    #[must_use]
    pub fn required(self, config: &ConfigMap, field: &str) -> Self {
        let present = match config.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };
        self.check(present, field, format!("{field} is required"), "required")
    }

    /// Requires `field`, when present, to be a string.
    #[must_use]
    pub fn string(self, config: &ConfigMap, field: &str) -> Self {
        let ok = config.get(field).is_none_or(Value::is_string);
        self.check(
            ok,
            field,
            format!("{field} must be a string"),
            "invalid_type",
        )
    }

    /// Appends every error of another builder.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.errors.extend(other.errors);
        self
    }

    /// Returns true if no error has been recorded yet.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Finalizes the response.
    #[must_use]
    pub fn build(self) -> ValidateResponse {
        ValidateResponse {
            valid: self.errors.is_empty(),
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_empty_builder_is_valid() {
        let response = ValidateResponse::builder().build();
        assert!(response.valid);
        assert!(response.errors.is_empty());
    }

    #[test]
    fn test_add_error_keeps_order() {
        let response = ValidateResponse::builder()
            .add_error("a", "first", "x")
            .add_error("b", "second", "y")
            .build();

        assert!(!response.valid);
        let fields: Vec<_> = response.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b"]);
    }

    #[test]
    fn test_required() {
        let cfg = config(json!({"present": "yes", "blank": "  ", "null": null, "flag": false}));
        let response = ValidateResponse::builder()
            .required(&cfg, "present")
            .required(&cfg, "flag")
            .required(&cfg, "blank")
            .required(&cfg, "null")
            .required(&cfg, "missing")
            .build();

        let fields: Vec<_> = response.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["blank", "null", "missing"]);
        assert!(response.errors.iter().all(|e| e.code == "required"));
    }

    #[test]
    fn test_string_type_check() {
        let cfg = config(json!({"name": 3, "ok": "fine"}));
        let response = ValidateResponse::builder()
            .string(&cfg, "name")
            .string(&cfg, "ok")
            .string(&cfg, "absent")
            .build();

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].code, "invalid_type");
    }

    #[test]
    fn test_merge() {
        let left = ValidateResponse::builder().add_error("a", "m", "c");
        let right = ValidateResponse::builder().add_error("b", "m", "c");
        let merged = left.merge(right);
        assert!(!merged.is_valid());
        assert_eq!(merged.build().errors.len(), 2);
    }

    #[test]
    fn test_invalid_helper() {
        let response = ValidateResponse::invalid(ValidationError::new("config", "bad", "parse_error"));
        assert!(!response.valid);
        assert_eq!(response.errors.len(), 1);
    }
}
