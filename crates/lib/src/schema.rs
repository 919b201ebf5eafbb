//! Schema validation for decoded configuration.
//!
//! Rules operate on the `serde_json::Value` image of a config table, before
//! the typed decode hands it to the host. Each field carries its rules plus
//! the doc metadata the docgen module renders.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Validation rules and doc metadata for one field.
#[derive(Default)]
pub struct Field {
    pub(crate) required: bool,
    pub(crate) pattern: Option<Regex>,
    pub(crate) range: Option<(f64, f64)>,
    pub(crate) custom: Option<Box<dyn Fn(&JsonValue) -> std::result::Result<(), String>>>,
    pub(crate) nested: Option<Schema>,
    pub(crate) doc: Option<String>,
    pub(crate) type_name: Option<String>,
    pub(crate) example: Option<String>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("required", &self.required)
            .field("pattern", &self.pattern.as_ref().map(|r| r.as_str()))
            .field("range", &self.range)
            .field("custom", &self.custom.is_some())
            .field("nested", &self.nested)
            .finish()
    }
}

impl Field {
    pub fn new() -> Self {
        Self::default()
    }

    /// The field must be present and non-null.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// String values must match `pattern`.
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Numeric values must fall within `[min, max]`.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Run a custom check against the field's value.
    pub fn custom<F>(mut self, f: F) -> Self
    where
        F: Fn(&JsonValue) -> std::result::Result<(), String> + 'static,
    {
        self.custom = Some(Box::new(f));
        self
    }

    /// Validate the field's value (an object) against a sub-schema.
    pub fn nested(mut self, schema: Schema) -> Self {
        self.nested = Some(schema);
        self
    }

    /// Human-readable description, rendered by docgen.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Type label for docs (defaults to a guess from the rules).
    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    /// Example value, rendered by docgen.
    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }
}

/// Validation schema for a configuration table.
#[derive(Debug, Default)]
pub struct Schema {
    pub(crate) fields: BTreeMap<String, Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Validate `value` (which must be an object) against this schema.
    pub fn validate(&self, value: &JsonValue) -> Result<()> {
        let object = value.as_object().ok_or_else(|| Error::InvalidType(format!(
            "expected a table, got {}",
            json_type_name(value)
        )))?;

        for (name, field) in &self.fields {
            let entry = object.get(name);

            if field.required && entry.is_none_or(|v| v.is_null()) {
                return Err(Error::Validation {
                    field: name.clone(),
                    message: "required field is missing".to_string(),
                });
            }

            let Some(entry) = entry else { continue };
            if entry.is_null() {
                continue;
            }

            if let Some(pattern) = &field.pattern {
                let s = entry.as_str().ok_or_else(|| Error::Validation {
                    field: name.clone(),
                    message: format!("pattern rule needs a string, got {}", json_type_name(entry)),
                })?;
                if !pattern.is_match(s) {
                    return Err(Error::Validation {
                        field: name.clone(),
                        message: format!("'{}' does not match pattern {}", s, pattern.as_str()),
                    });
                }
            }

            if let Some((min, max)) = field.range {
                let n = entry.as_f64().ok_or_else(|| Error::Validation {
                    field: name.clone(),
                    message: format!("range rule needs a number, got {}", json_type_name(entry)),
                })?;
                if n < min || n > max {
                    return Err(Error::Validation {
                        field: name.clone(),
                        message: format!("{} is outside [{}, {}]", n, min, max),
                    });
                }
            }

            if let Some(custom) = &field.custom {
                custom(entry).map_err(|message| Error::Validation {
                    field: name.clone(),
                    message,
                })?;
            }

            if let Some(nested) = &field.nested {
                nested.validate(entry).map_err(|e| match e {
                    Error::Validation { field, message } => Error::Validation {
                        field: format!("{}.{}", name, field),
                        message,
                    },
                    other => other,
                })?;
            }
        }

        Ok(())
    }
}

pub(crate) fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "nil",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "table",
    }
}
