//! Parameter schemas - declared argument shapes for capabilities.
//!
//! Planner output is untrusted, so every argument map passes through
//! [`validate_arguments`] before a handler sees it. Defaults for absent
//! optional parameters are filled in as part of validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// JSON shape a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParameterType {
    /// Returns true if the value has this JSON shape.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Object => value.is_object(),
            ParameterType::Array => value.is_array(),
        }
    }

    /// JSON Schema type keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
            ParameterType::Array => "array",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared parameter of a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSchema {
    /// Creates a required parameter.
    pub fn required(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
            default: None,
        }
    }

    /// Creates an optional parameter.
    pub fn optional(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            description: description.into(),
            default: None,
        }
    }

    /// Sets the default used when the argument is absent.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Checks a single value against this parameter's type.
    pub fn check(&self, value: &Value) -> Result<(), ParameterError> {
        if self.param_type.matches(value) {
            Ok(())
        } else {
            Err(ParameterError::InvalidType {
                name: self.name.clone(),
                expected: self.param_type,
                actual: json_type_name(value).to_string(),
            })
        }
    }

    /// Renders this parameter as a JSON Schema property.
    pub fn to_json_schema(&self) -> Value {
        let mut property = serde_json::json!({
            "type": self.param_type.as_str(),
            "description": self.description,
        });
        if let (Some(default), Some(obj)) = (&self.default, property.as_object_mut()) {
            obj.insert("default".to_string(), default.clone());
        }
        property
    }
}

/// Errors produced while validating arguments against parameter schemas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("Missing required parameter: {name}")]
    MissingRequired { name: String },

    #[error("Invalid type for parameter {name}: expected {expected}, got {actual}")]
    InvalidType {
        name: String,
        expected: ParameterType,
        actual: String,
    },
}

/// Validates arguments in place, inserting defaults for absent optional parameters.
///
/// `null` counts as absent. Unknown extra arguments are left untouched.
pub fn validate_arguments(
    schemas: &[ParameterSchema],
    args: &mut Map<String, Value>,
) -> Result<(), ParameterError> {
    validate_arguments_with(schemas, args, |_| false)
}

/// Like [`validate_arguments`], but skips the type check for values where
/// `deferred` returns true (e.g. values still holding unresolved placeholders).
pub fn validate_arguments_with<F>(
    schemas: &[ParameterSchema],
    args: &mut Map<String, Value>,
    deferred: F,
) -> Result<(), ParameterError>
where
    F: Fn(&Value) -> bool,
{
    for schema in schemas {
        match args.get(&schema.name) {
            Some(value) if !value.is_null() => {
                if !deferred(value) {
                    schema.check(value)?;
                }
            }
            _ => {
                if let Some(default) = &schema.default {
                    args.insert(schema.name.clone(), default.clone());
                } else if schema.required {
                    return Err(ParameterError::MissingRequired {
                        name: schema.name.clone(),
                    });
                } else {
                    args.remove(&schema.name);
                }
            }
        }
    }
    Ok(())
}

/// Builds a JSON Schema object describing a parameter list.
pub fn parameters_json_schema(schemas: &[ParameterSchema]) -> Value {
    let properties: Map<String, Value> = schemas
        .iter()
        .map(|p| (p.name.clone(), p.to_json_schema()))
        .collect();
    let required: Vec<&str> = schemas
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    serde_json::json!({
        "type": "object",
        "required": required,
        "properties": properties,
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ticker_schema() -> Vec<ParameterSchema> {
        vec![
            ParameterSchema::required("ticker", ParameterType::String, "Token ticker"),
            ParameterSchema::optional("currency", ParameterType::String, "Quote currency")
                .with_default(json!("USD")),
            ParameterSchema::optional("limit", ParameterType::Number, "Max rows"),
        ]
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn valid_arguments_pass_and_receive_defaults() {
        let mut map = args(json!({"ticker": "KAS"}));
        validate_arguments(&ticker_schema(), &mut map).unwrap();

        assert_eq!(map["ticker"], "KAS");
        assert_eq!(map["currency"], "USD");
        assert!(!map.contains_key("limit"));
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let mut map = args(json!({"currency": "EUR"}));
        let err = validate_arguments(&ticker_schema(), &mut map).unwrap_err();

        assert_eq!(
            err,
            ParameterError::MissingRequired {
                name: "ticker".to_string()
            }
        );
    }

    #[test]
    fn null_required_argument_counts_as_missing() {
        let mut map = args(json!({"ticker": null}));
        let result = validate_arguments(&ticker_schema(), &mut map);
        assert!(matches!(result, Err(ParameterError::MissingRequired { .. })));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let mut map = args(json!({"ticker": 42}));
        let err = validate_arguments(&ticker_schema(), &mut map).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Invalid type for parameter ticker: expected string, got number"
        );
    }

    #[test]
    fn unknown_arguments_are_tolerated() {
        let mut map = args(json!({"ticker": "KAS", "verbose": true}));
        validate_arguments(&ticker_schema(), &mut map).unwrap();
        assert_eq!(map["verbose"], true);
    }

    #[test]
    fn deferred_values_skip_type_check() {
        let mut map = args(json!({"ticker": "KAS", "limit": "${count}"}));
        validate_arguments_with(&ticker_schema(), &mut map, |v| {
            v.as_str().is_some_and(|s| s.contains("${"))
        })
        .unwrap();
        assert_eq!(map["limit"], "${count}");
    }

    #[test]
    fn number_accepts_integers_and_floats() {
        assert!(ParameterType::Number.matches(&json!(3)));
        assert!(ParameterType::Number.matches(&json!(3.5)));
        assert!(!ParameterType::Number.matches(&json!("3")));
    }

    #[test]
    fn json_schema_lists_required_and_properties() {
        let schema = parameters_json_schema(&ticker_schema());

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["ticker"]));
        assert_eq!(schema["properties"]["ticker"]["type"], "string");
        assert_eq!(schema["properties"]["currency"]["default"], "USD");
    }

    #[test]
    fn parameter_type_serializes_lowercase() {
        let json = serde_json::to_string(&ParameterType::Boolean).unwrap();
        assert_eq!(json, "\"boolean\"");
    }
}
