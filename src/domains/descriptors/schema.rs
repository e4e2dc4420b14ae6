//! Parameter schema types.
//!
//! A function declares its inputs loosely (a name and an optional type name).
//! This module turns those declarations into a closed set of semantic types
//! and renders them as the JSON Schema object MCP clients expect.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

/// Semantic type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
    /// No inferable type. Validation accepts any value.
    Any,
}

impl ParamType {
    /// Name used in manifests and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }

    /// JSON Schema `type` keyword for this parameter type, if any.
    fn json_schema_type(&self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Integer => Some("integer"),
            Self::Float => Some("number"),
            Self::Boolean => Some("boolean"),
            Self::Object => Some("object"),
            Self::Array => Some("array"),
            Self::Any => None,
        }
    }

    /// Whether a JSON value already has this type, without coercion.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = String;

    /// Parse a declared type name. A few common aliases are accepted so that
    /// module authors can write the names their own language uses.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "str" | "text" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "float" | "number" | "double" => Ok(Self::Float),
            "boolean" | "bool" => Ok(Self::Boolean),
            "object" | "dict" | "map" => Ok(Self::Object),
            "array" | "list" => Ok(Self::Array),
            "any" | "" => Ok(Self::Any),
            other => Err(format!("unknown parameter type '{}'", other)),
        }
    }
}

/// One declared input of a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name, unique within its function.
    pub name: String,

    /// Semantic type.
    #[serde(rename = "type")]
    pub kind: ParamType,

    /// Whether the caller must supply it.
    pub required: bool,

    /// Value used when an optional parameter is omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Human-readable description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParamSpec {
    /// JSON Schema fragment describing this parameter.
    fn to_property(&self) -> Value {
        let mut property = Map::new();
        if let Some(kind) = self.kind.json_schema_type() {
            property.insert("type".to_string(), json!(kind));
        }
        if !self.description.is_empty() {
            property.insert("description".to_string(), json!(self.description));
        }
        if let Some(default) = self.default.as_ref().filter(|d| !d.is_null()) {
            property.insert("default".to_string(), default.clone());
        }
        Value::Object(property)
    }
}

/// Render an ordered parameter list as a JSON Schema object.
pub fn input_schema(params: &[ParamSpec]) -> Map<String, Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in params {
        properties.insert(param.name.clone(), param.to_property());
        if param.required {
            required.push(json!(param.name));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, kind: ParamType, required: bool) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            kind,
            required,
            default: None,
            description: String::new(),
        }
    }

    #[test]
    fn test_parse_type_aliases() {
        assert_eq!("int".parse::<ParamType>().unwrap(), ParamType::Integer);
        assert_eq!("Number".parse::<ParamType>().unwrap(), ParamType::Float);
        assert_eq!("list".parse::<ParamType>().unwrap(), ParamType::Array);
        assert_eq!("".parse::<ParamType>().unwrap(), ParamType::Any);
        assert!("uuid".parse::<ParamType>().is_err());
    }

    #[test]
    fn test_accepts() {
        assert!(ParamType::Integer.accepts(&json!(3)));
        assert!(!ParamType::Integer.accepts(&json!(3.5)));
        assert!(ParamType::Float.accepts(&json!(3)));
        assert!(ParamType::Any.accepts(&json!({"a": 1})));
        assert!(!ParamType::String.accepts(&json!(1)));
    }

    #[test]
    fn test_input_schema() {
        let mut b = param("b", ParamType::Float, false);
        b.default = Some(json!(1.5));
        b.description = "Second operand".to_string();
        let a = param("a", ParamType::Integer, true);
        let c = param("c", ParamType::Any, false);
        let schema = input_schema(&[a, b, c]);

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "integer");
        assert_eq!(schema["properties"]["b"]["type"], "number");
        assert_eq!(schema["properties"]["b"]["default"], 1.5);
        assert_eq!(schema["properties"]["b"]["description"], "Second operand");
        assert!(schema["properties"]["c"].get("type").is_none());
        assert_eq!(schema["required"], json!(["a"]));
    }

    #[test]
    fn test_properties_keep_declaration_order() {
        let schema = input_schema(&[
            param("zeta", ParamType::String, true),
            param("alpha", ParamType::String, true),
        ]);
        let keys: Vec<_> = schema["properties"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(schema["required"], json!(["zeta", "alpha"]));
    }

    #[test]
    fn test_input_schema_without_required() {
        let schema = input_schema(&[param("x", ParamType::String, false)]);
        assert!(schema.get("required").is_none());
    }
}
