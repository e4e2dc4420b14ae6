//! Argument validation and coercion.
//!
//! Callers (usually language models) often send `"2"` for an integer or
//! `"true"` for a boolean. Arguments are converted to their declared type
//! when the conversion is lossless; anything else is a type mismatch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;

use super::error::DispatchError;
use crate::domains::descriptors::{ParamSpec, ParamType};

/// Treatment of arguments that match no declared parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraArguments {
    /// Fail with `UnexpectedArgument`.
    #[default]
    Reject,

    /// Drop them silently.
    Ignore,
}

impl FromStr for ExtraArguments {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!(
                "unknown extra arguments mode '{other}' (expected reject or ignore)"
            )),
        }
    }
}

impl fmt::Display for ExtraArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => f.write_str("reject"),
            Self::Ignore => f.write_str("ignore"),
        }
    }
}

/// Check arguments against a parameter list and coerce them.
///
/// Returns the argument object the handler receives: declared parameters in
/// declaration order, defaults filled in, optional parameters without a
/// default left out.
pub fn validate(
    params: &[ParamSpec],
    mut arguments: Map<String, Value>,
    extra: ExtraArguments,
) -> Result<Map<String, Value>, DispatchError> {
    if extra == ExtraArguments::Reject
        && let Some(name) = arguments
            .keys()
            .find(|name| !params.iter().any(|param| &param.name == *name))
    {
        return Err(DispatchError::UnexpectedArgument { name: name.clone() });
    }

    let mut validated = Map::new();
    for param in params {
        let supplied = arguments.remove(&param.name).filter(|value| !value.is_null());

        let value = match supplied {
            Some(value) => coerce(value, param.kind).map_err(|value| DispatchError::TypeMismatch {
                name: param.name.clone(),
                expected: param.kind,
                found: describe(&value),
            })?,
            None => match (&param.default, param.required) {
                (Some(default), _) => default.clone(),
                (None, true) => {
                    return Err(DispatchError::MissingArgument {
                        name: param.name.clone(),
                    });
                }
                (None, false) => continue,
            },
        };
        validated.insert(param.name.clone(), value);
    }

    Ok(validated)
}

/// Convert a value to the given type, handing it back unchanged on failure.
pub fn coerce(value: Value, kind: ParamType) -> Result<Value, Value> {
    if kind.accepts(&value) {
        return Ok(value);
    }

    let coerced = match (kind, &value) {
        (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

        (ParamType::Integer, Value::String(s)) => parse_integer(s.trim()),
        (ParamType::Integer, Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| Value::Number(Number::from(f as i64))),

        (ParamType::Float, Value::String(s)) => {
            let s = s.trim();
            parse_integer(s).or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            })
        }

        (ParamType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(Value::Bool(true)),
            "false" | "no" | "off" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        (ParamType::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },

        (ParamType::Object, Value::String(s)) => {
            serde_json::from_str::<Value>(s).ok().filter(Value::is_object)
        }
        (ParamType::Array, Value::String(s)) => {
            serde_json::from_str::<Value>(s).ok().filter(Value::is_array)
        }

        _ => None,
    };

    coerced.ok_or(value)
}

fn parse_integer(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    s.parse::<u64>().ok().map(|u| Value::Number(u.into()))
}

/// Short description of a value for error messages.
fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    let mut text = value.to_string();
    if text.len() > 40 {
        let cut = (0..=40).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
        text.truncate(cut);
        text.push_str("...");
    }
    format!("{kind} {text}")
}
