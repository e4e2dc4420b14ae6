//! Argument substitution for handler bodies.
//!
//! Text bodies and command arguments use the same small template syntax:
//! - `{{param}}` is replaced with the value of `param`
//! - `{{#if param}}content{{/if}}` keeps content only if `param` is set
//! - `{{#if param}}content{{else}}alternative{{/if}}` with else support
//!
//! Strings are inserted as-is, `null` and missing values as nothing, and
//! every other value as its JSON text.

use serde_json::{Map, Value};

use super::error::HandlerFailure;

/// Text form of an argument value.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a template with the given arguments.
///
/// Placeholders are resolved in one pass over the template. Inserted values
/// are never scanned again, so a value containing `{{name}}` stays literal.
pub fn render(template: &str, arguments: &Map<String, Value>) -> Result<String, HandlerFailure> {
    let template = process_conditionals(template, arguments)?;
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template.as_str();

    while let Some(open) = rest.find("{{") {
        rendered.push_str(&rest[..open]);
        let inner = &rest[open + 2..];
        let Some(close) = inner.find("}}") else {
            rest = &rest[open..];
            break;
        };
        let tag = &inner[..close];

        // Optional arguments the caller left out render as nothing.
        if tag.contains('#') || tag.contains('/') {
            rendered.push_str(&rest[open..open + close + 4]);
        } else if let Some(value) = arguments.get(tag.trim()) {
            rendered.push_str(&value_to_text(value));
        }
        rest = &inner[close + 2..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}

fn is_set(arguments: &Map<String, Value>, name: &str) -> bool {
    match arguments.get(name) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Process `{{#if}}` blocks. Blocks do not nest.
fn process_conditionals(
    template: &str,
    arguments: &Map<String, Value>,
) -> Result<String, HandlerFailure> {
    const ENDIF: &str = "{{/if}}";
    const ELSE: &str = "{{else}}";
    let mut result = template.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_end = if_start
            + result[if_start..]
                .find("}}")
                .ok_or_else(|| HandlerFailure::render("unclosed {{#if}} tag"))?;
        let var_name = result[if_start + 6..var_end].trim().to_string();

        let endif_pos = var_end
            + result[var_end..]
                .find(ENDIF)
                .ok_or_else(|| HandlerFailure::render("missing {{/if}} tag"))?;

        let block = &result[var_end + 2..endif_pos];
        let (when_set, when_unset) = match block.find(ELSE) {
            Some(else_pos) => (&block[..else_pos], &block[else_pos + ELSE.len()..]),
            None => (block, ""),
        };
        let replacement = if is_set(arguments, &var_name) { when_set } else { when_unset };

        result = format!(
            "{}{}{}",
            &result[..if_start],
            replacement,
            &result[endif_pos + ENDIF.len()..]
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_simple_substitution() {
        let result = render("Hello, {{name}}!", &args(json!({"name": "World"}))).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_non_string_values() {
        let values = args(json!({"a": 2, "b": true, "c": null, "d": [1]}));
        let result = render("{{a}} {{b}} {{c}} {{d}}", &values).unwrap();
        assert_eq!(result, "2 true  [1]");
    }

    #[test]
    fn test_conditional_with_value() {
        let values = args(json!({"name": "World"}));
        let result = render("Hello{{#if name}}, {{name}}{{/if}}!", &values).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_conditional_without_value() {
        let result = render("Hello{{#if name}}, {{name}}{{/if}}!", &Map::new()).unwrap();
        assert_eq!(result, "Hello!");
    }

    #[test]
    fn test_conditional_with_else() {
        let template = "Hello, {{#if name}}{{name}}{{else}}stranger{{/if}}!";
        let result = render(template, &Map::new()).unwrap();
        assert_eq!(result, "Hello, stranger!");
    }

    #[test]
    fn test_unmatched_placeholders_are_removed() {
        let result = render("a{{missing}}b", &Map::new()).unwrap();
        assert_eq!(result, "ab");
    }

    #[test]
    fn test_unclosed_conditional() {
        assert!(render("{{#if x}}never closed", &Map::new()).is_err());
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let result = render("Hi {{who}}!", &args(json!({"who": "{{x}} literal"}))).unwrap();
        assert_eq!(result, "Hi {{x}} literal!");

        let result = render("a={{a}}", &args(json!({"a": "{{b}}", "b": "SECRET"}))).unwrap();
        assert_eq!(result, "a={{b}}");
    }

    #[test]
    fn test_unterminated_placeholder_is_kept() {
        let result = render("x {{a}} {{tail", &args(json!({"a": 1}))).unwrap();
        assert_eq!(result, "x 1 {{tail");
    }

    #[test]
    fn test_placeholder_whitespace() {
        let result = render("{{ name }}", &args(json!({"name": "padded"}))).unwrap();
        assert_eq!(result, "padded");
    }
}
