//! Built-in constraint messages and the message resolution precedence.
//!
//! Precedence, highest first: field-level `x-jsf-errorMessage` (or the
//! deprecated `errorMessage` alias) > `input_types.<type>.errorMessage`
//! config > built-in default per constraint keyword.

use serde_json::{Map, Value};

use crate::types::{DEPRECATED_ERROR_MESSAGE_KEY, ERROR_MESSAGE_KEY};

/// Render a JSON value for inclusion in a message: strings unquoted,
/// everything else in its JSON form.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Built-in default message for a constraint keyword, parameterized by the
/// schema node that declared the constraint.
pub(crate) fn built_in_message(keyword: &str, node: &Map<String, Value>) -> Option<String> {
    match keyword {
        "required" => Some("Required field".to_string()),
        "type" => {
            let ty = node
                .get("type")
                .map(display_value)
                .unwrap_or_else(|| "valid value".to_string());
            Some(format!("The value must be a {ty}"))
        }
        "minimum" => node
            .get("minimum")
            .map(|limit| format!("Must be greater or equal to {}", display_value(limit))),
        "maximum" => node
            .get("maximum")
            .map(|limit| format!("Must be smaller or equal to {}", display_value(limit))),
        "minLength" => node
            .get("minLength")
            .map(|limit| format!("Please insert at least {} characters", display_value(limit))),
        "maxLength" => node
            .get("maxLength")
            .map(|limit| format!("Please insert up to {} characters", display_value(limit))),
        "const" => node
            .get("const")
            .map(|expected| format!("The only accepted value is {}.", display_value(expected))),
        "enum" | "oneOf" | "anyOf" => Some("The option is not valid.".to_string()),
        "pattern" => Some("Must have a valid format".to_string()),
        "maxItems" => node
            .get("maxItems")
            .map(|limit| format!("Must have at most {} items", display_value(limit))),
        "minItems" => node
            .get("minItems")
            .map(|limit| format!("Must have at least {} items", display_value(limit))),
        _ => None,
    }
}

/// The field-level error-message map of a schema node, if any.
///
/// The `x-jsf-errorMessage` form wins; the deprecated unprefixed alias is
/// honored only when the prefixed form is absent.
pub(crate) fn field_error_messages(node: &Map<String, Value>) -> Option<&Map<String, Value>> {
    node.get(ERROR_MESSAGE_KEY)
        .or_else(|| node.get(DEPRECATED_ERROR_MESSAGE_KEY))
        .and_then(Value::as_object)
}

/// Resolve the message for one constraint violation.
///
/// `node` is the (annotation-carrying) schema node of the violated field and
/// `input_type` its resolved input type name; `input_types_config` is the
/// per-type override map from [`crate::FormConfig`]. `fallback` is the
/// engine's own message, used when no built-in default applies.
pub(crate) fn resolve_message(
    keyword: &str,
    node: &Map<String, Value>,
    input_type: &str,
    input_types_config: &Map<String, Value>,
    fallback: &str,
) -> String {
    if let Some(messages) = field_error_messages(node) {
        if let Some(Value::String(msg)) = messages.get(keyword) {
            return msg.clone();
        }
    }

    if let Some(Value::String(msg)) = input_types_config
        .get(input_type)
        .and_then(|cfg| cfg.get("errorMessage"))
        .and_then(|m| m.get(keyword))
    {
        return msg.clone();
    }

    built_in_message(keyword, node).unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn built_in_required() {
        assert_eq!(
            built_in_message("required", &Map::new()).as_deref(),
            Some("Required field")
        );
    }

    #[test]
    fn built_in_const_formats_numbers_bare() {
        let n = node(json!({ "const": 10 }));
        assert_eq!(
            built_in_message("const", &n).as_deref(),
            Some("The only accepted value is 10.")
        );
    }

    #[test]
    fn built_in_range_messages() {
        let n = node(json!({ "minimum": 5, "maximum": 100 }));
        assert_eq!(
            built_in_message("minimum", &n).as_deref(),
            Some("Must be greater or equal to 5")
        );
        assert_eq!(
            built_in_message("maximum", &n).as_deref(),
            Some("Must be smaller or equal to 100")
        );
    }

    #[test]
    fn field_message_wins_over_config_and_default() {
        let n = node(json!({
            "minimum": 0,
            "x-jsf-errorMessage": { "minimum": "No negative amounts" }
        }));
        let config = node(json!({
            "number": { "errorMessage": { "minimum": "Too small" } }
        }));
        let msg = resolve_message("minimum", &n, "number", &config, "engine says no");
        assert_eq!(msg, "No negative amounts");
    }

    #[test]
    fn config_message_wins_over_default() {
        let n = node(json!({ "minimum": 0 }));
        let config = node(json!({
            "number": { "errorMessage": { "minimum": "Too small" } }
        }));
        let msg = resolve_message("minimum", &n, "number", &config, "engine says no");
        assert_eq!(msg, "Too small");
    }

    #[test]
    fn deprecated_alias_honored_when_prefixed_absent() {
        let n = node(json!({
            "errorMessage": { "required": "Fill this in" }
        }));
        let msg = resolve_message("required", &n, "text", &Map::new(), "fallback");
        assert_eq!(msg, "Fill this in");

        let both = node(json!({
            "x-jsf-errorMessage": { "required": "Prefixed wins" },
            "errorMessage": { "required": "Legacy" }
        }));
        let msg = resolve_message("required", &both, "text", &Map::new(), "fallback");
        assert_eq!(msg, "Prefixed wins");
    }

    #[test]
    fn unknown_keyword_falls_back_to_engine_message() {
        let msg = resolve_message("uniqueItems", &Map::new(), "text", &Map::new(), "engine");
        assert_eq!(msg, "engine");
    }
}
