//! Validation-schema building and engine error mapping.
//!
//! The effective scope schema from conditional resolution is turned into a
//! plain JSON Schema (hidden fields and vendor annotations removed) and
//! handed to the `jsonschema` crate; the engine's errors are then mapped to
//! a nested field-name -> message object with the crate's message
//! resolution precedence applied.

use serde_json::{json, Map, Number, Value};

use crate::error::{FormError, SchemaError};
use crate::fields::{presentation, structural_input_type};
use crate::messages::resolve_message;
use crate::resolve::ResolvedScope;
use crate::types::JSF_ANNOTATIONS;

/// Constraint keywords recognized when reading the violated keyword off the
/// engine's schema path.
const KNOWN_KEYWORDS: &[&str] = &[
    "required",
    "minimum",
    "maximum",
    "minLength",
    "maxLength",
    "pattern",
    "const",
    "enum",
    "type",
    "oneOf",
    "anyOf",
    "minItems",
    "maxItems",
    "multipleOf",
    "format",
];

/// Build the plain JSON Schema used for engine validation this pass.
///
/// Hidden fields are removed from `properties` and `required`; vendor
/// annotations are stripped; `percentage` fields get their implied
/// `0..=100` bounds injected.
pub(crate) fn prepare_validation_schema(resolved: &ResolvedScope) -> Value {
    let mut schema = Value::Object(resolved.schema.clone());

    for path in &resolved.hidden {
        let segments: Vec<&str> = path.split('/').collect();
        remove_property(&mut schema, &segments);
    }

    inject_percentage_bounds(&mut schema);
    strip_annotations(&schema)
}

fn remove_property(schema: &mut Value, segments: &[&str]) {
    let [head, rest @ ..] = segments else {
        return;
    };
    let Some(obj) = schema.as_object_mut() else {
        return;
    };

    if rest.is_empty() {
        if let Some(props) = obj.get_mut("properties").and_then(Value::as_object_mut) {
            props.remove(*head);
        }
        if let Some(required) = obj.get_mut("required").and_then(Value::as_array_mut) {
            required.retain(|r| r.as_str() != Some(head));
        }
        return;
    }

    if let Some(child) = obj
        .get_mut("properties")
        .and_then(Value::as_object_mut)
        .and_then(|props| props.get_mut(*head))
    {
        remove_property(child, rest);
    }
}

fn inject_percentage_bounds(schema: &mut Value) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };
    let is_percentage = presentation(obj)
        .and_then(|p| p.get("inputType"))
        .and_then(Value::as_str)
        .map(|it| it == "percentage")
        .unwrap_or(false);
    if is_percentage {
        obj.entry("minimum")
            .or_insert_with(|| Value::Number(Number::from(0)));
        obj.entry("maximum")
            .or_insert_with(|| Value::Number(Number::from(100)));
    }

    for key in ["properties", "items"] {
        match obj.get_mut(key) {
            Some(Value::Object(map)) if key == "properties" => {
                for child in map.values_mut() {
                    inject_percentage_bounds(child);
                }
            }
            Some(child @ Value::Object(_)) => inject_percentage_bounds(child),
            _ => {}
        }
    }
}

/// Recursively remove all vendor annotation keys.
pub(crate) fn strip_annotations(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut result = Map::new();
            for (k, v) in map {
                if !JSF_ANNOTATIONS.contains(&k.as_str()) {
                    result.insert(k.clone(), strip_annotations(v));
                }
            }
            Value::Object(result)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(strip_annotations).collect()),
        other => other.clone(),
    }
}

/// Engine output for one pass: raw errors plus the nested message object.
pub(crate) struct EngineOutcome {
    pub raw: Vec<SchemaError>,
    /// Nested `{ field: message }` object; empty when the payload is valid.
    pub errors: Value,
}

/// Validate `payload` and map the engine's errors.
///
/// `annotated_scope` is the unstripped effective schema, used to look up
/// field-level error messages and input types for message resolution.
pub(crate) fn run_engine(
    validation_schema: &Value,
    annotated_scope: &Map<String, Value>,
    payload: &Value,
    input_types_config: &Map<String, Value>,
) -> Result<EngineOutcome, FormError> {
    let validator =
        jsonschema::validator_for(validation_schema).map_err(|e| FormError::InvalidSchema {
            message: e.to_string(),
        })?;

    let mut raw = Vec::new();
    let mut errors = json!({});

    for error in validator.iter_errors(payload) {
        let mut segments: Vec<String> = error
            .instance_path
            .to_string()
            .split('/')
            .skip(1)
            .map(unescape_pointer_segment)
            .filter(|s| !s.is_empty())
            .collect();

        let keyword = violated_keyword(&error.schema_path.to_string());
        if keyword == "required" {
            if let jsonschema::error::ValidationErrorKind::Required { property } = &error.kind {
                segments.push(crate::messages::display_value(property));
            }
        }

        let node = node_at(annotated_scope, &segments);
        let input_type = node
            .as_ref()
            .map(|n| {
                presentation(n)
                    .and_then(|p| p.get("inputType"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| structural_input_type(n).as_str().to_string())
            })
            .unwrap_or_default();

        let engine_message = error.to_string();
        let message = resolve_message(
            &keyword,
            &node.unwrap_or_default(),
            &input_type,
            input_types_config,
            &engine_message,
        );

        raw.push(SchemaError {
            path: format!("/{}", segments.join("/")),
            message: engine_message,
        });
        insert_nested(&mut errors, &segments, &message);
    }

    Ok(EngineOutcome { raw, errors })
}

fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// The violated constraint keyword, read off the engine's schema path
/// (e.g. `/properties/age/minimum` -> `minimum`).
fn violated_keyword(schema_path: &str) -> String {
    let segments: Vec<&str> = schema_path.split('/').filter(|s| !s.is_empty()).collect();
    for segment in segments.iter().rev() {
        if KNOWN_KEYWORDS.contains(segment) {
            return (*segment).to_string();
        }
    }
    segments.last().copied().unwrap_or("unknown").to_string()
}

/// The annotated schema node a value path points at: objects descend
/// through `properties`, array indices through `items`.
fn node_at(scope: &Map<String, Value>, segments: &[String]) -> Option<Map<String, Value>> {
    let mut current = scope.clone();
    for segment in segments {
        let next = if segment.chars().all(|c| c.is_ascii_digit()) {
            current.get("items")
        } else {
            current
                .get("properties")
                .and_then(Value::as_object)
                .and_then(|props| props.get(segment))
        };
        current = next.and_then(Value::as_object)?.clone();
    }
    Some(current)
}

/// Place a message at a nested path: object keys for field names, arrays
/// (null-padded) for group-array indices. The first message per path wins.
pub(crate) fn insert_nested(errors: &mut Value, segments: &[String], message: &str) {
    if segments.is_empty() {
        return;
    }
    let mut current = errors;
    for (i, segment) in segments.iter().enumerate() {
        let last = i == segments.len() - 1;
        if let Ok(index) = segment.parse::<usize>() {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            let Some(arr) = current.as_array_mut() else {
                return;
            };
            while arr.len() <= index {
                arr.push(Value::Null);
            }
            if last {
                if arr[index].is_null() {
                    arr[index] = Value::String(message.to_string());
                }
                return;
            }
            if arr[index].is_null() {
                arr[index] = json!({});
            }
            current = &mut arr[index];
        } else {
            if !current.is_object() {
                return;
            }
            let Some(obj) = current.as_object_mut() else {
                return;
            };
            if last {
                // A field already carrying a message keeps its first one.
                if !obj.contains_key(segment) {
                    obj.insert(segment.clone(), Value::String(message.to_string()));
                }
                return;
            }
            current = obj
                .entry(segment.clone())
                .or_insert_with(|| json!({}));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn resolved(schema: Value) -> ResolvedScope {
        ResolvedScope {
            schema: schema.as_object().cloned().unwrap_or_default(),
            hidden: BTreeSet::new(),
        }
    }

    #[test]
    fn hidden_fields_are_removed_from_schema_and_required() {
        let mut r = resolved(json!({
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "string" }
            },
            "required": ["a", "b"]
        }));
        r.hidden.insert("b".to_string());
        let schema = prepare_validation_schema(&r);
        assert!(schema["properties"].get("b").is_none());
        assert_eq!(schema["required"], json!(["a"]));
    }

    #[test]
    fn nested_hidden_paths_are_removed() {
        let mut r = resolved(json!({
            "properties": {
                "address": {
                    "type": "object",
                    "properties": {
                        "street": { "type": "string" },
                        "city": { "type": "string" }
                    },
                    "required": ["street"]
                }
            }
        }));
        r.hidden.insert("address/street".to_string());
        let schema = prepare_validation_schema(&r);
        let address = &schema["properties"]["address"];
        assert!(address["properties"].get("street").is_none());
        assert!(address["properties"].get("city").is_some());
        assert_eq!(address["required"], json!([]));
    }

    #[test]
    fn annotations_are_stripped() {
        let r = resolved(json!({
            "properties": {
                "a": {
                    "type": "string",
                    "x-jsf-presentation": { "inputType": "text" },
                    "x-jsf-errorMessage": { "required": "custom" },
                    "presentation": { "inputType": "text" }
                }
            }
        }));
        let schema = prepare_validation_schema(&r);
        let a = &schema["properties"]["a"];
        assert!(a.get("x-jsf-presentation").is_none());
        assert!(a.get("x-jsf-errorMessage").is_none());
        assert!(a.get("presentation").is_none());
        assert_eq!(a["type"], json!("string"));
    }

    #[test]
    fn percentage_bounds_are_injected() {
        let r = resolved(json!({
            "properties": {
                "equity": {
                    "type": "number",
                    "x-jsf-presentation": { "inputType": "percentage" }
                }
            }
        }));
        let schema = prepare_validation_schema(&r);
        assert_eq!(schema["properties"]["equity"]["minimum"], json!(0));
        assert_eq!(schema["properties"]["equity"]["maximum"], json!(100));
    }

    #[test]
    fn violated_keyword_from_schema_path() {
        assert_eq!(violated_keyword("/properties/age/minimum"), "minimum");
        assert_eq!(violated_keyword("/required"), "required");
        assert_eq!(violated_keyword("/properties/x/oneOf"), "oneOf");
        assert_eq!(violated_keyword("/properties/x/oneOf/0/const"), "const");
    }

    #[test]
    fn required_error_maps_to_field_with_default_message() {
        let scope = json!({
            "properties": {
                "name": { "type": "string", "x-jsf-presentation": { "inputType": "text" } }
            },
            "required": ["name"]
        })
        .as_object()
        .cloned()
        .unwrap();
        let schema = json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        });
        let outcome = run_engine(&schema, &scope, &json!({}), &Map::new()).unwrap();
        assert_eq!(outcome.errors["name"], json!("Required field"));
        assert_eq!(outcome.raw.len(), 1);
        assert_eq!(outcome.raw[0].path, "/name");
    }

    #[test]
    fn const_error_uses_built_in_message() {
        let scope = json!({
            "properties": {
                "ten_only": { "type": "number", "const": 10 }
            }
        })
        .as_object()
        .cloned()
        .unwrap();
        let schema = json!({
            "type": "object",
            "properties": { "ten_only": { "type": "number", "const": 10 } }
        });
        let outcome = run_engine(&schema, &scope, &json!({ "ten_only": 1 }), &Map::new()).unwrap();
        assert_eq!(
            outcome.errors["ten_only"],
            json!("The only accepted value is 10.")
        );
    }

    #[test]
    fn group_array_errors_take_array_of_objects_shape() {
        let mut errors = json!({});
        insert_nested(
            &mut errors,
            &["deps".into(), "1".into(), "role".into()],
            "Required field",
        );
        assert_eq!(
            errors,
            json!({ "deps": [null, { "role": "Required field" }] })
        );
    }

    #[test]
    fn first_message_per_path_wins() {
        let mut errors = json!({});
        insert_nested(&mut errors, &["a".into()], "first");
        insert_nested(&mut errors, &["a".into()], "second");
        assert_eq!(errors["a"], json!("first"));
    }
}
