//! Field derivation and tree building.
//!
//! Turns a resolved scope schema into the ordered tree of renderable
//! [`Field`] descriptors. Derivation is pure: all conditional and custom
//! attribute merging has already happened on the scope schema by the time
//! fields are built.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::FormError;
use crate::messages::display_value;
use crate::resolve::deep_merge;
use crate::types::{
    json_type_name, CustomAttrOutcome, CustomProperties, Field, FieldChildren, FieldOption,
    FormConfig, GroupTemplate, InputType, DEPRECATED_PRESENTATION_KEY, JSF_ANNOTATIONS, ORDER_KEY,
    PRESENTATION_KEY,
};

/// Schema keywords consumed into typed [`Field`] attributes; everything else
/// flows into the field's `extra` map.
const CONSUMED_KEYS: &[&str] = &[
    "type",
    "title",
    "description",
    "default",
    "const",
    "minimum",
    "maximum",
    "minLength",
    "maxLength",
    "pattern",
    "enum",
    "oneOf",
    "anyOf",
    "allOf",
    "if",
    "then",
    "else",
    "properties",
    "items",
    "required",
];

/// The presentation annotation of a node, preferring the `x-jsf-` form.
pub(crate) fn presentation(node: &Map<String, Value>) -> Option<&Map<String, Value>> {
    node.get(PRESENTATION_KEY)
        .or_else(|| node.get(DEPRECATED_PRESENTATION_KEY))
        .and_then(Value::as_object)
}

/// Merge custom per-field overrides onto a resolved scope schema, in place.
///
/// Function-valued attributes are invoked with `(values, original_attrs)`.
/// A `minimum`/`maximum` override looser than the schema-declared bound is
/// ignored with a warning; the declared bound is retained.
pub(crate) fn apply_custom_properties(
    scope_schema: &mut Map<String, Value>,
    custom: &CustomProperties,
    values: &Value,
) {
    if custom.is_empty() {
        return;
    }
    let Some(props) = scope_schema.get_mut("properties").and_then(Value::as_object_mut) else {
        return;
    };

    for (name, node) in props.iter_mut() {
        let Some(customization) = custom.get(name) else {
            continue;
        };
        let Some(node) = node.as_object_mut() else {
            continue;
        };

        let original = node.clone();
        for (key, value) in &customization.attrs {
            apply_custom_attr(node, &original, name, key, value.clone(), None);
        }
        for (key, f) in &customization.computed {
            match f(values, &original) {
                CustomAttrOutcome::Value(value) => {
                    apply_custom_attr(node, &original, name, key, value, None);
                }
                CustomAttrOutcome::WithMessage {
                    value,
                    error_message,
                } => {
                    apply_custom_attr(node, &original, name, key, value, Some(error_message));
                }
            }
        }

        if let Some(nested) = &customization.nested {
            // Fieldsets nest under `properties`, group-arrays under `items`.
            if let Some(items) = node.get_mut("items").and_then(Value::as_object_mut) {
                apply_custom_properties(items, nested, values);
            } else {
                apply_custom_properties(node, nested, values);
            }
        }
    }
}

fn apply_custom_attr(
    node: &mut Map<String, Value>,
    original: &Map<String, Value>,
    field: &str,
    key: &str,
    value: Value,
    error_message: Option<String>,
) {
    let at_least_as_strict = match key {
        "minimum" => bound_check(original.get("minimum"), &value, |new, base| new >= base),
        "maximum" => bound_check(original.get("maximum"), &value, |new, base| new <= base),
        _ => true,
    };
    if !at_least_as_strict {
        tracing::warn!(
            field,
            attribute = key,
            "custom override is less strict than the schema bound; ignoring it"
        );
        return;
    }

    match (node.get_mut(key), &value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            deep_merge(existing, incoming);
        }
        _ => {
            node.insert(key.to_string(), value);
        }
    }

    if let Some(message) = error_message {
        let messages = node
            .entry(crate::types::ERROR_MESSAGE_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(messages) = messages.as_object_mut() {
            messages.insert(key.to_string(), Value::String(message));
        }
    }
}

fn bound_check(base: Option<&Value>, new: &Value, ok: impl Fn(f64, f64) -> bool) -> bool {
    match (base.and_then(Value::as_f64), new.as_f64()) {
        (Some(base), Some(new)) => ok(new, base),
        _ => true,
    }
}

/// Sibling names of a scope in render order: `x-jsf-order` first, then the
/// deprecated per-field `presentation.position`, then declaration order.
pub(crate) fn ordered_names(scope_schema: &Map<String, Value>) -> Vec<String> {
    let Some(props) = scope_schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let declared: Vec<String> = props.keys().cloned().collect();

    if let Some(order) = scope_schema.get(ORDER_KEY).and_then(Value::as_array) {
        let mut out: Vec<String> = order
            .iter()
            .filter_map(Value::as_str)
            .filter(|name| props.contains_key(*name))
            .map(String::from)
            .collect();
        for name in declared {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        return out;
    }

    let positions: Vec<Option<f64>> = declared
        .iter()
        .map(|name| {
            props
                .get(name)
                .and_then(Value::as_object)
                .and_then(presentation)
                .and_then(|p| p.get("position"))
                .and_then(Value::as_f64)
        })
        .collect();

    if positions.iter().any(Option::is_some) {
        let mut indexed: Vec<(usize, String)> = declared.into_iter().enumerate().collect();
        indexed.sort_by(|(i, _), (j, _)| {
            let a = positions[*i].unwrap_or(*i as f64 + 1e9);
            let b = positions[*j].unwrap_or(*j as f64 + 1e9);
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
        });
        return indexed.into_iter().map(|(_, name)| name).collect();
    }

    declared
}

/// Build the field tree of one resolved scope.
///
/// `hidden` holds slash-paths relative to this scope; `parent_visible`
/// propagates an ancestor fieldset's invisibility downward.
pub(crate) fn build_fields(
    scope_schema: &Map<String, Value>,
    hidden: &BTreeSet<String>,
    config: &FormConfig,
    values: &Value,
    parent_visible: bool,
) -> Result<Vec<Field>, FormError> {
    let Some(props) = scope_schema.get("properties").and_then(Value::as_object) else {
        return Ok(Vec::new());
    };
    let required: Vec<&str> = scope_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut fields = Vec::with_capacity(props.len());
    for name in ordered_names(scope_schema) {
        let Some(node) = props.get(&name).and_then(Value::as_object) else {
            continue;
        };
        let visible = parent_visible && !hidden.contains(&name);
        let field_required = visible && required.contains(&name.as_str());
        let child_hidden: BTreeSet<String> = hidden
            .iter()
            .filter_map(|path| path.strip_prefix(&format!("{name}/")))
            .map(String::from)
            .collect();
        fields.push(derive_field(
            &name,
            node,
            field_required,
            visible,
            &child_hidden,
            config,
            values,
        )?);
    }
    Ok(fields)
}

/// Derive a single field descriptor from its (already merged) schema node.
pub(crate) fn derive_field(
    name: &str,
    node: &Map<String, Value>,
    required: bool,
    visible: bool,
    child_hidden: &BTreeSet<String>,
    config: &FormConfig,
    values: &Value,
) -> Result<Field, FormError> {
    let input_type = resolve_input_type(name, node, config.strict_input_type)?;

    let mut minimum = node.get("minimum").and_then(Value::as_f64);
    let mut maximum = node.get("maximum").and_then(Value::as_f64);
    if input_type.as_str() == "percentage" {
        minimum = minimum.or(Some(0.0));
        maximum = maximum.or(Some(100.0));
    }

    let presentation_attrs = presentation(node).cloned().unwrap_or_default();
    let description = presentation_attrs
        .get("description")
        .and_then(Value::as_str)
        .or_else(|| node.get("description").and_then(Value::as_str))
        .map(String::from);

    let mut error_message = config
        .input_types
        .get(input_type.as_str())
        .and_then(|cfg| cfg.get("errorMessage"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    if let Some(field_messages) = crate::messages::field_error_messages(node) {
        for (k, v) in field_messages {
            error_message.insert(k.clone(), v.clone());
        }
    }

    let mut extra = Map::new();
    for (key, value) in node {
        if CONSUMED_KEYS.contains(&key.as_str()) || JSF_ANNOTATIONS.contains(&key.as_str()) {
            continue;
        }
        extra.insert(key.clone(), value.clone());
    }
    for (key, value) in &presentation_attrs {
        if matches!(key.as_str(), "inputType" | "description" | "position") {
            continue;
        }
        extra.insert(key.clone(), value.clone());
    }

    let children = match input_type {
        InputType::Fieldset => {
            let scoped_values = values.get(name).cloned().unwrap_or(Value::Null);
            Some(FieldChildren::Fields(build_fields(
                node,
                child_hidden,
                config,
                &scoped_values,
                visible,
            )?))
        }
        InputType::GroupArray => {
            let items = node
                .get("items")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let template_fields =
                build_fields(&items, &BTreeSet::new(), config, &Value::Null, true)?;
            Some(FieldChildren::Template(Box::new(GroupTemplate {
                fields: template_fields,
            })))
        }
        _ => None,
    };

    Ok(Field {
        name: name.to_string(),
        label: node.get("title").and_then(Value::as_str).map(String::from),
        description,
        json_type: json_type_of(node),
        input_type,
        required,
        is_visible: visible,
        const_value: node.get("const").cloned(),
        default: node.get("default").cloned(),
        minimum,
        maximum,
        min_length: node.get("minLength").and_then(Value::as_u64),
        max_length: node.get("maxLength").and_then(Value::as_u64),
        pattern: node.get("pattern").and_then(Value::as_str).map(String::from),
        options: derive_options(node),
        error_message,
        scoped_json_schema: Value::Object(node.clone()),
        children,
        extra,
    })
}

fn resolve_input_type(
    name: &str,
    node: &Map<String, Value>,
    strict: bool,
) -> Result<InputType, FormError> {
    if let Some(explicit) = presentation(node)
        .and_then(|p| p.get("inputType"))
        .and_then(Value::as_str)
    {
        return Ok(InputType::parse(explicit));
    }
    if strict {
        return Err(FormError::MissingInputType {
            field: name.to_string(),
        });
    }
    Ok(structural_input_type(node))
}

/// Structural fallback when no explicit `inputType` is annotated.
pub(crate) fn structural_input_type(node: &Map<String, Value>) -> InputType {
    if node.get("oneOf").and_then(Value::as_array).is_some() {
        return InputType::Radio;
    }
    if node
        .get("items")
        .and_then(|i| i.get("properties"))
        .is_some()
    {
        return InputType::GroupArray;
    }
    match node.get("format").and_then(Value::as_str) {
        Some("email") => return InputType::Email,
        Some("date") => return InputType::Date,
        Some("data-url") => return InputType::File,
        _ => {}
    }
    match primary_type(node).as_deref() {
        Some("number") | Some("integer") => InputType::Number,
        Some("boolean") => InputType::Checkbox,
        Some("object") => InputType::Fieldset,
        Some("array") => {
            if node.get("items").and_then(|i| i.get("enum")).is_some() {
                InputType::Select
            } else {
                InputType::Text
            }
        }
        _ => InputType::Text,
    }
}

/// The declared JSON type, with nullable unions collapsing to the first
/// non-null entry.
fn primary_type(node: &Map<String, Value>) -> Option<String> {
    match node.get("type") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map(String::from),
        _ => None,
    }
}

fn json_type_of(node: &Map<String, Value>) -> String {
    primary_type(node).unwrap_or_else(|| {
        node.get("const")
            .map(|c| json_type_name(c).to_string())
            .unwrap_or_else(|| "string".to_string())
    })
}

fn derive_options(node: &Map<String, Value>) -> Vec<FieldOption> {
    if let Some(one_of) = node.get("oneOf").and_then(Value::as_array) {
        return one_of
            .iter()
            .filter_map(|entry| {
                let value = entry.get("const")?.clone();
                let label = entry
                    .get("title")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| display_value(&value));
                Some(FieldOption { label, value })
            })
            .collect();
    }

    let enum_values = node
        .get("enum")
        .or_else(|| node.get("items").and_then(|i| i.get("enum")))
        .and_then(Value::as_array);
    if let Some(values) = enum_values {
        return values
            .iter()
            .map(|v| FieldOption {
                label: display_value(v),
                value: v.clone(),
            })
            .collect();
    }

    Vec::new()
}

/// Drop initial values whose runtime type contradicts the declared field
/// type. Warns and ignores the offending value; the field is built from
/// schema defaults instead.
pub(crate) fn check_initial_values(
    scope_schema: &Map<String, Value>,
    values: &Value,
) -> Value {
    let Some(props) = scope_schema.get("properties").and_then(Value::as_object) else {
        return values.clone();
    };
    let Some(given) = values.as_object() else {
        return values.clone();
    };

    let mut out = Map::new();
    for (name, value) in given {
        let declared = props
            .get(name)
            .and_then(Value::as_object)
            .and_then(primary_type);
        let compatible = match declared.as_deref() {
            Some("object") => value.is_object() || value.is_null(),
            Some("array") => value.is_array() || value.is_null(),
            Some("string") => !value.is_object() && !value.is_array(),
            _ => true,
        };
        if !compatible {
            tracing::warn!(
                field = %name,
                given = json_type_name(value),
                declared = declared.as_deref().unwrap_or("unknown"),
                "initial value type mismatch; ignoring it"
            );
            continue;
        }
        match (
            value,
            props.get(name).and_then(Value::as_object),
        ) {
            (Value::Object(_), Some(node)) if node.contains_key("properties") => {
                out.insert(name.clone(), check_initial_values(node, value));
            }
            _ => {
                out.insert(name.clone(), value.clone());
            }
        }
    }
    Value::Object(out)
}
