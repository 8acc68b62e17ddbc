//! Pure schema-to-schema modification.
//!
//! `modify` rewrites a form schema before compilation: targeted per-field
//! overrides (dotted paths reach into fieldsets and group-arrays), a
//! catch-all callback over every field, and property plucking. The input
//! schema is never mutated; unknown targets warn instead of erroring.

use serde_json::{Map, Value};

use crate::resolve::deep_merge;
use crate::types::{ERROR_MESSAGE_KEY, ORDER_KEY, PRESENTATION_KEY};

/// Callback applied to every field by [`ModifyConfig::all_fields`]:
/// `(name, node) -> Some(delta)` merges the delta onto the node.
pub type AllFieldsFn = Box<dyn Fn(&str, &Map<String, Value>) -> Option<Value>>;

/// Configuration for [`modify`].
#[derive(Default)]
pub struct ModifyConfig {
    /// Per-field override objects keyed by dotted path
    /// (e.g. `"address.street"`), applied in insertion order.
    pub fields: Vec<(String, Value)>,
    /// Override generator run against every field, depth first.
    pub all_fields: Option<AllFieldsFn>,
    /// When non-empty, keep only these top-level properties.
    pub pluck_fields: Vec<String>,
}

impl ModifyConfig {
    pub fn new() -> Self {
        ModifyConfig::default()
    }

    pub fn field(mut self, path: impl Into<String>, attrs: Value) -> Self {
        self.fields.push((path.into(), attrs));
        self
    }

    pub fn all_fields(mut self, f: AllFieldsFn) -> Self {
        self.all_fields = Some(f);
        self
    }

    pub fn pluck(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.pluck_fields = names.into_iter().collect();
        self
    }
}

/// A non-fatal problem found while modifying.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModifyWarning {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ModifyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Result of a modification: the new schema plus any warnings.
#[derive(Debug, Clone)]
pub struct ModifyResult {
    pub schema: Value,
    pub warnings: Vec<ModifyWarning>,
}

/// Apply a [`ModifyConfig`] to a schema, returning a new schema.
pub fn modify(schema: &Value, config: &ModifyConfig) -> ModifyResult {
    let mut warnings = Vec::new();
    let Some(mut root) = schema.as_object().cloned() else {
        warnings.push(ModifyWarning {
            path: ".".to_string(),
            message: "schema is not an object; returning it unchanged".to_string(),
        });
        return ModifyResult {
            schema: schema.clone(),
            warnings,
        };
    };

    for (path, attrs) in &config.fields {
        match node_at_path_mut(&mut root, path) {
            Some(node) => apply_override(node, attrs),
            None => warnings.push(ModifyWarning {
                path: path.clone(),
                message: "field not found in schema; skipping override".to_string(),
            }),
        }
    }

    if let Some(all) = &config.all_fields {
        apply_all_fields(&mut root, all);
    }

    if !config.pluck_fields.is_empty() {
        pluck(&mut root, &config.pluck_fields);
    }

    ModifyResult {
        schema: Value::Object(root),
        warnings,
    }
}

/// Walk a dotted path: each segment descends through `properties`, passing
/// through `items` for group-arrays.
fn node_at_path_mut<'a>(root: &'a mut Map<String, Value>, path: &str) -> Option<&'a mut Map<String, Value>> {
    let mut current = root;
    for segment in path.split('.') {
        let container = if current.contains_key("properties") {
            current.get_mut("properties")
        } else {
            current
                .get_mut("items")
                .and_then(Value::as_object_mut)
                .and_then(|items| items.get_mut("properties"))
        };
        current = container
            .and_then(Value::as_object_mut)
            .and_then(|props| props.get_mut(segment))
            .and_then(Value::as_object_mut)?;
    }
    Some(current)
}

/// Merge an override object onto a field node. The unprefixed
/// `errorMessage` and `presentation` shorthands land on their `x-jsf-`
/// counterparts.
fn apply_override(node: &mut Map<String, Value>, attrs: &Value) {
    let Some(attrs) = attrs.as_object() else {
        return;
    };
    for (key, value) in attrs {
        let target_key = match key.as_str() {
            "errorMessage" => ERROR_MESSAGE_KEY,
            "presentation" => PRESENTATION_KEY,
            other => other,
        };
        match (node.get_mut(target_key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                node.insert(target_key.to_string(), value.clone());
            }
        }
    }
}

fn apply_all_fields(scope: &mut Map<String, Value>, all: &AllFieldsFn) {
    let Some(props) = scope.get_mut("properties").and_then(Value::as_object_mut) else {
        return;
    };
    for (name, node) in props.iter_mut() {
        let Some(node) = node.as_object_mut() else {
            continue;
        };
        if let Some(delta) = all(name, node) {
            apply_override(node, &delta);
        }
        // Recurse into fieldsets and group-array item templates.
        apply_all_fields(node, all);
        if let Some(items) = node.get_mut("items").and_then(Value::as_object_mut) {
            apply_all_fields(items, all);
        }
    }
}

fn pluck(root: &mut Map<String, Value>, keep: &[String]) {
    if let Some(props) = root.get_mut("properties").and_then(Value::as_object_mut) {
        props.retain(|name, _| keep.contains(name));
    }
    if let Some(required) = root.get_mut("required").and_then(Value::as_array_mut) {
        required.retain(|name| name.as_str().map(|n| keep.contains(&n.to_string())).unwrap_or(false));
    }
    if let Some(order) = root.get_mut(ORDER_KEY).and_then(Value::as_array_mut) {
        order.retain(|name| name.as_str().map(|n| keep.contains(&n.to_string())).unwrap_or(false));
    }
}
