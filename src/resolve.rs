//! Conditional attribute resolution.
//!
//! Applies every `allOf` branch (and the legacy root `if/then/else`) of a
//! scope to a fresh copy of that scope's schema, producing the effective
//! schema for the current values. Nothing is sticky between passes: each
//! call starts from the base schema again, so attributes untouched by any
//! matching branch revert to their declared value.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::conditions::matches_condition;

/// Effective schema of one scope after conditional resolution.
#[derive(Debug, Clone)]
pub struct ResolvedScope {
    /// Scope schema with branch deltas merged and nested fieldsets resolved
    /// in place. `allOf`/`if`/`then`/`else` are consumed and removed.
    pub schema: Map<String, Value>,
    /// Slash-separated property paths forced invisible, relative to this
    /// scope (e.g. `"perks"` or `"address/street"`).
    pub hidden: BTreeSet<String>,
}

impl ResolvedScope {
    /// True when the property at `name` (top level of this scope) is hidden.
    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.contains(name)
    }
}

/// Resolve a scope schema against the current values of that scope.
///
/// Branches are applied in array order; a later branch's delta for the same
/// attribute overwrites an earlier one (array-order-wins is the documented
/// contract, not an accident to fix). A `properties.<name>: false` delta
/// hides the field and drops it from `required`; a later delta or
/// `required` addition for the same name makes it visible again.
pub fn resolve_conditionals(scope: &Map<String, Value>, values: &Value) -> ResolvedScope {
    let mut schema = scope.clone();
    for consumed in ["allOf", "if", "then", "else"] {
        schema.remove(consumed);
    }

    let mut required: Vec<String> = scope
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let mut hidden = BTreeSet::new();

    apply_scope_conditionals(scope, values, &mut schema, &mut required, &mut hidden);

    // Nested fieldsets resolve against their own value scope.
    let nested_names: Vec<String> = schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .filter(|(_, node)| is_fieldset_node(node))
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default();

    for name in nested_names {
        let Some(node) = schema
            .get("properties")
            .and_then(Value::as_object)
            .and_then(|p| p.get(&name))
            .and_then(Value::as_object)
            .cloned()
        else {
            continue;
        };
        let scoped_values = values.get(&name).cloned().unwrap_or(Value::Null);
        let nested = resolve_conditionals(&node, &scoped_values);
        for path in &nested.hidden {
            hidden.insert(format!("{name}/{path}"));
        }
        if let Some(props) = schema.get_mut("properties").and_then(Value::as_object_mut) {
            props.insert(name, Value::Object(nested.schema));
        }
    }

    schema.insert(
        "required".to_string(),
        Value::Array(required.into_iter().map(Value::String).collect()),
    );

    ResolvedScope { schema, hidden }
}

/// Collect and apply the branches declared directly on `node`: the legacy
/// single `if/then/else` first, then each `allOf` entry in array order.
fn apply_scope_conditionals(
    node: &Map<String, Value>,
    values: &Value,
    schema: &mut Map<String, Value>,
    required: &mut Vec<String>,
    hidden: &mut BTreeSet<String>,
) {
    if let Some(if_clause) = node.get("if") {
        apply_branch(if_clause, node.get("then"), node.get("else"), values, schema, required, hidden);
    }

    if let Some(all_of) = node.get("allOf").and_then(Value::as_array) {
        for entry in all_of {
            let Some(if_clause) = entry.get("if") else {
                continue;
            };
            apply_branch(
                if_clause,
                entry.get("then"),
                entry.get("else"),
                values,
                schema,
                required,
                hidden,
            );
        }
    }
}

fn apply_branch(
    if_clause: &Value,
    then_branch: Option<&Value>,
    else_branch: Option<&Value>,
    values: &Value,
    schema: &mut Map<String, Value>,
    required: &mut Vec<String>,
    hidden: &mut BTreeSet<String>,
) {
    let applied = if matches_condition(if_clause, values) {
        then_branch
    } else {
        else_branch
    };
    let Some(applied) = applied.and_then(Value::as_object) else {
        return;
    };

    if let Some(deltas) = applied.get("properties").and_then(Value::as_object) {
        for (name, delta) in deltas {
            match delta {
                Value::Bool(false) => {
                    hidden.insert(name.clone());
                    required.retain(|r| r != name);
                }
                Value::Object(delta_attrs) => {
                    hidden.remove(name);
                    merge_property_delta(schema, name, delta_attrs);
                }
                _ => {}
            }
        }
    }

    if let Some(additions) = applied.get("required").and_then(Value::as_array) {
        for name in additions.iter().filter_map(Value::as_str) {
            hidden.remove(name);
            if !required.iter().any(|r| r == name) {
                required.push(name.to_string());
            }
        }
    }

    // Branches nest arbitrarily: an applied `then` may carry its own
    // `if/then/else` or `allOf`, evaluated against the same values.
    apply_scope_conditionals(applied, values, schema, required, hidden);
}

fn merge_property_delta(schema: &mut Map<String, Value>, name: &str, delta: &Map<String, Value>) {
    let props = schema
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(props) = props.as_object_mut() else {
        return;
    };
    match props.get_mut(name) {
        Some(Value::Object(base)) => deep_merge(base, delta),
        _ => {
            props.insert(name.to_string(), Value::Object(delta.clone()));
        }
    }
}

/// Object-wise recursive merge; scalars and arrays replace (last wins).
pub(crate) fn deep_merge(base: &mut Map<String, Value>, delta: &Map<String, Value>) {
    for (key, value) in delta {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn is_fieldset_node(node: &Value) -> bool {
    let Some(obj) = node.as_object() else {
        return false;
    };
    let is_object_type = obj
        .get("type")
        .and_then(Value::as_str)
        .map(|t| t == "object")
        .unwrap_or(false);
    is_object_type || (obj.contains_key("properties") && !obj.contains_key("items"))
}
