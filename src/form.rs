//! Form creation and the per-call validation pipeline.

use serde_json::{json, Map, Value};

use crate::error::FormError;
use crate::fields::{apply_custom_properties, build_fields, check_initial_values};
use crate::logic::LogicContext;
use crate::resolve::{resolve_conditionals, ResolvedScope};
use crate::types::{Field, FormConfig, ValidationResult, LOGIC_VALIDATIONS_KEY};
use crate::validation::{insert_nested, prepare_validation_schema, run_engine};

/// A compiled form: the current field tree plus everything needed to
/// revalidate against new values.
///
/// Validation takes `&mut self`: the field tree is replaced wholesale on
/// every call, so concurrent passes over shared field state cannot happen.
pub struct HeadlessForm {
    /// Ordered field tree, refreshed by every [`HeadlessForm::handle_validation`] call.
    pub fields: Vec<Field>,
    /// True when the schema could not be compiled into a form.
    pub is_error: bool,
    /// The fatal creation error, when `is_error` is set.
    pub error: Option<FormError>,
    schema: Map<String, Value>,
    config: FormConfig,
    logic: LogicContext,
}

/// Compile a JSON Schema into a headless form.
///
/// Structural problems (schema not an object, strict-mode field without an
/// input type) never panic or escape: they produce a form with empty
/// `fields`, `is_error: true` and the error in `error`.
pub fn create_headless_form(schema: &Value, config: FormConfig) -> HeadlessForm {
    let Some(schema_map) = schema.as_object().cloned() else {
        return HeadlessForm::failed(
            FormError::InvalidSchema {
                message: format!(
                    "expected an object, got {}",
                    crate::types::json_type_name(schema)
                ),
            },
            config,
        );
    };

    let logic = LogicContext::from_schema(&schema_map);
    let seed_values = match &config.initial_values {
        Some(values) => check_initial_values(&schema_map, values),
        None => json!({}),
    };

    let mut form = HeadlessForm {
        fields: Vec::new(),
        is_error: false,
        error: None,
        schema: schema_map,
        config,
        logic,
    };

    match form.compute_pass(&seed_values) {
        Ok(pass) => {
            form.fields = pass.fields;
        }
        Err(e) => {
            form.is_error = true;
            form.error = Some(e);
        }
    }
    form
}

/// Everything one pass produces.
struct Pass {
    fields: Vec<Field>,
    form_errors: Option<Value>,
    normalized_values: Value,
    raw_errors: Vec<crate::error::SchemaError>,
}

impl HeadlessForm {
    fn failed(error: FormError, config: FormConfig) -> Self {
        HeadlessForm {
            fields: Vec::new(),
            is_error: true,
            error: Some(error),
            schema: Map::new(),
            config,
            logic: LogicContext::default(),
        }
    }

    /// Revalidate against the current values.
    ///
    /// Re-resolves conditionals, cross-field logic and custom attributes,
    /// replaces the field tree, validates and returns the nested error
    /// object. The caller's values are never mutated; hidden-field values
    /// come back as `null` in `normalized_values`.
    pub fn handle_validation(&mut self, values: &Value) -> ValidationResult {
        match self.compute_pass(values) {
            Ok(pass) => {
                self.fields = pass.fields;
                ValidationResult {
                    form_errors: pass.form_errors,
                    normalized_values: pass.normalized_values,
                    raw_errors: pass.raw_errors,
                }
            }
            Err(e) => {
                // Post-creation failures are structural; surface them on
                // the form rather than pretending the values are valid.
                self.is_error = true;
                let result = ValidationResult {
                    form_errors: None,
                    normalized_values: values.clone(),
                    raw_errors: Vec::new(),
                };
                self.error = Some(e);
                result
            }
        }
    }

    fn compute_pass(&self, values: &Value) -> Result<Pass, FormError> {
        let mut resolved = resolve_conditionals(&self.schema, values);

        self.apply_computed_attrs(&mut resolved, values);
        apply_custom_properties(
            &mut resolved.schema,
            &self.config.custom_properties,
            values,
        );

        let fields = build_fields(&resolved.schema, &resolved.hidden, &self.config, values, true)?;

        let validation_schema = prepare_validation_schema(&resolved);
        let normalized_values = normalize_hidden(values, &resolved);
        let payload = strip_nulls(&normalized_values);

        let mut engine = run_engine(
            &validation_schema,
            &resolved.schema,
            &payload,
            &self.config.input_types,
        )?;

        self.collect_logic_errors(&resolved, values, &mut engine.errors);

        let has_errors = engine
            .errors
            .as_object()
            .map(|o| !o.is_empty())
            .unwrap_or(false);

        Ok(Pass {
            fields,
            form_errors: has_errors.then_some(engine.errors),
            normalized_values,
            raw_errors: engine.raw,
        })
    }

    /// Resolve `x-jsf-logic-computedAttrs` on every visible property node,
    /// fieldsets included.
    fn apply_computed_attrs(&self, resolved: &mut ResolvedScope, values: &Value) {
        if self.logic.is_empty() {
            return;
        }
        apply_computed_recursive(&self.logic, &mut resolved.schema, values);
    }

    /// Run per-field `x-jsf-logic-validations`; native schema errors for the
    /// same field always win, so logic messages only fill empty slots.
    fn collect_logic_errors(&self, resolved: &ResolvedScope, values: &Value, errors: &mut Value) {
        if self.logic.is_empty() {
            return;
        }
        let mut path = Vec::new();
        collect_logic_recursive(
            &self.logic,
            &resolved.schema,
            &resolved.hidden,
            values,
            &mut path,
            errors,
        );
    }
}

fn apply_computed_recursive(logic: &LogicContext, scope: &mut Map<String, Value>, values: &Value) {
    let Some(props) = scope.get_mut("properties").and_then(Value::as_object_mut) else {
        return;
    };
    for node in props.values_mut() {
        let Some(node) = node.as_object_mut() else {
            continue;
        };
        logic.apply_computed_attrs(node, values);
        apply_computed_recursive(logic, node, values);
    }
}

fn collect_logic_recursive(
    logic: &LogicContext,
    scope: &Map<String, Value>,
    hidden: &std::collections::BTreeSet<String>,
    values: &Value,
    path: &mut Vec<String>,
    errors: &mut Value,
) {
    let Some(props) = scope.get("properties").and_then(Value::as_object) else {
        return;
    };
    for (name, node) in props {
        let Some(node) = node.as_object() else {
            continue;
        };
        path.push(name.clone());
        let field_path = path.join("/");
        let is_hidden = hidden.iter().any(|h| *h == field_path);
        if !is_hidden {
            if node.contains_key(LOGIC_VALIDATIONS_KEY) {
                if let Some(message) = logic.validate_field(node, values) {
                    let segments: Vec<String> = path.clone();
                    insert_nested(errors, &segments, &message);
                }
            }
            collect_logic_recursive(logic, node, hidden, values, path, errors);
        }
        path.pop();
    }
}

/// A copy of the caller's values with every hidden field's value forced to
/// `null` (only where a value was actually present).
fn normalize_hidden(values: &Value, resolved: &ResolvedScope) -> Value {
    let mut normalized = values.clone();
    for hidden_path in &resolved.hidden {
        let segments: Vec<&str> = hidden_path.split('/').collect();
        null_at(&mut normalized, &segments);
    }
    normalized
}

fn null_at(values: &mut Value, segments: &[&str]) {
    let [head, rest @ ..] = segments else {
        return;
    };
    let Some(obj) = values.as_object_mut() else {
        return;
    };
    if rest.is_empty() {
        if obj.contains_key(*head) {
            obj.insert((*head).to_string(), Value::Null);
        }
        return;
    }
    if let Some(child) = obj.get_mut(*head) {
        null_at(child, rest);
    }
}

/// Remove `null` entries so absent-vs-null does not trip `required` or type
/// checks; the engine treats both as "not answered".
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}
