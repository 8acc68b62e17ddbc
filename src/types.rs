//! Core types for headless form compilation.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Vendor presentation annotation key.
pub const PRESENTATION_KEY: &str = "x-jsf-presentation";
/// Vendor sibling-ordering annotation key.
pub const ORDER_KEY: &str = "x-jsf-order";
/// Vendor per-field error-message annotation key.
pub const ERROR_MESSAGE_KEY: &str = "x-jsf-errorMessage";
/// Vendor cross-field logic rule-set key (schema root).
pub const LOGIC_KEY: &str = "x-jsf-logic";
/// Per-field reference list into `x-jsf-logic.validations`.
pub const LOGIC_VALIDATIONS_KEY: &str = "x-jsf-logic-validations";
/// Per-field computed-attribute map referencing `x-jsf-logic.computedValues`.
pub const LOGIC_COMPUTED_ATTRS_KEY: &str = "x-jsf-logic-computedAttrs";

/// Deprecated alias for [`PRESENTATION_KEY`], honored when the prefixed form is absent.
pub const DEPRECATED_PRESENTATION_KEY: &str = "presentation";
/// Deprecated alias for [`ERROR_MESSAGE_KEY`], honored when the prefixed form is absent.
pub const DEPRECATED_ERROR_MESSAGE_KEY: &str = "errorMessage";

/// All vendor annotation keys, stripped from validation schemas.
pub const JSF_ANNOTATIONS: &[&str] = &[
    PRESENTATION_KEY,
    ORDER_KEY,
    ERROR_MESSAGE_KEY,
    LOGIC_KEY,
    LOGIC_VALIDATIONS_KEY,
    LOGIC_COMPUTED_ATTRS_KEY,
    DEPRECATED_PRESENTATION_KEY,
    DEPRECATED_ERROR_MESSAGE_KEY,
];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Input type of a field, resolved from `x-jsf-presentation.inputType`
/// or derived structurally from the schema node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputType {
    Text,
    Number,
    Select,
    Radio,
    Checkbox,
    Email,
    Date,
    File,
    Fieldset,
    GroupArray,
    /// An explicit `inputType` string the crate has no dedicated variant for.
    Other(String),
}

impl InputType {
    /// Parse an explicit `inputType` annotation value.
    pub fn parse(s: &str) -> Self {
        match s {
            "text" => InputType::Text,
            "number" => InputType::Number,
            "select" => InputType::Select,
            "radio" => InputType::Radio,
            "checkbox" => InputType::Checkbox,
            "email" => InputType::Email,
            "date" => InputType::Date,
            "file" => InputType::File,
            "fieldset" => InputType::Fieldset,
            "group-array" => InputType::GroupArray,
            other => InputType::Other(other.to_string()),
        }
    }

    /// The wire name of this input type (matches the annotation vocabulary).
    pub fn as_str(&self) -> &str {
        match self {
            InputType::Text => "text",
            InputType::Number => "number",
            InputType::Select => "select",
            InputType::Radio => "radio",
            InputType::Checkbox => "checkbox",
            InputType::Email => "email",
            InputType::Date => "date",
            InputType::File => "file",
            InputType::Fieldset => "fieldset",
            InputType::GroupArray => "group-array",
            InputType::Other(s) => s,
        }
    }
}

impl Serialize for InputType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for InputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selectable option of a radio/select field, derived from `oneOf` or `enum`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldOption {
    pub label: String,
    pub value: Value,
}

/// Children of a composite field.
///
/// Fieldsets carry their sub-fields eagerly; group-arrays carry a reusable
/// template that is instantiated once per runtime entry.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FieldChildren {
    Fields(Vec<Field>),
    Template(Box<GroupTemplate>),
}

/// Reusable sub-field template for a group-array.
///
/// The number of entries is runtime data, so the template is kept once and
/// [`GroupTemplate::instantiate`] produces a fresh field list per entry.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct GroupTemplate {
    pub fields: Vec<Field>,
}

impl GroupTemplate {
    /// Produce the field list for one group-array entry.
    pub fn instantiate(&self) -> Vec<Field> {
        self.fields.clone()
    }
}

/// A renderable field descriptor.
///
/// Built fresh on every validation pass from the schema and the current
/// values; core attributes are typed, everything else (presentation extras,
/// custom attributes) lands in the open `extra` map.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_type: InputType,
    pub json_type: String,
    pub required: bool,
    pub is_visible: bool,
    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    /// Resolved per-field error messages (keyword -> message).
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub error_message: Map<String, Value>,
    /// The schema subtree this field was derived from, conditionals applied.
    pub scoped_json_schema: Value,
    /// Sub-fields for fieldsets (eager) and group-arrays (template).
    #[serde(rename = "fields", skip_serializing_if = "Option::is_none")]
    pub children: Option<FieldChildren>,
    /// Unrecognized presentation and custom attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Field {
    /// Look up a direct child field by name (fieldsets only).
    pub fn child(&self, name: &str) -> Option<&Field> {
        match &self.children {
            Some(FieldChildren::Fields(fields)) => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }
}

/// Outcome of a custom function-valued attribute.
pub enum CustomAttrOutcome {
    /// Replace the attribute with this value.
    Value(Value),
    /// Replace the attribute and override the error message for its keyword.
    WithMessage { value: Value, error_message: String },
}

/// Function-valued custom attribute: invoked with the current values and the
/// field's derived attributes; returns a replacement.
pub type CustomAttrFn = Box<dyn Fn(&Value, &Map<String, Value>) -> CustomAttrOutcome>;

/// Per-field customization applied on top of derived attributes.
#[derive(Default)]
pub struct FieldCustomization {
    /// Literal attribute overrides.
    pub attrs: Map<String, Value>,
    /// Function-valued attribute overrides.
    pub computed: HashMap<String, CustomAttrFn>,
    /// Customizations for sub-fields of a fieldset/group-array.
    pub nested: Option<Box<CustomProperties>>,
}

impl FieldCustomization {
    /// Customization consisting only of literal attribute overrides.
    pub fn attrs(attrs: Map<String, Value>) -> Self {
        FieldCustomization {
            attrs,
            ..FieldCustomization::default()
        }
    }
}

/// Per-field customization map, keyed by field name within one scope.
#[derive(Default)]
pub struct CustomProperties {
    entries: HashMap<String, FieldCustomization>,
}

impl CustomProperties {
    pub fn new() -> Self {
        CustomProperties::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, customization: FieldCustomization) {
        self.entries.insert(name.into(), customization);
    }

    pub fn get(&self, name: &str) -> Option<&FieldCustomization> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Options for form creation.
pub struct FormConfig {
    /// When true (default), a field without a resolvable `inputType` is a
    /// creation error instead of falling back to structural derivation.
    pub strict_input_type: bool,
    /// Values used to seed the initial visibility/required computation.
    pub initial_values: Option<Value>,
    /// Per-field attribute overrides, nested for fieldsets/group-arrays.
    pub custom_properties: CustomProperties,
    /// Per-input-type defaults keyed by input type name; recognizes an
    /// `errorMessage` map of keyword -> message overrides.
    pub input_types: Map<String, Value>,
}

impl Default for FormConfig {
    fn default() -> Self {
        FormConfig {
            strict_input_type: true,
            initial_values: None,
            custom_properties: CustomProperties::default(),
            input_types: Map::new(),
        }
    }
}

impl FormConfig {
    pub fn new() -> Self {
        FormConfig::default()
    }

    /// Disable strict input-type resolution (enables structural fallback).
    pub fn lenient_input_type(mut self) -> Self {
        self.strict_input_type = false;
        self
    }

    pub fn initial_values(mut self, values: Value) -> Self {
        self.initial_values = Some(values);
        self
    }

    pub fn custom_properties(mut self, custom: CustomProperties) -> Self {
        self.custom_properties = custom;
        self
    }

    pub fn input_types(mut self, input_types: Map<String, Value>) -> Self {
        self.input_types = input_types;
        self
    }
}

/// Result of one validation pass.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Nested field-name -> message object; `None` when the values are valid.
    pub form_errors: Option<Value>,
    /// Caller values with hidden-field values forced to `null`. The input
    /// values object itself is never mutated.
    pub normalized_values: Value,
    /// The underlying engine's errors, for advanced consumers.
    pub raw_errors: Vec<SchemaError>,
}

impl ValidationResult {
    /// True when no native or logic validation error was produced.
    pub fn is_valid(&self) -> bool {
        self.form_errors.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_type_round_trips_known_names() {
        for name in [
            "text",
            "number",
            "select",
            "radio",
            "checkbox",
            "email",
            "date",
            "file",
            "fieldset",
            "group-array",
        ] {
            assert_eq!(InputType::parse(name).as_str(), name);
        }
    }

    #[test]
    fn input_type_preserves_unknown_names() {
        let it = InputType::parse("money");
        assert_eq!(it, InputType::Other("money".to_string()));
        assert_eq!(it.as_str(), "money");
    }

    #[test]
    fn json_type_name_covers_all_variants() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!(true)), "boolean");
        assert_eq!(json_type_name(&json!(1)), "number");
        assert_eq!(json_type_name(&json!("a")), "string");
        assert_eq!(json_type_name(&json!([])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
    }

    #[test]
    fn group_template_instantiate_clones_fields() {
        let template = GroupTemplate {
            fields: vec![Field {
                name: "amount".into(),
                label: None,
                description: None,
                input_type: InputType::Number,
                json_type: "number".into(),
                required: false,
                is_visible: true,
                const_value: None,
                default: None,
                minimum: None,
                maximum: None,
                min_length: None,
                max_length: None,
                pattern: None,
                options: vec![],
                error_message: Map::new(),
                scoped_json_schema: json!({}),
                children: None,
                extra: Map::new(),
            }],
        };
        let a = template.instantiate();
        let b = template.instantiate();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].name, b[0].name);
    }
}
