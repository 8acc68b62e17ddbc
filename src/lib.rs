//! Headless Form Compiler
//!
//! Compiles JSON Schemas carrying `x-jsf-*` vendor annotations into an
//! ordered tree of field descriptors plus a revalidation operation that
//! re-derives field visibility, required-ness and constraint bounds from
//! the current form values on every call.
//!
//! # Example
//!
//! ```
//! use headless_form::{create_headless_form, FormConfig};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "properties": {
//!         "age": {
//!             "type": "number",
//!             "minimum": 18,
//!             "x-jsf-presentation": { "inputType": "number" }
//!         }
//!     },
//!     "required": ["age"]
//! });
//!
//! let mut form = create_headless_form(&schema, FormConfig::new());
//! assert!(!form.is_error);
//! assert_eq!(form.fields[0].name, "age");
//!
//! let result = form.handle_validation(&json!({ "age": 12 }));
//! let errors = result.form_errors.unwrap();
//! assert_eq!(errors["age"], json!("Must be greater or equal to 18"));
//!
//! let result = form.handle_validation(&json!({ "age": 30 }));
//! assert!(result.is_valid());
//! ```
//!
//! # Conditional fields
//!
//! `allOf` entries with `if`/`then`/`else` (and the legacy root
//! `if/then/else`) are re-evaluated on every validation call against the
//! current values. A `properties.<field>: false` branch hides the field:
//! it stays in the tree with `is_visible: false`, its value comes back
//! `null` in `normalized_values`, and it is excluded from validation.
//!
//! # Cross-field logic
//!
//! The `x-jsf-logic` block declares named JSON-Logic validations and
//! computed values; fields opt in via `x-jsf-logic-validations` and
//! `x-jsf-logic-computedAttrs`.

mod conditions;
mod error;
mod fields;
mod form;
mod loader;
mod logic;
mod messages;
mod modify;
mod resolve;
mod types;
mod validation;

pub use conditions::matches_condition;
pub use error::{FormError, LoadError, SchemaError, ValidateError};
pub use form::{create_headless_form, HeadlessForm};
pub use loader::{load_schema, load_schema_str};
pub use logic::{Logic, LogicParseError, Op};
pub use modify::{modify, AllFieldsFn, ModifyConfig, ModifyResult, ModifyWarning};
pub use resolve::{resolve_conditionals, ResolvedScope};
pub use types::{
    CustomAttrFn, CustomAttrOutcome, CustomProperties, Field, FieldChildren, FieldCustomization,
    FieldOption, FormConfig, GroupTemplate, InputType, ValidationResult,
};
