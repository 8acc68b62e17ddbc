//! Condition matching for `if` clauses.
//!
//! Decides whether an `if` clause holds against the current values, without
//! running a full schema validator: only the subset of keywords conditional
//! form schemas actually use is interpreted.

use serde_json::Value;

use crate::logic::json_number;

/// Evaluate an `if` clause against the values of its scope.
///
/// `values` is already scoped: for a fieldset's own `allOf`, the caller
/// passes that fieldset's value object.
///
/// Semantics:
/// - `true` / `false` literals short-circuit.
/// - Every name in `required` must be present (and non-null) in `values`;
///   a missing one makes the whole clause false. This is a precondition,
///   not just a presence check.
/// - Every `properties` sub-schema is checked only when the corresponding
///   value is present; an absent value passes vacuously.
/// - `anyOf` holds when at least one sub-clause matches.
pub fn matches_condition(if_clause: &Value, values: &Value) -> bool {
    match if_clause {
        Value::Bool(b) => *b,
        Value::Object(clause) => {
            if let Some(required) = clause.get("required").and_then(Value::as_array) {
                let all_present = required
                    .iter()
                    .filter_map(Value::as_str)
                    .all(|name| is_present(values, name));
                if !all_present {
                    return false;
                }
            }

            if let Some(props) = clause.get("properties").and_then(Value::as_object) {
                for (name, sub) in props {
                    if let Some(value) = lookup(values, name) {
                        if !value_satisfies(value, sub) {
                            return false;
                        }
                    }
                }
            }

            if let Some(any_of) = clause.get("anyOf").and_then(Value::as_array) {
                if !any_of.iter().any(|sub| matches_condition(sub, values)) {
                    return false;
                }
            }

            true
        }
        // Anything else is not a recognizable condition.
        _ => false,
    }
}

fn lookup<'a>(values: &'a Value, name: &str) -> Option<&'a Value> {
    match values.get(name) {
        Some(Value::Null) | None => None,
        Some(v) => Some(v),
    }
}

fn is_present(values: &Value, name: &str) -> bool {
    lookup(values, name).is_some()
}

/// Check a present value against one property sub-schema of an `if` clause.
fn value_satisfies(value: &Value, sub: &Value) -> bool {
    let Some(sub) = sub.as_object() else {
        // `properties: { x: true }` means "present is enough".
        return sub.as_bool().unwrap_or(false);
    };

    if let Some(expected) = sub.get("const") {
        if !loose_equal(value, expected) {
            return false;
        }
    }

    if let Some(options) = sub.get("enum").and_then(Value::as_array) {
        if !options.iter().any(|o| loose_equal(value, o)) {
            return false;
        }
    }

    if let Some(min) = sub.get("minimum").and_then(json_number) {
        match value.as_f64() {
            Some(n) if n >= min => {}
            _ => return false,
        }
    }

    if let Some(max) = sub.get("maximum").and_then(json_number) {
        match value.as_f64() {
            Some(n) if n <= max => {}
            _ => return false,
        }
    }

    if let Some(min) = sub.get("minLength").and_then(Value::as_u64) {
        match value.as_str() {
            Some(s) if s.chars().count() as u64 >= min => {}
            _ => return false,
        }
    }

    if let Some(max) = sub.get("maxLength").and_then(Value::as_u64) {
        match value.as_str() {
            Some(s) if s.chars().count() as u64 <= max => {}
            _ => return false,
        }
    }

    if let Some(contains) = sub.get("contains") {
        if !array_contains(value, contains) {
            return false;
        }
    }

    // Nested fieldset scope: recurse with the nested value as the new scope.
    if sub.contains_key("properties") || sub.contains_key("required") {
        if !matches_condition(&Value::Object(sub.clone()), value) {
            return false;
        }
    }

    if let Some(any_of) = sub.get("anyOf").and_then(Value::as_array) {
        if !any_of.iter().any(|option| value_satisfies(value, option)) {
            return false;
        }
    }

    true
}

/// `contains` support: at least one array element must satisfy the
/// sub-schema; only the `pattern` and `const` forms are interpreted.
fn array_contains(value: &Value, contains: &Value) -> bool {
    let Some(items) = value.as_array() else {
        return false;
    };

    if let Some(pattern) = contains.get("pattern").and_then(Value::as_str) {
        let Ok(re) = regex::Regex::new(pattern) else {
            tracing::warn!(pattern, "ignoring unparseable contains.pattern");
            return false;
        };
        return items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| re.is_match(s));
    }

    if let Some(expected) = contains.get("const") {
        return items.iter().any(|item| loose_equal(item, expected));
    }

    false
}

/// Equality with numeric widening, so `1` and `1.0` compare equal. Strings
/// never compare equal to numbers here.
pub(crate) fn loose_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boolean_literals() {
        assert!(matches_condition(&json!(true), &json!({})));
        assert!(!matches_condition(&json!(false), &json!({})));
    }

    #[test]
    fn const_match_requires_presence_via_required() {
        let clause = json!({
            "properties": { "pet": { "const": "dog" } },
            "required": ["pet"]
        });
        assert!(matches_condition(&clause, &json!({ "pet": "dog" })));
        assert!(!matches_condition(&clause, &json!({ "pet": "cat" })));
        // Absent value fails the required precondition.
        assert!(!matches_condition(&clause, &json!({})));
        assert!(!matches_condition(&clause, &json!({ "pet": null })));
    }

    #[test]
    fn without_required_absent_value_passes_vacuously() {
        // Known authoring footgun: omitting `required` makes the clause
        // match when the value is absent.
        let clause = json!({
            "properties": { "pet": { "const": "dog" } }
        });
        assert!(matches_condition(&clause, &json!({})));
        assert!(!matches_condition(&clause, &json!({ "pet": "cat" })));
    }

    #[test]
    fn numeric_range_checks() {
        let clause = json!({
            "properties": { "age": { "minimum": 18, "maximum": 65 } },
            "required": ["age"]
        });
        assert!(matches_condition(&clause, &json!({ "age": 18 })));
        assert!(matches_condition(&clause, &json!({ "age": 65 })));
        assert!(!matches_condition(&clause, &json!({ "age": 17 })));
        assert!(!matches_condition(&clause, &json!({ "age": 66 })));
        assert!(!matches_condition(&clause, &json!({ "age": "18" })));
    }

    #[test]
    fn string_length_checks() {
        let clause = json!({
            "properties": { "nickname": { "minLength": 2, "maxLength": 4 } },
            "required": ["nickname"]
        });
        assert!(matches_condition(&clause, &json!({ "nickname": "ab" })));
        assert!(!matches_condition(&clause, &json!({ "nickname": "a" })));
        assert!(!matches_condition(&clause, &json!({ "nickname": "abcde" })));
    }

    #[test]
    fn enum_membership() {
        let clause = json!({
            "properties": { "plan": { "enum": ["basic", "pro"] } },
            "required": ["plan"]
        });
        assert!(matches_condition(&clause, &json!({ "plan": "pro" })));
        assert!(!matches_condition(&clause, &json!({ "plan": "enterprise" })));
    }

    #[test]
    fn contains_pattern_on_array_values() {
        let clause = json!({
            "properties": { "perks": { "contains": { "pattern": "^meal" } } },
            "required": ["perks"]
        });
        assert!(matches_condition(
            &clause,
            &json!({ "perks": ["gym", "meal_allowance"] })
        ));
        assert!(!matches_condition(&clause, &json!({ "perks": ["gym"] })));
        assert!(!matches_condition(&clause, &json!({ "perks": "meal" })));
    }

    #[test]
    fn nested_fieldset_scope_recursion() {
        let clause = json!({
            "properties": {
                "address": {
                    "properties": { "country": { "const": "PT" } },
                    "required": ["country"]
                }
            },
            "required": ["address"]
        });
        assert!(matches_condition(
            &clause,
            &json!({ "address": { "country": "PT" } })
        ));
        assert!(!matches_condition(
            &clause,
            &json!({ "address": { "country": "ES" } })
        ));
        assert!(!matches_condition(&clause, &json!({})));
    }

    #[test]
    fn any_of_matches_when_one_branch_holds() {
        let clause = json!({
            "anyOf": [
                { "properties": { "a": { "const": 1 } }, "required": ["a"] },
                { "properties": { "b": { "const": 2 } }, "required": ["b"] }
            ]
        });
        assert!(matches_condition(&clause, &json!({ "b": 2 })));
        assert!(!matches_condition(&clause, &json!({ "a": 2, "b": 3 })));
    }

    #[test]
    fn numeric_widening_in_const() {
        let clause = json!({
            "properties": { "rate": { "const": 1.0 } },
            "required": ["rate"]
        });
        assert!(matches_condition(&clause, &json!({ "rate": 1 })));
    }

    #[test]
    fn never_mutates_inputs() {
        let clause = json!({
            "properties": { "pet": { "const": "dog" } },
            "required": ["pet"]
        });
        let values = json!({ "pet": "dog" });
        let before = values.clone();
        let clause_before = clause.clone();
        matches_condition(&clause, &values);
        assert_eq!(values, before);
        assert_eq!(clause, clause_before);
    }
}
