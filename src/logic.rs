//! Cross-field logic: the `x-jsf-logic` JSON-Logic rule set.
//!
//! Rules are parsed into a small expression AST and evaluated with a
//! recursive interpreter over a closed operator set. Missing rules and
//! unresolved variables are non-fatal: they warn and evaluate to null.

use serde_json::{Map, Number, Value};

use crate::types::{LOGIC_COMPUTED_ATTRS_KEY, LOGIC_KEY, LOGIC_VALIDATIONS_KEY};

/// Numeric coercion used across the engine: numbers directly, numeric
/// strings parsed, everything else `None`.
pub(crate) fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// JavaScript-flavored truthiness: `false`, `0`, `""`, `null` are falsy.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Operators of the closed JSON-Logic subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Gt,
    Ge,
    Lt,
    Le,
    EqLoose,
    EqStrict,
    NeLoose,
    NeStrict,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
}

impl Op {
    fn parse(key: &str) -> Option<Op> {
        Some(match key {
            ">" => Op::Gt,
            ">=" => Op::Ge,
            "<" => Op::Lt,
            "<=" => Op::Le,
            "==" => Op::EqLoose,
            "===" => Op::EqStrict,
            "!=" => Op::NeLoose,
            "!==" => Op::NeStrict,
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "/" => Op::Div,
            "%" => Op::Mod,
            "and" => Op::And,
            "or" => Op::Or,
            _ => return None,
        })
    }
}

/// Parsed JSON-Logic expression.
#[derive(Debug, Clone)]
pub enum Logic {
    Const(Value),
    Var(String),
    Op(Op, Vec<Logic>),
    If(Vec<Logic>),
    Not(Box<Logic>),
}

/// Why an expression could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum LogicParseError {
    #[error("unknown operator \"{0}\"")]
    UnknownOperator(String),

    #[error("operator object must have exactly one key")]
    NotAnOperator,

    #[error("\"var\" reference must be a string")]
    BadVarReference,
}

impl Logic {
    /// Parse a JSON-Logic expression from its JSON form.
    ///
    /// Scalars and arrays are literals; single-key objects dispatch on the
    /// operator name.
    pub fn parse(expr: &Value) -> Result<Logic, LogicParseError> {
        let Value::Object(map) = expr else {
            return Ok(Logic::Const(expr.clone()));
        };

        if map.len() != 1 {
            return Err(LogicParseError::NotAnOperator);
        }
        let Some((key, operands)) = map.iter().next() else {
            return Err(LogicParseError::NotAnOperator);
        };

        let key = key.as_str();
        if key == "var" {
            // Both {"var": "a"} and {"var": ["a"]} are accepted.
            let name = match operands {
                Value::String(s) => s.clone(),
                Value::Array(arr) => match arr.first() {
                    Some(Value::String(s)) => s.clone(),
                    _ => return Err(LogicParseError::BadVarReference),
                },
                _ => return Err(LogicParseError::BadVarReference),
            };
            return Ok(Logic::Var(name));
        }

        if key == "!" {
            let inner = match operands {
                Value::Array(arr) if arr.len() == 1 => Logic::parse(&arr[0])?,
                other => Logic::parse(other)?,
            };
            return Ok(Logic::Not(Box::new(inner)));
        }

        let args = match operands {
            Value::Array(arr) => arr.iter().map(Logic::parse).collect::<Result<_, _>>()?,
            single => vec![Logic::parse(single)?],
        };

        if key == "if" {
            return Ok(Logic::If(args));
        }

        match Op::parse(key) {
            Some(op) => Ok(Logic::Op(op, args)),
            None => Err(LogicParseError::UnknownOperator(key.to_string())),
        }
    }

    /// Evaluate against an environment of current form values.
    ///
    /// References to absent values evaluate to null, which makes
    /// comparisons false and arithmetic null, matching JSON-Logic.
    pub fn evaluate(&self, env: &Value) -> Value {
        match self {
            Logic::Const(v) => v.clone(),
            Logic::Var(path) => lookup_var(env, path).cloned().unwrap_or(Value::Null),
            Logic::Not(inner) => Value::Bool(!truthy(&inner.evaluate(env))),
            Logic::If(arms) => eval_if(arms, env),
            Logic::Op(op, args) => eval_op(*op, args, env),
        }
    }
}

fn lookup_var<'a>(env: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = env;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn eval_if(arms: &[Logic], env: &Value) -> Value {
    // [cond, then, cond2, then2, ..., else?]
    let mut i = 0;
    while i + 1 < arms.len() {
        if truthy(&arms[i].evaluate(env)) {
            return arms[i + 1].evaluate(env);
        }
        i += 2;
    }
    if i < arms.len() {
        arms[i].evaluate(env)
    } else {
        Value::Null
    }
}

fn eval_op(op: Op, args: &[Logic], env: &Value) -> Value {
    match op {
        Op::And => {
            let mut last = Value::Bool(true);
            for arg in args {
                last = arg.evaluate(env);
                if !truthy(&last) {
                    return last;
                }
            }
            last
        }
        Op::Or => {
            let mut last = Value::Bool(false);
            for arg in args {
                last = arg.evaluate(env);
                if truthy(&last) {
                    return last;
                }
            }
            last
        }
        Op::Gt | Op::Ge | Op::Lt | Op::Le => {
            let values: Vec<Value> = args.iter().map(|a| a.evaluate(env)).collect();
            // Comparisons chain pairwise: [a, b, c] means a < b < c.
            for pair in values.windows(2) {
                if !compare(op, &pair[0], &pair[1]) {
                    return Value::Bool(false);
                }
            }
            Value::Bool(values.len() >= 2)
        }
        Op::EqLoose | Op::EqStrict | Op::NeLoose | Op::NeStrict => {
            let (Some(a), Some(b)) = (args.first(), args.get(1)) else {
                return Value::Bool(false);
            };
            let (a, b) = (a.evaluate(env), b.evaluate(env));
            let equal = match op {
                Op::EqLoose | Op::NeLoose => loose_eq(&a, &b),
                _ => strict_eq(&a, &b),
            };
            match op {
                Op::NeLoose | Op::NeStrict => Value::Bool(!equal),
                _ => Value::Bool(equal),
            }
        }
        Op::Add => fold_numeric(args, env, 0.0, |acc, n| acc + n),
        Op::Mul => fold_numeric(args, env, 1.0, |acc, n| acc * n),
        Op::Sub => match args {
            [single] => match json_number(&single.evaluate(env)) {
                Some(n) => number_value(-n),
                None => Value::Null,
            },
            [a, b, ..] => binary_numeric(a, b, env, |x, y| Some(x - y)),
            [] => Value::Null,
        },
        Op::Div => match args {
            [a, b, ..] => binary_numeric(a, b, env, |x, y| {
                if y == 0.0 {
                    None
                } else {
                    Some(x / y)
                }
            }),
            _ => Value::Null,
        },
        Op::Mod => match args {
            [a, b, ..] => binary_numeric(a, b, env, |x, y| {
                if y == 0.0 {
                    None
                } else {
                    Some(x % y)
                }
            }),
            _ => Value::Null,
        },
    }
}

fn compare(op: Op, a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (json_number(a), json_number(b)) {
        return match op {
            Op::Gt => x > y,
            Op::Ge => x >= y,
            Op::Lt => x < y,
            Op::Le => x <= y,
            _ => false,
        };
    }
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return match op {
            Op::Gt => x > y,
            Op::Ge => x >= y,
            Op::Lt => x < y,
            Op::Le => x <= y,
            _ => false,
        };
    }
    false
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (json_number(a), json_number(b)) {
        return x == y;
    }
    a == b
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => loose_eq(a, b),
        _ => a == b,
    }
}

fn fold_numeric(args: &[Logic], env: &Value, init: f64, f: impl Fn(f64, f64) -> f64) -> Value {
    let mut acc = init;
    for arg in args {
        match json_number(&arg.evaluate(env)) {
            Some(n) => acc = f(acc, n),
            None => return Value::Null,
        }
    }
    number_value(acc)
}

fn binary_numeric(
    a: &Logic,
    b: &Logic,
    env: &Value,
    f: impl Fn(f64, f64) -> Option<f64>,
) -> Value {
    match (json_number(&a.evaluate(env)), json_number(&b.evaluate(env))) {
        (Some(x), Some(y)) => f(x, y).map(number_value).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// One named validation rule from `x-jsf-logic.validations`.
struct NamedRule {
    rule: Logic,
    error_message: Option<String>,
}

/// Parsed `x-jsf-logic` rule set of a schema.
#[derive(Default)]
pub(crate) struct LogicContext {
    parsed_validations: std::collections::HashMap<String, NamedRule>,
    computed: std::collections::HashMap<String, Logic>,
}

impl LogicContext {
    /// Parse the `x-jsf-logic` block of a schema root. Unparseable rules
    /// warn and are skipped.
    pub fn from_schema(schema: &Map<String, Value>) -> Self {
        let mut ctx = LogicContext::default();
        let Some(logic) = schema.get(LOGIC_KEY).and_then(Value::as_object) else {
            return ctx;
        };

        if let Some(validations) = logic.get("validations").and_then(Value::as_object) {
            for (name, entry) in validations {
                let Some(rule_value) = entry.get("rule") else {
                    tracing::warn!(rule = %name, "validation rule has no \"rule\" expression");
                    continue;
                };
                match Logic::parse(rule_value) {
                    Ok(rule) => {
                        let error_message = entry
                            .get("errorMessage")
                            .and_then(Value::as_str)
                            .map(str::to_string);
                        ctx.parsed_validations
                            .insert(name.clone(), NamedRule { rule, error_message });
                    }
                    Err(e) => tracing::warn!(rule = %name, error = %e, "skipping unparseable validation rule"),
                }
            }
        }

        if let Some(computed) = logic.get("computedValues").and_then(Value::as_object) {
            for (name, entry) in computed {
                let Some(rule_value) = entry.get("rule") else {
                    tracing::warn!(name = %name, "computed value has no \"rule\" expression");
                    continue;
                };
                match Logic::parse(rule_value) {
                    Ok(rule) => {
                        ctx.computed.insert(name.clone(), rule);
                    }
                    Err(e) => tracing::warn!(name = %name, error = %e, "skipping unparseable computed value"),
                }
            }
        }

        ctx
    }

    pub fn is_empty(&self) -> bool {
        self.parsed_validations.is_empty() && self.computed.is_empty()
    }

    /// Evaluate every named computed value against the current values.
    pub fn computed_values(&self, values: &Value) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, rule) in &self.computed {
            out.insert(name.clone(), rule.evaluate(values));
        }
        out
    }

    /// Run the rules referenced by a field's `x-jsf-logic-validations`.
    ///
    /// Left-to-right, the first failing rule wins; rules referencing an
    /// unknown name warn and are skipped.
    pub fn validate_field(&self, node: &Map<String, Value>, values: &Value) -> Option<String> {
        let names = node.get(LOGIC_VALIDATIONS_KEY).and_then(Value::as_array)?;
        for name in names.iter().filter_map(Value::as_str) {
            let Some(named) = self.parsed_validations.get(name) else {
                tracing::warn!(rule = %name, "field references an unknown validation rule");
                continue;
            };
            if !truthy(&named.rule.evaluate(values)) {
                return Some(named.error_message.clone().unwrap_or_else(|| {
                    format!("The field failed the \"{name}\" validation")
                }));
            }
        }
        None
    }

    /// Resolve a field's `x-jsf-logic-computedAttrs` onto its schema node.
    ///
    /// String values naming a computed value are replaced by it; `{{name}}`
    /// placeholders inside strings are substituted; `{ "rule": ... }`
    /// objects are evaluated inline; nested objects recurse.
    pub fn apply_computed_attrs(&self, node: &mut Map<String, Value>, values: &Value) {
        let Some(attrs) = node
            .get(LOGIC_COMPUTED_ATTRS_KEY)
            .and_then(Value::as_object)
            .cloned()
        else {
            return;
        };

        let computed = self.computed_values(values);
        for (attr, spec) in &attrs {
            let resolved = self.resolve_computed_attr(spec, &computed, values);
            node.insert(attr.clone(), resolved);
        }
    }

    fn resolve_computed_attr(
        &self,
        spec: &Value,
        computed: &Map<String, Value>,
        values: &Value,
    ) -> Value {
        match spec {
            Value::String(s) => {
                if let Some(value) = computed.get(s.as_str()) {
                    return value.clone();
                }
                Value::String(substitute_templates(s, computed))
            }
            Value::Object(map) => {
                if let Some(rule_value) = map.get("rule") {
                    return match Logic::parse(rule_value) {
                        Ok(rule) => rule.evaluate(values),
                        Err(e) => {
                            tracing::warn!(error = %e, "skipping unparseable inline computed rule");
                            Value::Null
                        }
                    };
                }
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve_computed_attr(v, computed, values));
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }
}

/// Replace `{{name}}` placeholders with computed values. Unknown names warn
/// and are left untouched.
fn substitute_templates(template: &str, computed: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match computed.get(name) {
                    Some(value) => out.push_str(&crate::messages::display_value(value)),
                    None => {
                        tracing::warn!(name, "unresolved template placeholder");
                        out.push_str(&rest[start..start + 2 + end + 2]);
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
