// ABOUTME: JSON Schema subset validation for tool arguments.
// ABOUTME: Collects every violation recursively, with dotted paths for nested fields.

use std::fmt;

use serde_json::Value;

/// One way a set of arguments fails its parameter schema.
///
/// `path` is dotted for nested object fields (`config.key`) and indexed for
/// array items (`items[2]`). An empty path means the top-level value.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    MissingRequired { path: String },
    WrongType { path: String, expected: String },
    NotInEnum { path: String, allowed: Vec<Value> },
    BelowMinimum { path: String, minimum: Value },
    AboveMaximum { path: String, maximum: Value },
    TooShort { path: String, min_length: u64 },
    TooLong { path: String, max_length: u64 },
    TooFewItems { path: String, min_items: u64 },
    TooManyItems { path: String, max_items: u64 },
}

fn label(path: &str) -> &str {
    if path.is_empty() { "parameter" } else { path }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingRequired { path } => write!(f, "missing required {}", path),
            Violation::WrongType { path, expected } => {
                write!(f, "{} should be {}", label(path), expected)
            }
            Violation::NotInEnum { path, allowed } => {
                let allowed: Vec<String> = allowed.iter().map(Value::to_string).collect();
                write!(f, "{} must be one of [{}]", label(path), allowed.join(", "))
            }
            Violation::BelowMinimum { path, minimum } => {
                write!(f, "{} must be >= {}", label(path), minimum)
            }
            Violation::AboveMaximum { path, maximum } => {
                write!(f, "{} must be <= {}", label(path), maximum)
            }
            Violation::TooShort { path, min_length } => {
                write!(f, "{} must be at least {} chars", label(path), min_length)
            }
            Violation::TooLong { path, max_length } => {
                write!(f, "{} must be at most {} chars", label(path), max_length)
            }
            Violation::TooFewItems { path, min_items } => {
                write!(f, "{} must have at least {} items", label(path), min_items)
            }
            Violation::TooManyItems { path, max_items } => {
                write!(f, "{} must have at most {} items", label(path), max_items)
            }
        }
    }
}

/// Validate `params` against a tool's parameter schema.
///
/// The top level is always treated as an object, whatever the schema's own
/// `type` says. Returns every violation found; an empty vec means valid.
pub fn validate(schema: &Value, params: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    if !params.is_object() {
        violations.push(Violation::WrongType {
            path: String::new(),
            expected: "object".to_string(),
        });
        return violations;
    }
    check_object(params, schema, "", &mut violations);
    violations
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown type keywords are not enforced.
        _ => true,
    }
}

fn check(value: &Value, schema: &Value, path: &str, out: &mut Vec<Violation>) {
    match schema.get("type") {
        Some(Value::String(expected)) if !type_matches(value, expected) => {
            out.push(Violation::WrongType {
                path: path.to_string(),
                expected: expected.clone(),
            });
            return;
        }
        Some(Value::Array(options)) => {
            let names: Vec<&str> = options.iter().filter_map(Value::as_str).collect();
            if !names.is_empty() && !names.iter().any(|t| type_matches(value, t)) {
                out.push(Violation::WrongType {
                    path: path.to_string(),
                    expected: names.join(" or "),
                });
                return;
            }
        }
        _ => {}
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            out.push(Violation::NotInEnum {
                path: path.to_string(),
                allowed: allowed.clone(),
            });
        }
    }

    match value {
        Value::Number(n) => check_number(n.as_f64(), schema, path, out),
        Value::String(s) => check_length(s, schema, path, out),
        Value::Object(_) => check_object(value, schema, path, out),
        Value::Array(items) => check_array(items, schema, path, out),
        _ => {}
    }
}

fn check_number(n: Option<f64>, schema: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(n) = n else { return };
    if let Some(minimum) = schema.get("minimum").filter(|m| m.is_number()) {
        if minimum.as_f64().is_some_and(|m| n < m) {
            out.push(Violation::BelowMinimum {
                path: path.to_string(),
                minimum: minimum.clone(),
            });
        }
    }
    if let Some(maximum) = schema.get("maximum").filter(|m| m.is_number()) {
        if maximum.as_f64().is_some_and(|m| n > m) {
            out.push(Violation::AboveMaximum {
                path: path.to_string(),
                maximum: maximum.clone(),
            });
        }
    }
}

fn check_length(s: &str, schema: &Value, path: &str, out: &mut Vec<Violation>) {
    let len = s.chars().count() as u64;
    if let Some(min_length) = schema.get("minLength").and_then(Value::as_u64) {
        if len < min_length {
            out.push(Violation::TooShort {
                path: path.to_string(),
                min_length,
            });
        }
    }
    if let Some(max_length) = schema.get("maxLength").and_then(Value::as_u64) {
        if len > max_length {
            out.push(Violation::TooLong {
                path: path.to_string(),
                max_length,
            });
        }
    }
}

fn check_object(value: &Value, schema: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(fields) = value.as_object() else { return };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !fields.contains_key(key) {
                out.push(Violation::MissingRequired {
                    path: join(path, key),
                });
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, sub_schema) in properties {
            if let Some(field) = fields.get(key) {
                check(field, sub_schema, &join(path, key), out);
            }
        }
    }
}

fn check_array(items: &[Value], schema: &Value, path: &str, out: &mut Vec<Violation>) {
    let count = items.len() as u64;
    if let Some(min_items) = schema.get("minItems").and_then(Value::as_u64) {
        if count < min_items {
            out.push(Violation::TooFewItems {
                path: path.to_string(),
                min_items,
            });
        }
    }
    if let Some(max_items) = schema.get("maxItems").and_then(Value::as_u64) {
        if count > max_items {
            out.push(Violation::TooManyItems {
                path: path.to_string(),
                max_items,
            });
        }
    }

    if let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) {
        for (i, item) in items.iter().enumerate() {
            check(item, item_schema, &format!("{}[{}]", path, i), out);
        }
    }
}
