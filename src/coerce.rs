//! Type coercion and default insertion ahead of schema evaluation.
//!
//! The `jsonschema` engine validates values exactly as given, while HTTP
//! inputs arrive as strings. These passes rewrite a candidate value towards
//! the schema's declared types before it is handed to the engine.

use serde_json::{Map, Number, Value};

use crate::options::{Coercion, EngineOptions};

/// Apply the engine options' coercion and default rules to `value` in place.
pub fn prepare(value: &mut Value, schema: &Value, options: &EngineOptions) {
    if options.coerce_types == Coercion::Off && !options.use_defaults {
        return;
    }
    apply(value, schema, options.coerce_types, options.use_defaults);
}

fn apply(value: &mut Value, schema: &Value, mode: Coercion, use_defaults: bool) {
    let Value::Object(schema) = schema else {
        return;
    };

    if mode != Coercion::Off {
        coerce_to_declared(value, schema, mode);
    }

    if let Some(Value::Array(branches)) = schema.get("allOf") {
        for branch in branches {
            apply(value, branch, mode, use_defaults);
        }
    }

    match value {
        Value::Object(obj) => {
            let props = schema.get("properties").and_then(Value::as_object);

            if let Some(props) = props {
                if use_defaults {
                    for (name, prop) in props {
                        if let Some(default) = prop.get("default") {
                            if !obj.contains_key(name) {
                                obj.insert(name.clone(), default.clone());
                            }
                        }
                    }
                }
                for (name, prop) in props {
                    if let Some(child) = obj.get_mut(name) {
                        apply(child, prop, mode, use_defaults);
                    }
                }
            }

            if let Some(extra @ Value::Object(_)) = schema.get("additionalProperties") {
                for (name, child) in obj.iter_mut() {
                    if props.map_or(true, |p| !p.contains_key(name)) {
                        apply(child, extra, mode, use_defaults);
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema @ Value::Object(_)) = schema.get("items") {
                for item in items {
                    apply(item, item_schema, mode, use_defaults);
                }
            }
        }
        _ => {}
    }
}

fn declared_types(schema: &Map<String, Value>) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn satisfies(value: &Value, declared: &str) -> bool {
    match (declared, value) {
        ("null", Value::Null)
        | ("boolean", Value::Bool(_))
        | ("number", Value::Number(_))
        | ("string", Value::String(_))
        | ("array", Value::Array(_))
        | ("object", Value::Object(_)) => true,
        ("integer", Value::Number(n)) => n.is_i64() || n.is_u64(),
        _ => false,
    }
}

fn coerce_to_declared(value: &mut Value, schema: &Map<String, Value>, mode: Coercion) {
    let types = declared_types(schema);
    if types.is_empty() || types.iter().any(|t| satisfies(value, t)) {
        return;
    }

    if mode == Coercion::Array {
        if types.contains(&"array") && !matches!(value, Value::Array(_) | Value::Object(_)) {
            let scalar = value.take();
            *value = Value::Array(vec![scalar]);
            return;
        }
        if let Value::Array(items) = value {
            if items.len() == 1 {
                let single = items.remove(0);
                *value = single;
                if types.iter().any(|t| satisfies(value, t)) {
                    return;
                }
            }
        }
    }

    for declared in types {
        if let Some(coerced) = convert(value, declared) {
            *value = coerced;
            return;
        }
    }
}

/// Convert a scalar to `declared`, or `None` when it has no such rendering.
fn convert(value: &Value, declared: &str) -> Option<Value> {
    match (declared, value) {
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("string", Value::Null) => Some(Value::String(String::new())),

        ("number", Value::String(s)) => parse_number(s),
        ("integer", Value::String(s)) => parse_number(s).as_ref().and_then(whole_number),
        ("integer", Value::Number(_)) => whole_number(value),
        ("number" | "integer", Value::Bool(b)) => Some(Value::from(u8::from(*b))),
        ("number" | "integer", Value::Null) => Some(Value::from(0)),

        ("boolean", Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(Value::Bool(true)),
            Some(f) if f == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Null) => Some(Value::Bool(false)),

        ("null", Value::String(s)) if s.is_empty() => Some(Value::Null),
        ("null", Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
        ("null", Value::Bool(false)) => Some(Value::Null),

        _ => None,
    }
}

/// `1.0` as the integer `1`; `None` for fractional values.
fn whole_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| Value::from(f as i64)),
        _ => None,
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}
