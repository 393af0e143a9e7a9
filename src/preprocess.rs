//! Body schema rewrites applied before compilation.
//!
//! Both rewrites operate on an owned schema copy and are idempotent.

use serde_json::Value;

/// Let every optional property accept `null`.
///
/// Walks object schemas recursively; a property absent from its parent's
/// `required` list gets a `null` branch added to its `type` (and `enum`).
/// Required properties keep their schema unchanged.
pub fn make_optional_attributes_nullable(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };

    let required: Vec<String> = map
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    if let Some(Value::Object(props)) = map.get_mut("properties") {
        for (name, prop) in props.iter_mut() {
            if !required.contains(name) {
                make_nullable(prop);
            }
            make_optional_attributes_nullable(prop);
        }
    }

    for (key, child) in map.iter_mut() {
        match key.as_str() {
            "items" | "additionalProperties" => make_optional_attributes_nullable(child),
            "allOf" | "anyOf" | "oneOf" => {
                if let Value::Array(branches) = child {
                    for branch in branches {
                        make_optional_attributes_nullable(branch);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Translate the OpenAPI 3 `nullable: true` flag into a `null` type branch.
pub fn apply_nullable_keyword(schema: &mut Value) {
    if schema.get("nullable").and_then(Value::as_bool) == Some(true) {
        make_nullable(schema);
    }

    let Value::Object(map) = schema else {
        return;
    };
    for (key, child) in map.iter_mut() {
        match key.as_str() {
            "properties" => {
                if let Value::Object(props) = child {
                    for prop in props.values_mut() {
                        apply_nullable_keyword(prop);
                    }
                }
            }
            "items" | "additionalProperties" | "not" => apply_nullable_keyword(child),
            "allOf" | "anyOf" | "oneOf" => {
                if let Value::Array(branches) = child {
                    for branch in branches {
                        apply_nullable_keyword(branch);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Add `null` to a schema's declared type and enum.
///
/// Schemas without a `type` already accept `null` and are left alone.
fn make_nullable(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };

    if let Some(declared) = map.get_mut("type") {
        match declared {
            Value::String(t) if t.as_str() != "null" => {
                let single = std::mem::take(t);
                *declared = Value::from(vec![single, "null".to_string()]);
            }
            Value::Array(types) => {
                if !types.iter().any(|t| t == "null") {
                    types.push(Value::from("null"));
                }
            }
            _ => {}
        }
    }

    if let Some(Value::Array(options)) = map.get_mut("enum") {
        if !options.contains(&Value::Null) {
            options.push(Value::Null);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_properties_become_nullable() {
        let mut schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "integer" },
                "kind": { "type": "string", "enum": ["a", "b"] }
            }
        });
        make_optional_attributes_nullable(&mut schema);

        assert_eq!(schema["properties"]["name"]["type"], "string");
        assert_eq!(schema["properties"]["age"]["type"], json!(["integer", "null"]));
        assert_eq!(schema["properties"]["kind"]["enum"], json!(["a", "b", null]));
    }

    #[test]
    fn nested_objects_and_array_items() {
        let mut schema = json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": ["test"],
                "properties": {
                    "test": {
                        "type": "object",
                        "required": ["field1"],
                        "properties": {
                            "field1": { "type": "string" },
                            "field2": { "type": "string" },
                            "field3": { "type": ["string", "number"] }
                        }
                    }
                }
            }
        });
        make_optional_attributes_nullable(&mut schema);

        let test = &schema["items"]["properties"]["test"];
        assert_eq!(test["type"], "object");
        assert_eq!(test["properties"]["field1"]["type"], "string");
        assert_eq!(test["properties"]["field2"]["type"], json!(["string", "null"]));
        assert_eq!(
            test["properties"]["field3"]["type"],
            json!(["string", "number", "null"])
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let mut once = json!({
            "type": "object",
            "properties": { "age": { "type": "integer", "enum": [1, 2] } }
        });
        make_optional_attributes_nullable(&mut once);
        let mut twice = once.clone();
        make_optional_attributes_nullable(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn untyped_properties_untouched() {
        let mut schema = json!({
            "type": "object",
            "properties": { "anything": { "description": "free form" } }
        });
        let before = schema.clone();
        make_optional_attributes_nullable(&mut schema);
        assert_eq!(schema, before);
    }

    #[test]
    fn nullable_keyword_translated() {
        let mut schema = json!({
            "type": "object",
            "properties": {
                "nickname": { "type": "string", "nullable": true },
                "tags": {
                    "type": "array",
                    "items": { "type": "integer", "nullable": true }
                },
                "name": { "type": "string" }
            }
        });
        apply_nullable_keyword(&mut schema);

        assert_eq!(
            schema["properties"]["nickname"]["type"],
            json!(["string", "null"])
        );
        assert_eq!(
            schema["properties"]["tags"]["items"]["type"],
            json!(["integer", "null"])
        );
        assert_eq!(schema["properties"]["name"]["type"], "string");
    }
}
