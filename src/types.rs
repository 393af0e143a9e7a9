//! Core types shared by the dialect adapters and the schema builder.

use serde_json::{Map, Value};

/// HTTP methods that name operations inside a path item.
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
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

/// Specification dialect, detected once per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecVersion {
    /// Swagger 2.0: flat `parameters[]` with `in`, `definitions`.
    Oas2,
    /// OpenAPI 3.x: `requestBody.content`, `components`.
    Oas3,
}

impl SpecVersion {
    /// Detect the dialect from the document's version tag.
    ///
    /// Returns `None` when the document carries neither `swagger` nor `openapi`.
    pub fn detect(document: &Value) -> Option<Self> {
        if let Some(version) = document.get("openapi").and_then(Value::as_str) {
            return version.starts_with('3').then_some(SpecVersion::Oas3);
        }
        match document.get("swagger") {
            Some(Value::String(v)) if v.starts_with('2') => Some(SpecVersion::Oas2),
            Some(Value::Number(n)) if n.as_f64().map(|v| v >= 2.0 && v < 3.0) == Some(true) => {
                Some(SpecVersion::Oas2)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecVersion::Oas2 => "swagger 2.0",
            SpecVersion::Oas3 => "openapi 3",
        }
    }
}

/// Declared location of a parameter (`in`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Header,
    Path,
    Query,
    FormData,
    Body,
    Cookie,
    /// Anything else; kept so that unknown locations stay forward compatible.
    Other(String),
}

impl ParameterLocation {
    pub fn parse(s: &str) -> Self {
        match s {
            "header" => ParameterLocation::Header,
            "path" => ParameterLocation::Path,
            "query" => ParameterLocation::Query,
            "formData" => ParameterLocation::FormData,
            "body" => ParameterLocation::Body,
            "cookie" => ParameterLocation::Cookie,
            other => ParameterLocation::Other(other.to_string()),
        }
    }
}

/// Validation bucket a parameter is checked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Headers,
    Path,
    Query,
    /// Body-adjacent inputs; never part of the compiled parameters schema.
    Fields,
}

impl Bucket {
    /// Property name of the bucket inside the composite parameters schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Headers => "headers",
            Bucket::Path => "path",
            Bucket::Query => "query",
            Bucket::Fields => "fields",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized request parameter.
///
/// `schema` holds the parameter's constraints with `name`, `in` and
/// `required` stripped, ready to be registered under a bucket's `properties`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Map<String, Value>,
}

impl Parameter {
    /// Parse a parameter object whose constraints sit beside `name`/`in`
    /// (the Swagger 2.0 layout).
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("expected object, got {}", json_type_name(value)))?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or("parameter has no `name`")?
            .to_string();
        let location = obj
            .get("in")
            .and_then(Value::as_str)
            .map(ParameterLocation::parse)
            .ok_or_else(|| format!("parameter `{}` has no `in`", name))?;
        let required = obj.get("required").and_then(Value::as_bool).unwrap_or(false);

        let schema = obj
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "name" | "in" | "required"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            name,
            location,
            required,
            schema,
        })
    }

    /// True for `type: file` upload parameters.
    pub fn is_file(&self) -> bool {
        self.schema.get("type").and_then(Value::as_str) == Some("file")
    }

    /// Key under which the parameter is registered.
    ///
    /// Header names are case-insensitive and therefore lower-cased.
    pub fn key(&self) -> String {
        if self.location == ParameterLocation::Header {
            self.name.to_lowercase()
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detect_versions() {
        assert_eq!(
            SpecVersion::detect(&json!({ "swagger": "2.0" })),
            Some(SpecVersion::Oas2)
        );
        assert_eq!(
            SpecVersion::detect(&json!({ "openapi": "3.0.0" })),
            Some(SpecVersion::Oas3)
        );
        assert_eq!(
            SpecVersion::detect(&json!({ "openapi": "3.0.3" })),
            Some(SpecVersion::Oas3)
        );
        assert_eq!(SpecVersion::detect(&json!({ "info": {} })), None);
        assert_eq!(SpecVersion::detect(&json!({ "openapi": "4.0" })), None);
    }

    #[test]
    fn location_parse() {
        assert_eq!(ParameterLocation::parse("header"), ParameterLocation::Header);
        assert_eq!(ParameterLocation::parse("formData"), ParameterLocation::FormData);
        assert_eq!(
            ParameterLocation::parse("matrix"),
            ParameterLocation::Other("matrix".into())
        );
    }

    #[test]
    fn parameter_from_value_strips_descriptor_keys() {
        let param = Parameter::from_value(&json!({
            "name": "Api-Version",
            "in": "header",
            "required": true,
            "type": "string",
            "pattern": "^\\d{1,3}\\.\\d{1,3}$"
        }))
        .unwrap();

        assert_eq!(param.name, "Api-Version");
        assert_eq!(param.key(), "api-version");
        assert!(param.required);
        assert!(!param.schema.contains_key("name"));
        assert!(!param.schema.contains_key("in"));
        assert_eq!(param.schema["type"], "string");
    }

    #[test]
    fn parameter_key_preserves_case_outside_headers() {
        let param =
            Parameter::from_value(&json!({ "name": "petId", "in": "path", "type": "string" }))
                .unwrap();
        assert_eq!(param.key(), "petId");
        assert!(!param.required);
    }

    #[test]
    fn parameter_without_name_is_rejected() {
        let err = Parameter::from_value(&json!({ "in": "query" })).unwrap_err();
        assert!(err.contains("name"));
    }

    #[test]
    fn file_parameter_detected() {
        let param = Parameter::from_value(&json!({
            "name": "sourceFile",
            "in": "formData",
            "type": "file"
        }))
        .unwrap();
        assert!(param.is_file());
    }
}
