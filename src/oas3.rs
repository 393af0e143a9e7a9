//! OpenAPI 3.x adapter.

use serde_json::{Map, Value};

use crate::adapter::{compile_body, parse_parameters, DialectAdapter, Operation};
use crate::error::BuildError;
use crate::options::BuildOptions;
use crate::preprocess::{apply_nullable_keyword, make_optional_attributes_nullable};
use crate::types::{Parameter, SpecVersion};
use crate::validator::Validator;

const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, Default)]
pub struct Oas3Adapter;

/// Lift a parameter's `schema` next to its `name`/`in`/`required`, so it
/// has the same layout as a Swagger 2.0 parameter.
pub fn flatten_parameter(parameter: &Value) -> Value {
    let Value::Object(declared) = parameter else {
        return parameter.clone();
    };

    let mut flat = Map::new();
    for key in ["name", "in", "required", "description"] {
        if let Some(value) = declared.get(key) {
            flat.insert(key.to_string(), value.clone());
        }
    }
    if let Some(Value::Object(schema)) = declared.get("schema") {
        let mut schema = Value::Object(schema.clone());
        apply_nullable_keyword(&mut schema);
        if let Value::Object(schema) = schema {
            for (key, value) in schema {
                flat.entry(key).or_insert(value);
            }
        }
    }
    Value::Object(flat)
}

/// The request body schema: `application/json` if declared, otherwise the
/// first media type that carries a schema.
pub fn request_body_schema(operation: &Map<String, Value>) -> Option<&Value> {
    let content = operation
        .get("requestBody")?
        .get("content")?
        .as_object()?;
    content
        .get(JSON_MEDIA_TYPE)
        .and_then(|media| media.get("schema"))
        .or_else(|| content.values().find_map(|media| media.get("schema")))
}

impl DialectAdapter for Oas3Adapter {
    fn version(&self) -> SpecVersion {
        SpecVersion::Oas3
    }

    fn build_path_parameters(
        &self,
        op: &Operation<'_>,
    ) -> Result<(Vec<Parameter>, Vec<Parameter>), BuildError> {
        Ok((
            parse_parameters(op.path_item.get("parameters"), op.endpoint, flatten_parameter)?,
            parse_parameters(op.operation.get("parameters"), op.endpoint, flatten_parameter)?,
        ))
    }

    fn build_request_body_validation(
        &self,
        op: &Operation<'_>,
        _parameters: &[Parameter],
        options: &BuildOptions,
    ) -> Result<Option<Validator>, BuildError> {
        let Some(schema) = request_body_schema(op.operation) else {
            return Ok(None);
        };
        let mut schema = schema.clone();
        apply_nullable_keyword(&mut schema);
        if options.make_optional_attributes_nullable {
            make_optional_attributes_nullable(&mut schema);
        }
        compile_body(schema, op, options, "body").map(Some)
    }

    fn request_content_types(&self, op: &Operation<'_>) -> Option<Vec<String>> {
        let content = op
            .operation
            .get("requestBody")?
            .get("content")?
            .as_object()?;
        Some(content.keys().cloned().collect())
    }
}
