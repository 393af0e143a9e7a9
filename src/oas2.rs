//! Swagger 2.0 adapter.
//!
//! Parameters are a flat list with `in`; the body is the `in: body`
//! parameter's `schema` or, in form-fields-in-body mode, an object built from
//! the `formData` fields. Media types come from `consumes`/`produces` with
//! operation, path item and document fallback.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::adapter::{compile_body, parse_parameters, string_list, DialectAdapter, Operation};
use crate::error::BuildError;
use crate::options::BuildOptions;
use crate::parameters::build_headers_validation;
use crate::preprocess::make_optional_attributes_nullable;
use crate::types::{Parameter, ParameterLocation, SpecVersion};
use crate::validator::{ResponseValidator, Validator};

#[derive(Debug, Clone, Copy, Default)]
pub struct Oas2Adapter;

impl Oas2Adapter {
    /// First of operation, path item and document declaring `key`.
    fn media_types(op: &Operation<'_>, key: &str) -> Option<Vec<String>> {
        string_list(op.operation.get(key))
            .or_else(|| string_list(op.path_item.get(key)))
            .or_else(|| string_list(op.document.get(key)))
    }
}

/// The body schema implied by an operation's parameters.
///
/// An `in: body` parameter wins. Otherwise, when form fields are expected in
/// the body, non-file `formData` parameters become an object schema.
pub fn body_schema(parameters: &[Parameter], expect_form_fields_in_body: bool) -> Option<Value> {
    if let Some(body) = parameters
        .iter()
        .find(|p| p.location == ParameterLocation::Body)
    {
        return Some(body.schema.get("schema").cloned().unwrap_or_else(|| json!({})));
    }
    if !expect_form_fields_in_body {
        return None;
    }

    let fields: Vec<&Parameter> = parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::FormData && !p.is_file())
        .collect();
    if fields.is_empty() {
        return None;
    }

    let properties: Map<String, Value> = fields
        .iter()
        .map(|p| (p.name.clone(), Value::Object(p.schema.clone())))
        .collect();
    let required: Vec<&str> = fields
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    Some(schema)
}

impl DialectAdapter for Oas2Adapter {
    fn version(&self) -> SpecVersion {
        SpecVersion::Oas2
    }

    fn build_path_parameters(
        &self,
        op: &Operation<'_>,
    ) -> Result<(Vec<Parameter>, Vec<Parameter>), BuildError> {
        Ok((
            parse_parameters(op.path_item.get("parameters"), op.endpoint, Value::clone)?,
            parse_parameters(op.operation.get("parameters"), op.endpoint, Value::clone)?,
        ))
    }

    fn build_request_body_validation(
        &self,
        op: &Operation<'_>,
        parameters: &[Parameter],
        options: &BuildOptions,
    ) -> Result<Option<Validator>, BuildError> {
        let Some(mut schema) = body_schema(parameters, options.expect_form_fields_in_body) else {
            return Ok(None);
        };
        if options.make_optional_attributes_nullable {
            make_optional_attributes_nullable(&mut schema);
        }
        compile_body(schema, op, options, "body").map(Some)
    }

    fn request_content_types(&self, op: &Operation<'_>) -> Option<Vec<String>> {
        Self::media_types(op, "consumes")
    }

    fn build_responses(
        &self,
        op: &Operation<'_>,
        options: &BuildOptions,
    ) -> Result<BTreeMap<String, ResponseValidator>, BuildError> {
        let mut responses = BTreeMap::new();
        let Some(declared) = op.operation.get("responses").and_then(Value::as_object) else {
            return Ok(responses);
        };
        let content_types = Self::media_types(op, "produces");

        for (status, response) in declared {
            if status == "default" {
                continue;
            }

            let headers = response.get("headers").and_then(Value::as_object);
            let headers = if headers.is_some() || content_types.is_some() {
                Some(build_headers_validation(
                    headers,
                    content_types.as_deref(),
                    options,
                    op.endpoint,
                )?)
            } else {
                None
            };

            let body = match response.get("schema") {
                Some(schema) if schema.get("type").and_then(Value::as_str) == Some("file") => {
                    warn!(endpoint = op.endpoint, status = %status, "skipping file response body");
                    None
                }
                Some(schema) => Some(compile_body(
                    schema.clone(),
                    op,
                    options,
                    &format!("response {} body", status),
                )?),
                None => None,
            };

            let validator = ResponseValidator { body, headers };
            if !validator.is_empty() {
                responses.insert(status.clone(), validator);
            }
        }

        Ok(responses)
    }
}
