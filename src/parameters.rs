//! Composite request-parameter schema and response-headers schema.

use serde_json::{json, Map, Value};

use crate::error::BuildError;
use crate::guards::{ContentTypeGuard, FilePresenceGuard, CONTENT_TYPE_KEYWORD, FILES_KEYWORD};
use crate::options::BuildOptions;
use crate::source::resolve_parameter_source;
use crate::types::{Bucket, Parameter};
use crate::validator::{PayloadShape, Validator, ValidatorCompiler};

/// Folds an endpoint's parameters into one `{headers, path, query, files}`
/// schema and compiles it.
#[derive(Debug, Clone, Copy)]
pub struct ParameterAggregator<'a> {
    options: &'a BuildOptions,
    endpoint: &'a str,
    document: Option<&'a Value>,
}

impl<'a> ParameterAggregator<'a> {
    pub fn new(options: &'a BuildOptions, endpoint: &'a str) -> Self {
        Self {
            options,
            endpoint,
            document: None,
        }
    }

    /// Resolve recursive `$ref`s left in parameter schemas against `document`.
    pub fn with_document(mut self, document: &'a Value) -> Self {
        self.document = Some(document);
        self
    }

    /// Merge path-level and operation-level parameters.
    ///
    /// Operation parameters replace path parameters with the same bucket and
    /// key. Two parameters on the same level with the same bucket and key
    /// are a collision.
    pub fn merge(
        &self,
        path_level: Vec<Parameter>,
        operation: Vec<Parameter>,
    ) -> Result<Vec<Parameter>, BuildError> {
        let mut merged: Vec<((Bucket, String), Parameter)> = Vec::new();

        for level in [path_level, operation] {
            let mut seen: Vec<(Bucket, String)> = Vec::new();
            for parameter in level {
                let slot = (resolve_parameter_source(&parameter), parameter.key());
                if seen.contains(&slot) {
                    return Err(BuildError::ParameterCollision {
                        endpoint: self.endpoint.to_string(),
                        bucket: slot.0.to_string(),
                        key: slot.1,
                    });
                }
                seen.push(slot.clone());

                match merged.iter_mut().find(|(s, _)| *s == slot) {
                    Some(existing) => existing.1 = parameter,
                    None => merged.push((slot, parameter)),
                }
            }
        }

        Ok(merged.into_iter().map(|(_, p)| p).collect())
    }

    /// The composite schema for already-merged parameters.
    pub fn schema(&self, parameters: &[Parameter], content_types: Option<&[String]>) -> Value {
        let mut buckets = [
            (Bucket::Headers, Map::new(), Vec::new()),
            (Bucket::Path, Map::new(), Vec::new()),
            (Bucket::Query, Map::new(), Vec::new()),
        ];
        let mut files = FilePresenceGuard {
            allow_extra: self.options.allow_extra_files,
            ..FilePresenceGuard::default()
        };

        for parameter in parameters {
            let key = parameter.key();
            if parameter.is_file() {
                if parameter.required {
                    files.required.push(key);
                } else {
                    files.optional.push(key);
                }
                continue;
            }
            let bucket = resolve_parameter_source(parameter);
            if let Some((_, properties, required)) =
                buckets.iter_mut().find(|(b, _, _)| *b == bucket)
            {
                if parameter.required {
                    required.push(key.clone());
                }
                properties.insert(key, Value::Object(parameter.schema.clone()));
            }
        }

        let mut properties = Map::new();
        for (bucket, props, required) in buckets {
            let (title, open) = match bucket {
                Bucket::Headers => ("HTTP headers", true),
                Bucket::Path => ("HTTP path", false),
                _ => ("HTTP query", false),
            };
            let mut schema = json!({
                "title": title,
                "type": "object",
                "properties": props,
                "additionalProperties": open,
            });
            if !required.is_empty() {
                schema["required"] = json!(required);
            }
            properties.insert(bucket.as_str().to_string(), schema);
        }

        if let Some(guard) =
            ContentTypeGuard::create(self.options.content_type_validation, content_types)
        {
            properties["headers"][CONTENT_TYPE_KEYWORD] = guard.payload();
        }
        properties.insert(
            "files".to_string(),
            json!({ "title": "HTTP form files", FILES_KEYWORD: files.payload() }),
        );

        json!({
            "title": "HTTP parameters",
            "type": "object",
            "additionalProperties": false,
            "properties": properties,
        })
    }

    /// Merge, build and compile the parameters validator.
    pub fn aggregate(
        &self,
        path_level: Vec<Parameter>,
        operation: Vec<Parameter>,
        content_types: Option<&[String]>,
    ) -> Result<Option<Validator>, BuildError> {
        let parameters = self.merge(path_level, operation)?;
        self.build(&parameters, content_types)
    }

    /// Compile the parameters validator for already-merged parameters.
    ///
    /// Returns `None` when the endpoint declares no parameters and
    /// content-type validation is off.
    pub fn build(
        &self,
        parameters: &[Parameter],
        content_types: Option<&[String]>,
    ) -> Result<Option<Validator>, BuildError> {
        if parameters.is_empty() && !self.options.content_type_validation {
            return Ok(None);
        }

        let schema = self.schema(parameters, content_types);
        let mut compiler = ValidatorCompiler::new(
            &self.options.params_engine,
            &self.options.formats,
            &self.options.keywords,
        )
        .with_guards()
        .with_shape(PayloadShape::Parameters);
        if let Some(document) = self.document {
            compiler = compiler.with_document(document);
        }
        compiler
            .compile(schema)
            .map(Some)
            .map_err(|e| BuildError::compile(self.endpoint, "parameters", e))
    }
}

/// Schema of a response's header object.
///
/// Header names are lower-cased; `name` and `required` are dropped from the
/// header descriptors.
pub fn headers_schema(
    headers: Option<&Map<String, Value>>,
    content_types: Option<&[String]>,
    options: &BuildOptions,
) -> Value {
    let properties: Map<String, Value> = headers
        .into_iter()
        .flatten()
        .map(|(name, header)| {
            let mut header = header.clone();
            if let Value::Object(descriptor) = &mut header {
                descriptor.remove("name");
                descriptor.remove("required");
            }
            (name.to_lowercase(), header)
        })
        .collect();

    let mut schema = json!({
        "title": "HTTP headers",
        "type": "object",
        "properties": properties,
        "additionalProperties": true,
    });
    if let Some(guard) = ContentTypeGuard::create(options.content_type_validation, content_types) {
        schema[CONTENT_TYPE_KEYWORD] = guard.payload();
    }
    schema
}

/// Compile a response headers validator.
pub fn build_headers_validation(
    headers: Option<&Map<String, Value>>,
    content_types: Option<&[String]>,
    options: &BuildOptions,
    endpoint: &str,
) -> Result<Validator, BuildError> {
    ValidatorCompiler::new(&options.params_engine, &options.formats, &options.keywords)
        .with_guards()
        .with_shape(PayloadShape::Headers)
        .compile(headers_schema(headers, content_types, options))
        .map_err(|e| BuildError::compile(endpoint, "response headers", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(value: Value) -> Parameter {
        Parameter::from_value(&value).unwrap()
    }

    fn pet_parameters() -> Vec<Parameter> {
        vec![
            param(json!({
                "name": "api-version", "in": "header", "required": true,
                "type": "string", "pattern": "^\\d{1,3}\\.\\d{1,3}$"
            })),
            param(json!({
                "name": "Request-Id", "in": "header", "required": false,
                "type": "string", "minLength": 1
            })),
            param(json!({ "name": "page", "in": "query", "type": "number" })),
        ]
    }

    #[test]
    fn composite_schema_shape() {
        let options = BuildOptions::default();
        let aggregator = ParameterAggregator::new(&options, "get /pets");
        let schema = aggregator.schema(&pet_parameters(), None);

        assert_eq!(schema["title"], "HTTP parameters");
        assert_eq!(schema["additionalProperties"], false);
        let headers = &schema["properties"]["headers"];
        assert_eq!(headers["additionalProperties"], true);
        assert_eq!(headers["required"], json!(["api-version"]));
        assert!(headers["properties"]["request-id"].is_object());
        assert!(headers["properties"]["request-id"].get("in").is_none());
        assert!(headers.get(CONTENT_TYPE_KEYWORD).is_none());

        let path = &schema["properties"]["path"];
        assert_eq!(path["additionalProperties"], false);
        assert!(path.get("required").is_none());

        assert_eq!(schema["properties"]["query"]["properties"]["page"]["type"], "number");
        assert_eq!(
            schema["properties"]["files"][FILES_KEYWORD],
            json!({ "required": [], "optional": [] })
        );
    }

    #[test]
    fn file_parameters_only_populate_presence_lists() {
        let options = BuildOptions::default();
        let aggregator = ParameterAggregator::new(&options, "post /pets/import");
        let parameters = vec![
            param(json!({ "name": "sourceFile", "in": "formData", "type": "file", "required": true })),
            param(json!({ "name": "optionalFile", "in": "formData", "type": "file" })),
            param(json!({ "name": "comment", "in": "formData", "type": "string" })),
        ];
        let schema = aggregator.schema(&parameters, None);

        assert_eq!(
            schema["properties"]["files"][FILES_KEYWORD],
            json!({ "required": ["sourceFile"], "optional": ["optionalFile"] })
        );
        for bucket in ["headers", "path", "query"] {
            assert_eq!(schema["properties"][bucket]["properties"], json!({}));
        }
    }

    #[test]
    fn content_type_guard_attached_when_enabled() {
        let options = BuildOptions::default().content_type_validation(true);
        let aggregator = ParameterAggregator::new(&options, "post /pets");
        let types = vec!["application/json".to_string()];
        let schema = aggregator.schema(&[], Some(&types));
        assert_eq!(
            schema["properties"]["headers"][CONTENT_TYPE_KEYWORD],
            json!({ "types": ["application/json"] })
        );
    }

    #[test]
    fn operation_parameters_override_path_parameters() {
        let options = BuildOptions::default();
        let aggregator = ParameterAggregator::new(&options, "get /pets/:petId");
        let path_level = vec![param(json!({
            "name": "petId", "in": "path", "required": true, "type": "string"
        }))];
        let operation = vec![param(json!({
            "name": "petId", "in": "path", "required": true,
            "type": "string", "minLength": 3
        }))];

        let merged = aggregator.merge(path_level, operation).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].schema["minLength"], 3);
    }

    #[test]
    fn same_name_in_different_buckets_coexists() {
        let options = BuildOptions::default();
        let aggregator = ParameterAggregator::new(&options, "get /pets");
        let merged = aggregator
            .merge(
                vec![],
                vec![
                    param(json!({ "name": "id", "in": "query", "type": "string" })),
                    param(json!({ "name": "id", "in": "header", "type": "string" })),
                ],
            )
            .unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn same_level_duplicates_collide() {
        let options = BuildOptions::default();
        let aggregator = ParameterAggregator::new(&options, "get /pets");
        let err = aggregator
            .merge(
                vec![],
                vec![
                    param(json!({ "name": "X-Trace", "in": "header", "type": "string" })),
                    param(json!({ "name": "x-trace", "in": "header", "type": "integer" })),
                ],
            )
            .unwrap_err();
        match err {
            BuildError::ParameterCollision {
                endpoint,
                bucket,
                key,
            } => {
                assert_eq!(endpoint, "get /pets");
                assert_eq!(bucket, "headers");
                assert_eq!(key, "x-trace");
            }
            other => panic!("expected collision, got {:?}", other),
        }
    }

    #[test]
    fn no_validator_without_parameters() {
        let options = BuildOptions::default();
        let aggregator = ParameterAggregator::new(&options, "get /health");
        assert!(aggregator.aggregate(vec![], vec![], None).unwrap().is_none());

        let options = BuildOptions::default().content_type_validation(true);
        let aggregator = ParameterAggregator::new(&options, "get /health");
        assert!(aggregator.aggregate(vec![], vec![], None).unwrap().is_some());
    }

    #[test]
    fn compiled_validator_checks_headers_and_query() {
        let options = BuildOptions::default();
        let aggregator = ParameterAggregator::new(&options, "get /pets");
        let validator = aggregator
            .aggregate(vec![], pet_parameters(), None)
            .unwrap()
            .unwrap();

        let ok = json!({
            "headers": { "Api-Version": "1.0" },
            "query": { "page": "0" }
        });
        assert!(validator.validate(&ok).is_ok());

        let errors = validator
            .validate(&json!({ "headers": { "request-id": "" }, "query": { "page": 0 } }))
            .unwrap_err();
        assert_eq!(errors.len(), 2);
        let missing = errors.iter().find(|e| e.keyword == "required").unwrap();
        assert_eq!(missing.data_path, ".headers");
        assert_eq!(missing.params["missingProperty"], "api-version");
        let short = errors.iter().find(|e| e.keyword == "minLength").unwrap();
        assert_eq!(short.data_path, ".headers['request-id']");

        let errors = validator
            .validate(&json!({ "headers": { "api-version": "1.0" }, "query": { "size": 1 } }))
            .unwrap_err();
        assert_eq!(errors[0].keyword, "additionalProperties");
        assert_eq!(errors[0].params["additionalProperty"], "size");
    }

    #[test]
    fn response_headers_schema_lowercases_and_strips() {
        let headers: Map<String, Value> = serde_json::from_value(json!({
            "X-Rate-Limit": { "type": "integer", "required": true, "name": "x" }
        }))
        .unwrap();
        let options = BuildOptions::default();
        let schema = headers_schema(Some(&headers), None, &options);
        assert_eq!(
            schema["properties"]["x-rate-limit"],
            json!({ "type": "integer" })
        );
        assert!(schema.get(CONTENT_TYPE_KEYWORD).is_none());

        let validator =
            build_headers_validation(Some(&headers), None, &options, "get /pets").unwrap();
        assert!(validator.validate(&json!({ "X-RATE-LIMIT": "5" })).is_ok());
        assert!(validator.validate(&json!({ "x-rate-limit": "many" })).is_err());
    }
}
