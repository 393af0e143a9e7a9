//! Compiled validators and error normalization.
//!
//! Every schema gets its own `jsonschema` engine instance, so formats and
//! keywords registered for one endpoint never leak into another. Engine
//! errors are rewritten into [`SchemaError`] records with a dotted
//! `data_path`, a `#`-prefixed `schema_path` and keyword-specific params.

use std::fmt::Write as _;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, ValidationError};
use serde_json::{json, Map, Value};

use crate::coerce;
use crate::error::{CompileError, SchemaError};
use crate::guards::{self, Guard, CONTENT_TYPE_KEYWORD, FILES_KEYWORD};
use crate::options::{CustomFormat, CustomKeyword, EngineOptions};

/// Shape of the values a validator is called with.
///
/// Controls the normalization applied before evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadShape {
    /// Validated as given.
    #[default]
    Plain,
    /// `{headers, path, query, files}`: header names are lower-cased and
    /// missing buckets filled with empty containers.
    Parameters,
    /// A header object: names are lower-cased.
    Headers,
}

/// Compile `schema` with the given engine options and registrations.
///
/// Shorthand for a [`ValidatorCompiler`] without guard keywords.
pub fn compile(
    schema: Value,
    engine: &EngineOptions,
    formats: &[CustomFormat],
    keywords: &[CustomKeyword],
) -> Result<Validator, CompileError> {
    ValidatorCompiler::new(engine, formats, keywords).compile(schema)
}

/// Turns schemas into [`Validator`]s, one engine instance per schema.
#[derive(Debug, Clone)]
pub struct ValidatorCompiler<'a> {
    engine: &'a EngineOptions,
    formats: &'a [CustomFormat],
    keywords: &'a [CustomKeyword],
    guards: bool,
    shape: PayloadShape,
    document: Option<&'a Value>,
}

impl<'a> ValidatorCompiler<'a> {
    pub fn new(
        engine: &'a EngineOptions,
        formats: &'a [CustomFormat],
        keywords: &'a [CustomKeyword],
    ) -> Self {
        Self {
            engine,
            formats,
            keywords,
            guards: false,
            shape: PayloadShape::Plain,
            document: None,
        }
    }

    /// Register the `content` and `files` guard keywords.
    pub fn with_guards(mut self) -> Self {
        self.guards = true;
        self
    }

    pub fn with_shape(mut self, shape: PayloadShape) -> Self {
        self.shape = shape;
        self
    }

    /// Document that local `$ref`s left in the schema point into.
    pub fn with_document(mut self, document: &'a Value) -> Self {
        self.document = Some(document);
        self
    }

    pub fn compile(&self, mut schema: Value) -> Result<Validator, CompileError> {
        for keyword in self.keywords {
            check_keyword_occurrences(&schema, keyword)?;
        }
        if let Some(document) = self.document {
            attach_ref_targets(&mut schema, document);
        }

        let mut opts = jsonschema::options();
        opts.with_draft(Draft::Draft4);
        // generated documents carry constructs such as `required: []`
        opts.should_validate_schema(false);
        opts.should_validate_formats(self.engine.validate_formats);

        for format in self.formats {
            let check = format.check.clone();
            opts.with_format(format.name.clone(), move |value: &str| check.check(value));
        }
        for keyword in self.keywords {
            let factory = Arc::clone(&keyword.factory);
            opts.with_keyword(keyword.name.clone(), move |parent, value, path| {
                factory(parent, value, path)
            });
        }
        if self.guards {
            opts.with_keyword(CONTENT_TYPE_KEYWORD, guards::content_type_keyword);
            opts.with_keyword(FILES_KEYWORD, guards::files_keyword);
        }

        let engine = opts
            .build(&schema)
            .map_err(|e| CompileError::Schema(e.to_string()))?;

        Ok(Validator {
            inner: Arc::new(Compiled {
                engine,
                schema,
                options: self.engine.clone(),
                guards: self.guards,
                shape: self.shape,
            }),
        })
    }
}

/// Copy the top-level document sections that remaining `$ref`s point into
/// (`definitions`, `components`, ...) onto the schema root.
fn attach_ref_targets(schema: &mut Value, document: &Value) {
    let mut sections = Vec::new();
    collect_ref_sections(schema, &mut sections);
    let Value::Object(root) = schema else {
        return;
    };
    while let Some(section) = sections.pop() {
        if root.contains_key(&section) {
            continue;
        }
        let Some(target) = document.get(&section) else {
            continue;
        };
        collect_ref_sections(target, &mut sections);
        root.insert(section, target.clone());
    }
}

fn collect_ref_sections(value: &Value, sections: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            let section = obj
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix("#/"))
                .and_then(|pointer| pointer.split('/').next())
                .map(|s| s.replace("~1", "/").replace("~0", "~"));
            if let Some(section) = section {
                if !sections.contains(&section) {
                    sections.push(section);
                }
            }
            for child in obj.values() {
                collect_ref_sections(child, sections);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_ref_sections(item, sections);
            }
        }
        _ => {}
    }
}

/// Validate every occurrence of a custom keyword against its meta-schema.
fn check_keyword_occurrences(schema: &Value, keyword: &CustomKeyword) -> Result<(), CompileError> {
    let Some(meta_schema) = &keyword.meta_schema else {
        return Ok(());
    };
    let meta = jsonschema::validator_for(meta_schema).map_err(|e| CompileError::Keyword {
        name: keyword.name.clone(),
        message: format!("invalid meta-schema: {}", e),
    })?;

    let mut occurrences = Vec::new();
    collect_keyword(schema, &keyword.name, &mut occurrences);
    for value in occurrences {
        if let Some(err) = meta.iter_errors(value).next() {
            return Err(CompileError::Keyword {
                name: keyword.name.clone(),
                message: err.to_string(),
            });
        }
    }
    Ok(())
}

/// Find the values of `name` used as a keyword anywhere in `schema`.
///
/// Only follows subschema positions, so a property that happens to be
/// called `name` is not mistaken for the keyword.
fn collect_keyword<'s>(schema: &'s Value, name: &str, out: &mut Vec<&'s Value>) {
    let Value::Object(map) = schema else {
        return;
    };
    if let Some(value) = map.get(name) {
        out.push(value);
    }
    for (key, child) in map {
        match (key.as_str(), child) {
            ("properties" | "patternProperties" | "definitions" | "dependencies", Value::Object(m)) => {
                for sub in m.values() {
                    collect_keyword(sub, name, out);
                }
            }
            ("items" | "allOf" | "anyOf" | "oneOf", Value::Array(branches)) => {
                for sub in branches {
                    collect_keyword(sub, name, out);
                }
            }
            ("items" | "additionalProperties" | "additionalItems" | "not", sub) => {
                collect_keyword(sub, name, out);
            }
            _ => {}
        }
    }
}

struct Compiled {
    engine: jsonschema::Validator,
    schema: Value,
    options: EngineOptions,
    guards: bool,
    shape: PayloadShape,
}

/// An immutable compiled check bound to one schema.
///
/// Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct Validator {
    inner: Arc<Compiled>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("schema", &self.inner.schema)
            .field("options", &self.inner.options)
            .field("shape", &self.inner.shape)
            .finish_non_exhaustive()
    }
}

impl Validator {
    /// The schema this validator was compiled from.
    pub fn schema(&self) -> &Value {
        &self.inner.schema
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    /// Validate a copy of `value`.
    ///
    /// # Errors
    ///
    /// Returns the non-empty list of validation errors.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<SchemaError>> {
        let mut candidate = value.clone();
        self.validate_mut(&mut candidate)
    }

    /// Validate `value`, leaving the normalized and coerced value in place.
    pub fn validate_mut(&self, value: &mut Value) -> Result<(), Vec<SchemaError>> {
        let inner = &*self.inner;
        normalize_payload(value, inner.shape);
        coerce::prepare(value, &inner.schema, &inner.options);

        let root: &Value = value;
        let mut errors = Vec::new();
        if inner.options.all_errors {
            for error in inner.engine.iter_errors(root) {
                normalize_error(&error, &inner.schema, root, inner.guards, &mut errors);
            }
        } else if let Some(error) = inner.engine.iter_errors(root).next() {
            normalize_error(&error, &inner.schema, root, inner.guards, &mut errors);
        }

        if errors.is_empty() {
            return Ok(());
        }
        type_errors_first(&mut errors);
        if !inner.options.all_errors {
            errors.truncate(1);
        }
        Err(errors)
    }
}

/// Body and headers validators of one response status code.
#[derive(Debug, Clone, Default)]
pub struct ResponseValidator {
    pub body: Option<Validator>,
    pub headers: Option<Validator>,
}

impl ResponseValidator {
    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.headers.is_none()
    }

    /// Run both validators; body errors come before header errors.
    pub fn validate(&self, body: &Value, headers: &Value) -> Result<(), Vec<SchemaError>> {
        let mut errors = Vec::new();
        if let Some(Err(mut e)) = self.body.as_ref().map(|v| v.validate(body)) {
            errors.append(&mut e);
        }
        if let Some(Err(mut e)) = self.headers.as_ref().map(|v| v.validate(headers)) {
            errors.append(&mut e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn lowercase_keys(map: &mut Map<String, Value>) {
    if map.keys().all(|k| !k.chars().any(|c| c.is_ascii_uppercase())) {
        return;
    }
    *map = std::mem::take(map)
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect();
}

fn normalize_payload(value: &mut Value, shape: PayloadShape) {
    let Value::Object(map) = value else {
        return;
    };
    match shape {
        PayloadShape::Plain => {}
        PayloadShape::Headers => lowercase_keys(map),
        PayloadShape::Parameters => {
            for bucket in ["headers", "path", "query"] {
                map.entry(bucket).or_insert_with(|| Value::Object(Map::new()));
            }
            map.entry("files").or_insert_with(|| Value::Array(Vec::new()));
            if let Some(Value::Object(headers)) = map.get_mut("headers") {
                lowercase_keys(headers);
            }
        }
    }
}

/// Within each run of errors at the same location, report `type` first.
fn type_errors_first(errors: &mut [SchemaError]) {
    for run in errors.chunk_by_mut(|a, b| a.data_path == b.data_path) {
        run.sort_by_key(|e| e.keyword != "type");
    }
}

fn normalize_error(
    error: &ValidationError<'_>,
    schema: &Value,
    root: &Value,
    guards: bool,
    out: &mut Vec<SchemaError>,
) {
    let pointer = error.schema_path.to_string();
    let keyword = pointer.rsplit('/').next().unwrap_or_default().to_string();
    let schema_path = format!("#{}", pointer);
    let data_path = data_path(root, &error.instance_path.to_string());
    let keyword_value = schema_at(schema, &pointer).unwrap_or(&Value::Null);
    let parent = pointer
        .rsplit_once('/')
        .and_then(|(parent, _)| schema_at(schema, parent))
        .unwrap_or(&Value::Null);

    let record = |params: Value, message: String| SchemaError {
        keyword: keyword.clone(),
        data_path: data_path.clone(),
        schema_path: schema_path.clone(),
        params,
        message,
    };

    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let name = property.as_str().map_or_else(|| property.to_string(), String::from);
            out.push(record(
                json!({ "missingProperty": name }),
                format!("should have required property '{}'", name),
            ));
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            for name in unexpected {
                out.push(record(
                    json!({ "additionalProperty": name }),
                    "should NOT have additional properties".to_string(),
                ));
            }
        }
        ValidationErrorKind::Custom { message } => {
            let violation = guards
                .then(|| Guard::from_keyword(&keyword, keyword_value))
                .flatten()
                .and_then(|guard| guard.check(&error.instance).err());
            match violation {
                Some(v) => out.push(record(v.params, v.message)),
                None => out.push(record(json!({ "keyword": keyword }), message.clone())),
            }
        }
        _ => {
            let (params, message) = describe(&keyword, keyword_value, parent)
                .unwrap_or_else(|| (json!({ "keyword": keyword }), error.to_string()));
            out.push(record(params, message));
        }
    }
}

/// Follow a schema location, resolving `$ref` segments against the root.
fn schema_at<'s>(schema: &'s Value, pointer: &str) -> Option<&'s Value> {
    let mut current = schema;
    for segment in pointer.split('/').skip(1) {
        current = if segment == "$ref" {
            let target = current.get("$ref")?.as_str()?.strip_prefix('#')?;
            schema.pointer(target)?
        } else {
            let key = segment.replace("~1", "/").replace("~0", "~");
            match current {
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                other => other.get(key.as_str())?,
            }
        };
    }
    Some(current)
}

/// Params and message for a standard keyword failure.
fn describe(keyword: &str, value: &Value, parent: &Value) -> Option<(Value, String)> {
    let described = match keyword {
        "type" => {
            let types = match value {
                Value::Array(list) => list
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
                other => other.as_str()?.to_string(),
            };
            let message = format!("should be {}", types);
            (json!({ "type": types }), message)
        }
        "enum" => (
            json!({ "allowedValues": value }),
            "should be equal to one of the allowed values".to_string(),
        ),
        "pattern" => {
            let pattern = value.as_str()?;
            (
                json!({ "pattern": pattern }),
                format!("should match pattern \"{}\"", pattern),
            )
        }
        "format" => {
            let format = value.as_str()?;
            (
                json!({ "format": format }),
                format!("should match format \"{}\"", format),
            )
        }
        "minLength" | "maxLength" | "minItems" | "maxItems" | "minProperties"
        | "maxProperties" => {
            let limit = value.as_u64()?;
            let (bound, noun) = match keyword {
                "minLength" => ("shorter", "characters"),
                "maxLength" => ("longer", "characters"),
                "minItems" => ("fewer", "items"),
                "maxItems" => ("more", "items"),
                "minProperties" => ("fewer", "properties"),
                _ => ("more", "properties"),
            };
            let verb = if keyword.ends_with("Length") { "be" } else { "have" };
            (
                json!({ "limit": limit }),
                format!("should NOT {} {} than {} {}", verb, bound, limit, noun),
            )
        }
        "minimum" | "maximum" | "exclusiveMinimum" | "exclusiveMaximum" => {
            let upper = keyword.contains("aximum");
            let (base, flag) = if upper {
                ("maximum", "exclusiveMaximum")
            } else {
                ("minimum", "exclusiveMinimum")
            };
            let (limit, exclusive) = match value {
                Value::Number(_) if keyword.starts_with("exclusive") => (value.clone(), true),
                Value::Number(_) => (
                    value.clone(),
                    parent.get(flag).and_then(Value::as_bool) == Some(true),
                ),
                _ => (parent.get(base)?.clone(), true),
            };
            let comparison = match (upper, exclusive) {
                (true, false) => "<=",
                (true, true) => "<",
                (false, false) => ">=",
                (false, true) => ">",
            };
            (
                json!({ "comparison": comparison, "limit": limit, "exclusive": exclusive }),
                format!("should be {} {}", comparison, limit),
            )
        }
        "multipleOf" => (
            json!({ "multipleOf": value }),
            format!("should be multiple of {}", value),
        ),
        "uniqueItems" => (
            json!({}),
            "should NOT have duplicate items".to_string(),
        ),
        "const" => (
            json!({ "allowedValue": value }),
            "should be equal to constant".to_string(),
        ),
        "not" => (json!({}), "should NOT be valid".to_string()),
        "anyOf" => (json!({}), "should match some schema in anyOf".to_string()),
        "oneOf" => (json!({}), "should match exactly one schema in oneOf".to_string()),
        _ => return None,
    };
    Some(described)
}

/// Render a JSON-pointer instance location in dotted form.
///
/// `/0/test/field1` becomes `[0].test.field1` when the root is an array,
/// `/headers/api-version` becomes `.headers['api-version']`.
fn data_path(root: &Value, pointer: &str) -> String {
    let mut out = String::new();
    let mut cursor = Some(root);
    for raw in pointer.split('/').skip(1) {
        let segment = raw.replace("~1", "/").replace("~0", "~");
        let index = match cursor {
            Some(Value::Array(_)) => segment.parse::<usize>().ok(),
            _ => None,
        };
        if let Some(i) = index {
            let _ = write!(out, "[{}]", i);
        } else if is_identifier(&segment) {
            out.push('.');
            out.push_str(&segment);
        } else {
            let _ = write!(out, "['{}']", segment.replace('\'', "\\'"));
        }
        cursor = cursor.and_then(|c| match (c, index) {
            (Value::Array(items), Some(i)) => items.get(i),
            (Value::Object(map), _) => map.get(&segment),
            _ => None,
        });
    }
    out
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
