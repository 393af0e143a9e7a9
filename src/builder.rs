//! Walks a specification and assembles the schema map.
//!
//! Each endpoint is built independently from the dereferenced document and
//! only collected into the map once every endpoint has succeeded.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::adapter::{adapter_for, DialectAdapter, Operation};
use crate::error::BuildError;
use crate::loader::{load_specification, Specification};
use crate::options::BuildOptions;
use crate::parameters::ParameterAggregator;
use crate::types::{SpecVersion, HTTP_METHODS};
use crate::validator::{ResponseValidator, Validator};

/// Validators of one endpoint.
#[derive(Debug, Clone, Default)]
pub struct EndpointValidators {
    pub parameters: Option<Validator>,
    pub body: Option<Validator>,
    /// Keyed by status code.
    pub responses: BTreeMap<String, ResponseValidator>,
}

/// Validators for every endpoint of a specification: path, then method.
///
/// Paths use the `:name` placeholder convention and methods are lower-case.
#[derive(Debug, Clone, Default)]
pub struct SchemaMap {
    paths: BTreeMap<String, BTreeMap<String, EndpointValidators>>,
}

impl SchemaMap {
    /// Validators for one endpoint. The method is matched case-insensitively.
    pub fn get(&self, path: &str, method: &str) -> Option<&EndpointValidators> {
        self.paths.get(path)?.get(&method.to_ascii_lowercase())
    }

    /// All methods of one path.
    pub fn path(&self, path: &str) -> Option<&BTreeMap<String, EndpointValidators>> {
        self.paths.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    /// Every endpoint as `(path, method, validators)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &EndpointValidators)> {
        self.paths.iter().flat_map(|(path, methods)| {
            methods
                .iter()
                .map(move |(method, v)| (path.as_str(), method.as_str(), v))
        })
    }

    /// Number of endpoints.
    pub fn len(&self) -> usize {
        self.paths.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Load a specification from a file path or URL and build its validators.
///
/// # Errors
///
/// Fails when the document cannot be loaded or dereferenced, or when any
/// endpoint cannot be built. No partial map is returned.
pub fn build_schema(source: &str, options: &BuildOptions) -> Result<SchemaMap, BuildError> {
    let spec = load_specification(source)?;
    build_validations(&spec.referenced, &spec.dereferenced, options)
}

/// As [`build_schema`], for a document already in memory.
pub fn build_schema_from_document(
    document: Value,
    options: &BuildOptions,
) -> Result<SchemaMap, BuildError> {
    let spec = Specification::from_document(document)?;
    build_validations(&spec.referenced, &spec.dereferenced, options)
}

/// Build validators from an already loaded document pair.
pub fn build_validations(
    referenced: &Value,
    dereferenced: &Value,
    options: &BuildOptions,
) -> Result<SchemaMap, BuildError> {
    let version = SpecVersion::detect(dereferenced).ok_or(BuildError::UnsupportedVersion)?;
    let paths = dereferenced
        .get("paths")
        .and_then(Value::as_object)
        .ok_or(BuildError::MissingPaths)?;
    check_same_shape(paths, referenced.get("paths").and_then(Value::as_object))?;

    let adapter = adapter_for(version);
    if options.build_responses && version == SpecVersion::Oas3 {
        warn!("response validators are only built for swagger 2.0 documents");
    }
    let base_path = match version {
        SpecVersion::Oas2 => dereferenced.get("basePath").and_then(Value::as_str),
        SpecVersion::Oas3 => None,
    };

    let built = paths
        .iter()
        .map(|(template, item)| {
            let http_path = http_path(base_path, template);
            build_path(adapter, dereferenced, &http_path, item, options)
                .map(|methods| (http_path, methods))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut map = SchemaMap::default();
    for (path, methods) in built {
        if map.paths.contains_key(&path) {
            return Err(BuildError::DuplicateEndpoint { path });
        }
        map.paths.insert(path, methods);
    }

    info!(
        dialect = version.as_str(),
        endpoints = map.len(),
        "built schema map"
    );
    Ok(map)
}

fn build_path(
    adapter: &dyn DialectAdapter,
    document: &Value,
    http_path: &str,
    item: &Value,
    options: &BuildOptions,
) -> Result<BTreeMap<String, EndpointValidators>, BuildError> {
    let mut methods = BTreeMap::new();
    let Some(path_item) = item.as_object() else {
        return Err(BuildError::InvalidPathItem {
            path: http_path.to_string(),
            message: "path item is not an object".to_string(),
        });
    };

    for (key, operation) in path_item {
        let method = key.to_ascii_lowercase();
        if !HTTP_METHODS.contains(&method.as_str()) {
            continue;
        }
        let Some(operation) = operation.as_object() else {
            return Err(BuildError::InvalidPathItem {
                path: http_path.to_string(),
                message: format!("`{}` operation is not an object", method),
            });
        };

        let endpoint = format!("{} {}", method, http_path);
        let op = Operation {
            document,
            path_item,
            operation,
            endpoint: &endpoint,
        };
        let validators = build_endpoint(adapter, &op, options)?;
        debug!(
            endpoint = %endpoint,
            parameters = validators.parameters.is_some(),
            body = validators.body.is_some(),
            responses = validators.responses.len(),
            "built endpoint validators"
        );

        if methods.insert(method, validators).is_some() {
            return Err(BuildError::DuplicateEndpoint { path: endpoint });
        }
    }
    Ok(methods)
}

fn build_endpoint(
    adapter: &dyn DialectAdapter,
    op: &Operation<'_>,
    options: &BuildOptions,
) -> Result<EndpointValidators, BuildError> {
    let mut validators = EndpointValidators::default();

    if options.build_requests {
        let aggregator = ParameterAggregator::new(options, op.endpoint).with_document(op.document);
        let (path_level, operation_level) = adapter.build_path_parameters(op)?;
        let parameters = aggregator.merge(path_level, operation_level)?;

        validators.body = adapter.build_request_body_validation(op, &parameters, options)?;
        let content_types = adapter.request_content_types(op);
        validators.parameters = aggregator.build(&parameters, content_types.as_deref())?;
    }

    if options.build_responses {
        validators.responses = adapter.build_responses(op, options)?;
    }

    Ok(validators)
}

/// `/pets/{petId}` under base path `/v1` becomes `/v1/pets/:petId`.
fn http_path(base_path: Option<&str>, template: &str) -> String {
    let path = template.replace('{', ":").replace('}', "");
    match base_path {
        Some(base) if !base.is_empty() && base != "/" => {
            format!("{}{}", base.trim_end_matches('/'), path)
        }
        _ => path,
    }
}

/// The referenced document must declare the same paths and methods.
fn check_same_shape(
    dereferenced: &Map<String, Value>,
    referenced: Option<&Map<String, Value>>,
) -> Result<(), BuildError> {
    let Some(referenced) = referenced else {
        let path = dereferenced.keys().next().cloned().unwrap_or_default();
        return Err(BuildError::DocumentMismatch { path });
    };

    let methods = |item: &Value| -> Vec<String> {
        let mut keys: Vec<String> = item
            .as_object()
            .map(|m| {
                m.keys()
                    .map(|k| k.to_ascii_lowercase())
                    .filter(|k| HTTP_METHODS.contains(&k.as_str()))
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    };

    for (path, item) in dereferenced {
        match referenced.get(path) {
            // a `$ref`'d path item only has its methods after dereferencing
            Some(other) if other.get("$ref").is_some() => {}
            Some(other) if methods(item) == methods(other) => {}
            _ => return Err(BuildError::DocumentMismatch { path: path.clone() }),
        }
    }
    if let Some(extra) = referenced.keys().find(|k| !dereferenced.contains_key(*k)) {
        return Err(BuildError::DocumentMismatch {
            path: extra.clone(),
        });
    }
    Ok(())
}
