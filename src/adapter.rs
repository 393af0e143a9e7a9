//! Dialect adapter contract shared by the Swagger 2.0 and OpenAPI 3 readers.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::BuildError;
use crate::oas2::Oas2Adapter;
use crate::oas3::Oas3Adapter;
use crate::options::BuildOptions;
use crate::types::{Parameter, SpecVersion};
use crate::validator::{ResponseValidator, Validator, ValidatorCompiler};

/// One operation of the dereferenced document.
#[derive(Debug, Clone, Copy)]
pub struct Operation<'d> {
    pub document: &'d Value,
    pub path_item: &'d Map<String, Value>,
    pub operation: &'d Map<String, Value>,
    /// Label used in build errors, e.g. `get /pets/:petId`.
    pub endpoint: &'d str,
}

/// Extraction of request and response schemas for one dialect.
pub trait DialectAdapter: Sync {
    fn version(&self) -> SpecVersion;

    /// Path-level and operation-level parameters, in that order.
    fn build_path_parameters(
        &self,
        op: &Operation<'_>,
    ) -> Result<(Vec<Parameter>, Vec<Parameter>), BuildError>;

    /// The request body validator, if the operation accepts a body.
    ///
    /// `parameters` is the merged parameter list of the operation.
    fn build_request_body_validation(
        &self,
        op: &Operation<'_>,
        parameters: &[Parameter],
        options: &BuildOptions,
    ) -> Result<Option<Validator>, BuildError>;

    /// Media types the request may declare in `content-type`.
    fn request_content_types(&self, op: &Operation<'_>) -> Option<Vec<String>>;

    /// Response validators keyed by status code.
    fn build_responses(
        &self,
        _op: &Operation<'_>,
        _options: &BuildOptions,
    ) -> Result<BTreeMap<String, ResponseValidator>, BuildError> {
        Ok(BTreeMap::new())
    }
}

static OAS2: Oas2Adapter = Oas2Adapter;
static OAS3: Oas3Adapter = Oas3Adapter;

/// Select the adapter for a detected dialect.
pub fn adapter_for(version: SpecVersion) -> &'static dyn DialectAdapter {
    match version {
        SpecVersion::Oas2 => &OAS2,
        SpecVersion::Oas3 => &OAS3,
    }
}

/// Read a list of strings such as `consumes`, ignoring non-string entries.
pub(crate) fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let list = value?.as_array()?;
    Some(
        list.iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
    )
}

/// Parse a `parameters` array.
pub(crate) fn parse_parameters<F>(
    value: Option<&Value>,
    endpoint: &str,
    normalize: F,
) -> Result<Vec<Parameter>, BuildError>
where
    F: Fn(&Value) -> Value,
{
    let Some(list) = value else {
        return Ok(Vec::new());
    };
    let list = list.as_array().ok_or_else(|| BuildError::InvalidParameter {
        endpoint: endpoint.to_string(),
        message: "`parameters` is not an array".to_string(),
    })?;
    list.iter()
        .map(|p| {
            Parameter::from_value(&normalize(p)).map_err(|message| BuildError::InvalidParameter {
                endpoint: endpoint.to_string(),
                message,
            })
        })
        .collect()
}

/// Compile a body schema with the body engine options.
pub(crate) fn compile_body(
    schema: Value,
    op: &Operation<'_>,
    options: &BuildOptions,
    target: &str,
) -> Result<Validator, BuildError> {
    ValidatorCompiler::new(&options.body_engine, &options.formats, &options.keywords)
        .with_document(op.document)
        .compile(schema)
        .map_err(|e| BuildError::compile(op.endpoint, target, e))
}
