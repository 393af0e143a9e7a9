//! OpenAPI Validators
//!
//! Compiles Swagger 2.0 and OpenAPI 3.x documents into request and response
//! validators.
//!
//! Every operation of the document becomes one entry of a [`SchemaMap`],
//! keyed by path (with `:name` placeholders) and lower-case method, holding
//! up to three kinds of validators:
//!
//! - `parameters`: one composite schema over `{headers, path, query, files}`
//! - `body`: the request body schema
//! - `responses`: body and header validators per status code (Swagger 2.0 only)
//!
//! # Example
//!
//! ```
//! use oas_validators::{build_schema_from_document, BuildOptions};
//! use serde_json::json;
//!
//! let document = json!({
//!     "swagger": "2.0",
//!     "paths": {
//!         "/pets/{petId}": {
//!             "get": {
//!                 "parameters": [{
//!                     "name": "petId", "in": "path", "required": true,
//!                     "type": "string", "minLength": 3
//!                 }],
//!                 "responses": {}
//!             }
//!         }
//!     }
//! });
//!
//! let schemas = build_schema_from_document(document, &BuildOptions::default()).unwrap();
//! let endpoint = schemas.get("/pets/:petId", "get").unwrap();
//! let parameters = endpoint.parameters.as_ref().unwrap();
//!
//! assert!(parameters.validate(&json!({ "path": { "petId": "123" } })).is_ok());
//!
//! let errors = parameters.validate(&json!({ "path": { "petId": "12" } })).unwrap_err();
//! assert_eq!(errors[0].data_path, ".path.petId");
//! assert_eq!(errors[0].message, "should NOT be shorter than 3 characters");
//! ```
//!
//! # Build Options
//!
//! | Option | Default | Effect |
//! |--------|---------|--------|
//! | `build_requests` | `true` | build parameter and body validators |
//! | `build_responses` | `true` | build response validators (Swagger 2.0) |
//! | `content_type_validation` | `false` | check `content-type` against `consumes`/`produces` |
//! | `expect_form_fields_in_body` | `false` | validate `formData` fields as a body object |
//! | `make_optional_attributes_nullable` | `false` | optional body properties accept `null` |
//! | `allow_extra_files` | `false` | accept undeclared uploaded files |

mod adapter;
mod builder;
mod coerce;
mod error;
mod guards;
mod loader;
mod oas2;
mod oas3;
mod options;
mod parameters;
mod preprocess;
mod source;
mod types;
mod validator;

pub use adapter::{adapter_for, DialectAdapter, Operation};
pub use builder::{
    build_schema, build_schema_from_document, build_validations, EndpointValidators, SchemaMap,
};
pub use error::{BuildError, CompileError, LoadError, SchemaError};
pub use guards::{ContentTypeGuard, FilePresenceGuard, GuardViolation};
pub use loader::{
    dereference, load_document, load_document_auto, load_document_str, load_specification,
    navigate_fragment, Specification,
};
pub use oas2::Oas2Adapter;
pub use oas3::Oas3Adapter;
pub use options::{
    BuildOptions, Coercion, CustomFormat, CustomKeyword, EngineOptions, FormatCheck,
    KeywordFactory,
};
pub use parameters::{build_headers_validation, headers_schema, ParameterAggregator};
pub use preprocess::{apply_nullable_keyword, make_optional_attributes_nullable};
pub use source::resolve_parameter_source;
pub use types::{Bucket, Parameter, ParameterLocation, SpecVersion};
pub use validator::{compile, PayloadShape, ResponseValidator, Validator, ValidatorCompiler};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
