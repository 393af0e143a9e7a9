//! Error types for specification loading, validator building and validation.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors while reading, parsing or dereferencing a specification.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("document is neither valid JSON nor valid YAML: {message}")]
    InvalidDocument { message: String },

    #[error("unresolved reference {reference}")]
    UnresolvedReference { reference: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors while turning a specification into validators.
///
/// Building is all-or-nothing: any of these aborts the whole build and no
/// partial schema map is returned.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("unsupported document: expected `swagger: \"2.0\"` or `openapi: 3.x`")]
    UnsupportedVersion,

    #[error("document has no `paths` object")]
    MissingPaths,

    #[error("referenced and dereferenced documents disagree on path {path}")]
    DocumentMismatch { path: String },

    #[error("invalid path item {path}: {message}")]
    InvalidPathItem { path: String, message: String },

    #[error("endpoint {path} is declared more than once")]
    DuplicateEndpoint { path: String },

    #[error("{endpoint}: invalid parameter: {message}")]
    InvalidParameter { endpoint: String, message: String },

    #[error("{endpoint}: parameter `{key}` is declared twice in {bucket}")]
    ParameterCollision {
        endpoint: String,
        bucket: String,
        key: String,
    },

    #[error("{endpoint}: cannot compile {target} schema: {message}")]
    Compile {
        endpoint: String,
        target: String,
        message: String,
    },

    #[error("invalid custom keyword `{name}`: {message}")]
    InvalidKeyword { name: String, message: String },
}

impl BuildError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Load(e) => e.exit_code(),
            _ => 2,
        }
    }

    /// Attach the endpoint and validator target to a compilation failure.
    pub fn compile(endpoint: &str, target: &str, err: CompileError) -> Self {
        match err {
            CompileError::Schema(message) => BuildError::Compile {
                endpoint: endpoint.to_string(),
                target: target.to_string(),
                message,
            },
            CompileError::Keyword { name, message } => BuildError::InvalidKeyword { name, message },
        }
    }
}

/// Failure to compile one schema into a validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("{0}")]
    Schema(String),

    #[error("invalid custom keyword `{name}`: {message}")]
    Keyword { name: String, message: String },
}

/// Single validation error record.
///
/// Runtime validation never fails with a Rust error; it returns a non-empty
/// list of these instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaError {
    /// Keyword that failed (`required`, `type`, `content`, `files`, ...).
    pub keyword: String,
    /// Instance location in dotted form, e.g. `.headers['api-version']`.
    pub data_path: String,
    /// Schema location, e.g. `#/properties/headers/required`.
    pub schema_path: String,
    /// Keyword-specific details.
    pub params: Value,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.data_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.data_path, self.message)
        }
    }
}
