//! OpenAPI Validators CLI
//!
//! Command-line interface for building validators from a specification and
//! checking payloads against them.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand};
use oas_validators::{
    build_schema, load_document, BuildOptions, EndpointValidators, SchemaError, SchemaMap,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oas-validators")]
#[command(about = "Build and run request/response validators from OpenAPI documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every endpoint and the validators built for it
    Endpoints {
        /// Specification source: file path or URL (http:// or https://)
        spec: String,

        /// Build options file (JSON or YAML)
        #[arg(long)]
        options: Option<PathBuf>,

        /// Output as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Validate a payload against one endpoint's validator
    #[command(group(
        ArgGroup::new("target")
            .required(true)
            .multiple(true)
            .args(["params", "body", "response"])
    ))]
    Validate {
        /// Specification source: file path or URL (http:// or https://)
        spec: String,

        /// Endpoint path, e.g. /pets/:petId
        #[arg(long)]
        path: String,

        /// HTTP method
        #[arg(long)]
        method: String,

        /// Parameters payload: {headers, path, query, files}
        #[arg(long, conflicts_with_all = ["body", "response"])]
        params: Option<PathBuf>,

        /// Request body, or response body with --response
        #[arg(long)]
        body: Option<PathBuf>,

        /// Validate a response with this status code
        #[arg(long)]
        response: Option<String>,

        /// Response headers payload
        #[arg(long, requires = "response")]
        headers: Option<PathBuf>,

        /// Build options file (JSON or YAML)
        #[arg(long)]
        options: Option<PathBuf>,

        /// Check content-type headers against consumes/produces
        #[arg(long)]
        content_type_validation: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Endpoints {
            spec,
            options,
            json,
        } => run_endpoints(&spec, options.as_deref(), json),

        Commands::Validate {
            spec,
            path,
            method,
            params,
            body,
            response,
            headers,
            options,
            content_type_validation,
            json,
        } => run_validate(ValidateArgs {
            spec,
            path,
            method,
            params,
            body,
            response,
            headers,
            options,
            content_type_validation,
            json_output: json,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_options(path: Option<&Path>, json_output: bool) -> Result<BuildOptions, u8> {
    let Some(path) = path else {
        return Ok(BuildOptions::default());
    };
    let document = load_document(path).map_err(|e| {
        report_error(json_output, &format!("loading options: {}", e));
        e.exit_code() as u8
    })?;
    serde_json::from_value(document).map_err(|e| {
        report_error(json_output, &format!("invalid options file: {}", e));
        2u8
    })
}

fn build(spec: &str, options: &BuildOptions, json_output: bool) -> Result<SchemaMap, u8> {
    build_schema(spec, options).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })
}

fn run_endpoints(spec: &str, options: Option<&Path>, json_output: bool) -> Result<(), u8> {
    let options = load_options(options, json_output)?;
    let schemas = build(spec, &options, json_output)?;

    if json_output {
        let endpoints: Vec<Value> = schemas
            .iter()
            .map(|(path, method, v)| {
                json!({
                    "path": path,
                    "method": method,
                    "parameters": v.parameters.is_some(),
                    "body": v.body.is_some(),
                    "responses": v.responses.keys().collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", json!({ "endpoints": endpoints }));
        return Ok(());
    }

    for (path, method, v) in schemas.iter() {
        println!("{} {}{}", method.to_uppercase(), path, describe(v));
    }
    println!("\n{} endpoints", schemas.len());
    Ok(())
}

fn describe(v: &EndpointValidators) -> String {
    let mut parts = Vec::new();
    if v.parameters.is_some() {
        parts.push("parameters".to_string());
    }
    if v.body.is_some() {
        parts.push("body".to_string());
    }
    if !v.responses.is_empty() {
        let codes: Vec<&str> = v.responses.keys().map(String::as_str).collect();
        parts.push(format!("responses[{}]", codes.join(",")));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("  ({})", parts.join(", "))
    }
}

struct ValidateArgs {
    spec: String,
    path: String,
    method: String,
    params: Option<PathBuf>,
    body: Option<PathBuf>,
    response: Option<String>,
    headers: Option<PathBuf>,
    options: Option<PathBuf>,
    content_type_validation: bool,
    json_output: bool,
}

fn run_validate(args: ValidateArgs) -> Result<(), u8> {
    let ValidateArgs {
        spec,
        path,
        method,
        params,
        body,
        response,
        headers,
        options,
        content_type_validation,
        json_output,
    } = args;

    let mut options = load_options(options.as_deref(), json_output)?;
    if content_type_validation {
        options = options.content_type_validation(true);
    }
    let schemas = build(&spec, &options, json_output)?;

    let Some(endpoint) = schemas.get(&path, &method) else {
        report_error(
            json_output,
            &format!("no endpoint {} {}", method.to_lowercase(), path),
        );
        return Err(2);
    };

    let outcome = if let Some(status) = response {
        let Some(validator) = endpoint.responses.get(&status) else {
            report_error(
                json_output,
                &format!("no response validator for status {}", status),
            );
            return Err(2);
        };
        let body = read_payload(body.as_deref(), Value::Null, json_output)?;
        let headers = read_payload(headers.as_deref(), json!({}), json_output)?;
        validator.validate(&body, &headers)
    } else if let Some(params) = params {
        let payload = read_payload(Some(params.as_path()), Value::Null, json_output)?;
        match &endpoint.parameters {
            Some(validator) => validator.validate(&payload),
            None => Ok(()),
        }
    } else {
        let payload = read_payload(body.as_deref(), Value::Null, json_output)?;
        match &endpoint.body {
            Some(validator) => validator.validate(&payload),
            None => Ok(()),
        }
    };

    report_outcome(json_output, outcome)
}

/// Read a JSON payload file, or `default` when no file was given.
fn read_payload(path: Option<&Path>, default: Value, json_output: bool) -> Result<Value, u8> {
    let Some(path) = path else {
        return Ok(default);
    };
    let content = std::fs::read_to_string(path).map_err(|e| {
        report_error(json_output, &format!("reading {}: {}", path.display(), e));
        3u8
    })?;
    serde_json::from_str(&content).map_err(|e| {
        report_error(json_output, &format!("parsing {}: {}", path.display(), e));
        2u8
    })
}

fn report_outcome(json_output: bool, outcome: Result<(), Vec<SchemaError>>) -> Result<(), u8> {
    match outcome {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(errors) => {
            if json_output {
                println!("{}", json!({ "valid": false, "errors": errors }));
            } else {
                eprintln!("Validation failed:");
                for error in &errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
