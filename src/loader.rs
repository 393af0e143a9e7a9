//! Specification loading from files, strings and HTTP URLs.
//!
//! Produces the `(dereferenced, referenced)` document pair the builder works
//! on. Documents may be JSON or YAML; internal `#/...` references are inlined
//! in the dereferenced copy and left untouched in the referenced one.

use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::error::LoadError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A specification in both shapes.
///
/// Both trees have the same `paths` keys; `dereferenced` has every internal
/// `$ref` inlined, `referenced` keeps the pointers.
#[derive(Debug, Clone, PartialEq)]
pub struct Specification {
    pub dereferenced: Value,
    pub referenced: Value,
}

impl Specification {
    /// Build the pair from an already parsed document.
    pub fn from_document(document: Value) -> Result<Self, LoadError> {
        let dereferenced = dereference(&document)?;
        Ok(Self {
            dereferenced,
            referenced: document,
        })
    }
}

/// Load a specification from a file path or URL.
///
/// The referenced and dereferenced copies are produced on two scoped threads;
/// the call returns once both finish and fails if either does.
pub fn load_specification(source: &str) -> Result<Specification, LoadError> {
    std::thread::scope(|scope| {
        let dereferenced = scope.spawn(|| load_document_auto(source).and_then(|d| dereference(&d)));
        let referenced = scope.spawn(|| load_document_auto(source));

        let dereferenced = dereferenced
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        let referenced = referenced
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));

        Ok(Specification {
            dereferenced: dereferenced?,
            referenced: referenced?,
        })
    })
}

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidDocument` if it is neither JSON nor YAML.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Parse a document from a JSON or YAML string.
///
/// JSON is tried first since it is also valid YAML but parses faster.
pub fn load_document_str(content: &str) -> Result<Value, LoadError> {
    if let Ok(value) = serde_json::from_str(content) {
        return Ok(value);
    }

    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| LoadError::InvalidDocument {
            message: e.to_string(),
        })?;

    // A bare scalar is valid YAML but never a specification.
    if !matches!(yaml, serde_yaml::Value::Mapping(_)) {
        return Err(LoadError::InvalidDocument {
            message: "top level must be a mapping".to_string(),
        });
    }

    Ok(yaml_to_json(yaml))
}

/// Convert YAML into JSON, stringifying non-string mapping keys
/// (status codes such as `200:` are integers in YAML).
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        serde_yaml::Value::Mapping(mapping) => {
            let mut obj = Map::new();
            for (k, v) in mapping {
                let key = match k {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Null => "null".to_string(),
                    other => serde_yaml::to_string(&other)
                        .map(|s| s.trim_end().to_string())
                        .unwrap_or_default(),
                };
                obj.insert(key, yaml_to_json(v));
            }
            Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Load a document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails,
/// or `LoadError::InvalidDocument` if the body doesn't parse.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, LoadError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    // Check for HTTP errors before parsing
    let response = response
        .error_for_status()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let body = response.text().map_err(|source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    })?;

    load_document_str(&body)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a document from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_document_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

/// Navigate a JSON Pointer fragment (e.g., "#/definitions/Pet").
pub fn navigate_fragment<'a>(document: &'a Value, fragment: &str) -> Result<&'a Value, LoadError> {
    let path = fragment.trim_start_matches('#').trim_start_matches('/');
    if path.is_empty() {
        return Ok(document);
    }

    let mut current = document;
    for part in path.split('/') {
        // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
        let key = part.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            other => other.get(&key),
        }
        .ok_or_else(|| LoadError::UnresolvedReference {
            reference: fragment.to_string(),
        })?;
    }
    Ok(current)
}

/// Inline every internal `$ref` of a document.
///
/// Keys written beside a `$ref` take precedence over the target's keys.
/// External references are not supported and fail as unresolved. A reference
/// back into a definition that is already being inlined stays a `$ref`, so
/// recursive schemas keep a finite shape.
pub fn dereference(document: &Value) -> Result<Value, LoadError> {
    let mut resolved = document.clone();
    dereference_inner(&mut resolved, document, &mut Vec::new())?;
    Ok(resolved)
}

fn dereference_inner(
    value: &mut Value,
    root: &Value,
    stack: &mut Vec<String>,
) -> Result<(), LoadError> {
    match value {
        Value::Object(obj) => {
            if let Some(reference) = obj.get("$ref").and_then(Value::as_str).map(String::from) {
                if !reference.starts_with('#') {
                    return Err(LoadError::UnresolvedReference { reference });
                }
                if stack.contains(&reference) {
                    return Ok(());
                }

                let mut target = navigate_fragment(root, &reference)?.clone();
                stack.push(reference);
                dereference_inner(&mut target, root, stack)?;
                stack.pop();

                obj.remove("$ref");
                let mut siblings = std::mem::take(obj);
                for sibling in siblings.values_mut() {
                    dereference_inner(sibling, root, stack)?;
                }

                *value = match target {
                    Value::Object(mut target_obj) => {
                        for (k, v) in siblings {
                            target_obj.insert(k, v);
                        }
                        Value::Object(target_obj)
                    }
                    other if siblings.is_empty() => other,
                    _ => Value::Object(siblings),
                };
                return Ok(());
            }

            for child in obj.values_mut() {
                dereference_inner(child, root, stack)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                dereference_inner(item, root, stack)?;
            }
        }
        _ => {}
    }
    Ok(())
}
