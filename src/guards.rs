//! Content-type and file-presence guards.
//!
//! Both are registered as custom engine keywords: `content` on a headers
//! object schema and `files` on the `files` bucket of a parameters schema.
//! The guards themselves are plain functions over JSON values so the
//! validator can also recompute their structured error params.

use jsonschema::paths::{LazyLocation, Location};
use jsonschema::{Keyword, ValidationError};
use serde_json::{json, Map, Value};

/// Keyword carrying the allowed media types of a headers schema.
pub const CONTENT_TYPE_KEYWORD: &str = "content";
/// Keyword carrying the required/optional upload lists of the files bucket.
pub const FILES_KEYWORD: &str = "files";

/// A failed guard check.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardViolation {
    pub message: String,
    pub params: Value,
}

/// Checks the `content-type` header against a list of media types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeGuard {
    pub types: Vec<String>,
}

impl ContentTypeGuard {
    /// Build the guard payload, or nothing when validation is off or no types
    /// are declared.
    pub fn create(validate: bool, types: Option<&[String]>) -> Option<Self> {
        match types {
            Some(types) if validate && !types.is_empty() => Some(Self {
                types: types.to_vec(),
            }),
            _ => None,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let types = value
            .get("types")?
            .as_array()?
            .iter()
            .map(|t| t.as_str().map(String::from))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { types })
    }

    pub fn payload(&self) -> Value {
        json!({ "types": self.types })
    }

    /// Check a headers object. A missing `content-type` passes.
    pub fn check(&self, headers: &Value) -> Result<(), GuardViolation> {
        let Some(actual) = headers.as_object().and_then(|h| {
            h.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                .and_then(|(_, v)| v.as_str())
        }) else {
            return Ok(());
        };

        let actual_base = media_type(actual);
        if self.types.iter().any(|t| media_type(t) == actual_base) {
            return Ok(());
        }

        Err(GuardViolation {
            message: format!("content-type must be one of {}", self.types.join(",")),
            params: json!({ "content-type": actual, "types": self.types }),
        })
    }
}

/// Media type without parameters, lower-cased (`Text/HTML; charset=x` -> `text/html`).
fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Checks uploaded file field names against the declared upload lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePresenceGuard {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub allow_extra: bool,
}

impl FilePresenceGuard {
    pub fn from_value(value: &Value) -> Option<Self> {
        let names = |key: &str| -> Option<Vec<String>> {
            match value.get(key) {
                None => Some(Vec::new()),
                Some(list) => list
                    .as_array()?
                    .iter()
                    .map(|n| n.as_str().map(String::from))
                    .collect(),
            }
        };
        value.as_object()?;
        Some(Self {
            required: names("required")?,
            optional: names("optional")?,
            allow_extra: value
                .get("allowExtra")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    pub fn payload(&self) -> Value {
        let mut payload = json!({ "required": self.required, "optional": self.optional });
        if self.allow_extra {
            payload["allowExtra"] = Value::Bool(true);
        }
        payload
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }

    /// Check the uploaded files: field-name strings or objects with a
    /// `fieldname` member.
    pub fn check(&self, files: &Value) -> Result<(), GuardViolation> {
        let present: Vec<&str> = files
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|f| f.as_str().or_else(|| f.get("fieldname")?.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        let missing: Vec<&str> = self
            .required
            .iter()
            .map(String::as_str)
            .filter(|r| !present.contains(r))
            .collect();
        if !missing.is_empty() {
            return Err(GuardViolation {
                message: format!("Missing required files: {}", missing.join(", ")),
                params: json!({ "requiredFiles": self.required, "missingFiles": missing }),
            });
        }

        if self.allow_extra {
            return Ok(());
        }

        let allowed: Vec<&String> = self.required.iter().chain(&self.optional).collect();
        let mut extra: Vec<&str> = Vec::new();
        for name in present {
            if !allowed.iter().any(|a| a.as_str() == name) && !extra.contains(&name) {
                extra.push(name);
            }
        }
        if !extra.is_empty() {
            return Err(GuardViolation {
                message: format!(
                    "Extra files are not allowed. Not allowed files: {}",
                    extra.join(", ")
                ),
                params: json!({ "allowedFiles": allowed, "extraFiles": extra }),
            });
        }

        Ok(())
    }
}

/// Either guard, as found in a compiled schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    ContentType(ContentTypeGuard),
    Files(FilePresenceGuard),
}

impl Guard {
    /// Parse the guard behind a keyword, if the keyword names one.
    pub fn from_keyword(keyword: &str, value: &Value) -> Option<Self> {
        match keyword {
            CONTENT_TYPE_KEYWORD => ContentTypeGuard::from_value(value).map(Guard::ContentType),
            FILES_KEYWORD => FilePresenceGuard::from_value(value).map(Guard::Files),
            _ => None,
        }
    }

    pub fn check(&self, instance: &Value) -> Result<(), GuardViolation> {
        match self {
            Guard::ContentType(g) => g.check(instance),
            Guard::Files(g) => g.check(instance),
        }
    }
}

struct GuardKeyword {
    guard: Guard,
    location: Location,
}

impl Keyword for GuardKeyword {
    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
    ) -> Result<(), ValidationError<'i>> {
        self.guard.check(instance).map_err(|violation| {
            ValidationError::custom(
                self.location.clone(),
                location.into(),
                instance,
                violation.message,
            )
        })
    }

    fn is_valid(&self, instance: &Value) -> bool {
        self.guard.check(instance).is_ok()
    }
}

fn guard_keyword<'a>(
    keyword: &str,
    value: &'a Value,
    path: Location,
) -> Result<Box<dyn Keyword>, ValidationError<'a>> {
    match Guard::from_keyword(keyword, value) {
        Some(guard) => Ok(Box::new(GuardKeyword {
            guard,
            location: path,
        })),
        None => Err(ValidationError::custom(
            Location::new(),
            path,
            value,
            format!("malformed `{}` guard payload", keyword),
        )),
    }
}

/// Engine factory for the `content` keyword.
pub fn content_type_keyword<'a>(
    _parent: &'a Map<String, Value>,
    value: &'a Value,
    path: Location,
) -> Result<Box<dyn Keyword>, ValidationError<'a>> {
    guard_keyword(CONTENT_TYPE_KEYWORD, value, path)
}

/// Engine factory for the `files` keyword.
pub fn files_keyword<'a>(
    _parent: &'a Map<String, Value>,
    value: &'a Value,
    path: Location,
) -> Result<Box<dyn Keyword>, ValidationError<'a>> {
    guard_keyword(FILES_KEYWORD, value, path)
}
