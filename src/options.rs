//! Build options and validation-engine settings.

use std::sync::Arc;

use jsonschema::paths::Location;
use jsonschema::{Keyword, ValidationError};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Type coercion applied to a candidate value before schema evaluation.
///
/// Deserializes from `false`, `true`, `"off"`, `"on"` or `"array"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "CoercionRepr")]
pub enum Coercion {
    /// Values are validated exactly as given.
    #[default]
    Off,
    /// Scalars are coerced towards the declared `type`.
    On,
    /// As `On`, and scalars are wrapped into / unwrapped from one-element arrays.
    Array,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoercionRepr {
    Flag(bool),
    Named(String),
}

impl TryFrom<CoercionRepr> for Coercion {
    type Error = String;

    fn try_from(repr: CoercionRepr) -> Result<Self, Self::Error> {
        match repr {
            CoercionRepr::Flag(false) => Ok(Coercion::Off),
            CoercionRepr::Flag(true) => Ok(Coercion::On),
            CoercionRepr::Named(name) => match name.as_str() {
                "off" => Ok(Coercion::Off),
                "on" => Ok(Coercion::On),
                "array" => Ok(Coercion::Array),
                other => Err(format!(
                    "unknown coercion \"{}\": expected off, on or array",
                    other
                )),
            },
        }
    }
}

/// Settings for one validation-engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Report every error instead of stopping at the first one.
    pub all_errors: bool,
    pub coerce_types: Coercion,
    /// Insert `default` values for missing object properties.
    pub use_defaults: bool,
    pub validate_formats: bool,
}

impl EngineOptions {
    /// Defaults for the parameters engine: all errors, array-aware coercion.
    pub fn params_defaults() -> Self {
        Self {
            all_errors: true,
            coerce_types: Coercion::Array,
            use_defaults: false,
            validate_formats: true,
        }
    }

    /// Defaults for the body engine: all errors, no coercion.
    pub fn body_defaults() -> Self {
        Self {
            all_errors: true,
            coerce_types: Coercion::Off,
            use_defaults: false,
            validate_formats: true,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::body_defaults()
    }
}

/// Partial engine settings read from an options file.
///
/// Fields left out keep the value of the engine's own defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineOverrides {
    all_errors: Option<bool>,
    coerce_types: Option<Coercion>,
    use_defaults: Option<bool>,
    validate_formats: Option<bool>,
}

impl EngineOverrides {
    fn apply(self, base: EngineOptions) -> EngineOptions {
        EngineOptions {
            all_errors: self.all_errors.unwrap_or(base.all_errors),
            coerce_types: self.coerce_types.unwrap_or(base.coerce_types),
            use_defaults: self.use_defaults.unwrap_or(base.use_defaults),
            validate_formats: self.validate_formats.unwrap_or(base.validate_formats),
        }
    }
}

fn params_engine_over_defaults<'de, D>(deserializer: D) -> Result<EngineOptions, D::Error>
where
    D: Deserializer<'de>,
{
    EngineOverrides::deserialize(deserializer).map(|o| o.apply(EngineOptions::params_defaults()))
}

fn body_engine_over_defaults<'de, D>(deserializer: D) -> Result<EngineOptions, D::Error>
where
    D: Deserializer<'de>,
{
    EngineOverrides::deserialize(deserializer).map(|o| o.apply(EngineOptions::body_defaults()))
}

/// How a custom format checks a string.
#[derive(Clone)]
pub enum FormatCheck {
    Pattern(Regex),
    Validate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl FormatCheck {
    pub fn check(&self, value: &str) -> bool {
        match self {
            FormatCheck::Pattern(re) => re.is_match(value),
            FormatCheck::Validate(f) => f(value),
        }
    }
}

impl std::fmt::Debug for FormatCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatCheck::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            FormatCheck::Validate(_) => f.write_str("Validate(..)"),
        }
    }
}

/// A caller-declared `format` registration.
#[derive(Debug, Clone)]
pub struct CustomFormat {
    pub name: String,
    pub check: FormatCheck,
}

impl CustomFormat {
    /// A format satisfied by strings matching `pattern`.
    pub fn pattern(name: impl Into<String>, pattern: Regex) -> Self {
        Self {
            name: name.into(),
            check: FormatCheck::Pattern(pattern),
        }
    }

    /// A format satisfied when `validate` returns true.
    pub fn validate<F>(name: impl Into<String>, validate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: FormatCheck::Validate(Arc::new(validate)),
        }
    }
}

/// Factory compiling one occurrence of a custom keyword.
///
/// Receives the enclosing schema object, the keyword's value and the
/// keyword's schema location.
pub type KeywordFactory = Arc<
    dyn for<'a> Fn(
            &'a Map<String, Value>,
            &'a Value,
            Location,
        ) -> Result<Box<dyn Keyword>, ValidationError<'a>>
        + Send
        + Sync,
>;

/// A caller-declared custom keyword registration.
#[derive(Clone)]
pub struct CustomKeyword {
    pub name: String,
    pub factory: KeywordFactory,
    /// Schema every value of this keyword must satisfy.
    pub meta_schema: Option<Value>,
}

impl CustomKeyword {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: for<'a> Fn(
                &'a Map<String, Value>,
                &'a Value,
                Location,
            ) -> Result<Box<dyn Keyword>, ValidationError<'a>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            meta_schema: None,
        }
    }

    pub fn with_meta_schema(mut self, meta_schema: Value) -> Self {
        self.meta_schema = Some(meta_schema);
        self
    }
}

impl std::fmt::Debug for CustomKeyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomKeyword")
            .field("name", &self.name)
            .field("meta_schema", &self.meta_schema)
            .finish_non_exhaustive()
    }
}

/// Options for building a schema map.
///
/// Deserializes from the camelCase keys of an options file; `formats` and
/// `keywords` can only be set from code.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildOptions {
    pub build_requests: bool,
    /// Response validators are only built for Swagger 2.0 documents.
    pub build_responses: bool,
    pub content_type_validation: bool,
    pub expect_form_fields_in_body: bool,
    pub make_optional_attributes_nullable: bool,
    /// Accept uploaded files that the operation does not declare.
    pub allow_extra_files: bool,
    #[serde(
        rename = "ajvConfigParams",
        deserialize_with = "params_engine_over_defaults"
    )]
    pub params_engine: EngineOptions,
    #[serde(rename = "ajvConfigBody", deserialize_with = "body_engine_over_defaults")]
    pub body_engine: EngineOptions,
    #[serde(skip)]
    pub formats: Vec<CustomFormat>,
    #[serde(skip)]
    pub keywords: Vec<CustomKeyword>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            build_requests: true,
            build_responses: true,
            content_type_validation: false,
            expect_form_fields_in_body: false,
            make_optional_attributes_nullable: false,
            allow_extra_files: false,
            params_engine: EngineOptions::params_defaults(),
            body_engine: EngineOptions::body_defaults(),
            formats: Vec::new(),
            keywords: Vec::new(),
        }
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_requests(mut self, enabled: bool) -> Self {
        self.build_requests = enabled;
        self
    }

    pub fn build_responses(mut self, enabled: bool) -> Self {
        self.build_responses = enabled;
        self
    }

    pub fn content_type_validation(mut self, enabled: bool) -> Self {
        self.content_type_validation = enabled;
        self
    }

    pub fn expect_form_fields_in_body(mut self, enabled: bool) -> Self {
        self.expect_form_fields_in_body = enabled;
        self
    }

    pub fn make_optional_attributes_nullable(mut self, enabled: bool) -> Self {
        self.make_optional_attributes_nullable = enabled;
        self
    }

    pub fn allow_extra_files(mut self, enabled: bool) -> Self {
        self.allow_extra_files = enabled;
        self
    }

    pub fn params_engine(mut self, engine: EngineOptions) -> Self {
        self.params_engine = engine;
        self
    }

    pub fn body_engine(mut self, engine: EngineOptions) -> Self {
        self.body_engine = engine;
        self
    }

    pub fn format(mut self, format: CustomFormat) -> Self {
        self.formats.push(format);
        self
    }

    pub fn keyword(mut self, keyword: CustomKeyword) -> Self {
        self.keywords.push(keyword);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_option_table() {
        let opts = BuildOptions::default();
        assert!(opts.build_requests);
        assert!(opts.build_responses);
        assert!(!opts.content_type_validation);
        assert!(opts.params_engine.all_errors);
        assert_eq!(opts.params_engine.coerce_types, Coercion::Array);
        assert_eq!(opts.body_engine.coerce_types, Coercion::Off);
    }

    #[test]
    fn deserialize_partial_options_file() {
        let opts: BuildOptions = serde_json::from_str(
            r#"{
                "contentTypeValidation": true,
                "ajvConfigBody": { "coerceTypes": true, "useDefaults": true },
                "ajvConfigParams": { "allErrors": false }
            }"#,
        )
        .unwrap();

        assert!(opts.content_type_validation);
        assert!(opts.build_requests);
        assert_eq!(opts.body_engine.coerce_types, Coercion::On);
        assert!(opts.body_engine.use_defaults);
        assert!(opts.body_engine.all_errors);
        // merged over the params defaults, not the body ones
        assert!(!opts.params_engine.all_errors);
        assert_eq!(opts.params_engine.coerce_types, Coercion::Array);
    }

    #[test]
    fn coercion_names() {
        let c: Coercion = serde_json::from_str(r#""array""#).unwrap();
        assert_eq!(c, Coercion::Array);
        let c: Coercion = serde_json::from_str("false").unwrap();
        assert_eq!(c, Coercion::Off);
        assert!(serde_json::from_str::<Coercion>(r#""sometimes""#).is_err());
    }

    #[test]
    fn builder_setters_chain() {
        let opts = BuildOptions::new()
            .build_responses(false)
            .expect_form_fields_in_body(true)
            .format(CustomFormat::validate("file", |_| true));
        assert!(!opts.build_responses);
        assert!(opts.expect_form_fields_in_body);
        assert_eq!(opts.formats.len(), 1);
    }

    #[test]
    fn format_checks() {
        let int32 = CustomFormat::pattern("int32", Regex::new(r"^\d{1,10}$").unwrap());
        assert!(int32.check.check("1234"));
        assert!(!int32.check.check("12a"));

        let any = CustomFormat::validate("file", |_| true);
        assert!(any.check.check(""));
    }
}
