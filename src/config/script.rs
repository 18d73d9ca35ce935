//! Executable configuration scripts (`.conf`).
//!
//! A script is a TOML document whose top-level names become configuration
//! keys. Before those names are returned, string values are evaluated against
//! a namespace that holds:
//!
//! - `os`: platform facts (`name`, `family`, `arch`, `sep`, `pathsep`, `cwd`);
//! - `env`: the process environment;
//! - globals supplied by the caller;
//! - the script's own top-level names, which shadow everything above.
//!
//! ```toml
//! home = "${env.HOME}"
//! cache = "${home}${os.sep}.cache"
//!
//! [database]
//! url = "postgres://${env.DB_HOST}/app"
//! ```
//!
//! ## Trust boundary
//!
//! Evaluation can read every environment variable of the running process and
//! copy it into configuration values. Only resolve `.conf` files from fully
//! trusted repositories.
//!
//! The namespace bindings are not part of the decoded mapping unless
//! [`ScriptDecoder::expose_prelude`] is enabled.

use serde_json::Value;
use thiserror::Error;

use super::env::{env_table, os_table};
use super::format::Decoder;
use super::resolve::resolve_references;
use super::{BoxError, Mapping};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScriptError {
    #[error("script is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("script syntax error: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("circular reference detected in script")]
    CircularReference,

    #[error("referenced name not found: {0}")]
    ReferenceNotFound(String),

    #[error("invalid reference path: {0}")]
    InvalidReferencePath(String),

    #[error("cannot reference non-scalar value: {0}")]
    NonScalarReference(String),

    #[error("unclosed reference (missing '}}')")]
    UnclosedReference,
}

/// Decoder for `.conf` scripts.
#[derive(Debug, Clone, Default)]
pub struct ScriptDecoder {
    globals: Mapping,
    expose_prelude: bool,
}

impl ScriptDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an extra name in the evaluation namespace.
    ///
    /// Globals can be referenced by scripts but are never exported.
    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    /// Also exports the `os` and `env` bindings that the script did not
    /// shadow.
    ///
    /// Off by default: copying the whole environment into a configuration is
    /// rarely intended.
    pub fn expose_prelude(mut self, expose: bool) -> Self {
        self.expose_prelude = expose;
        self
    }

    fn prelude() -> Mapping {
        let mut prelude = Mapping::new();
        prelude.insert("os".into(), Value::Object(os_table()));
        prelude.insert("env".into(), Value::Object(env_table()));
        prelude
    }

    /// Evaluates a script into its top-level bindings.
    pub fn evaluate(&self, source: &str) -> Result<Mapping, ScriptError> {
        let table: toml::Table = toml::from_str(source)?;
        let mut bindings = super::format::toml_table_to_mapping(table);

        let prelude = Self::prelude();
        let mut scope = prelude.clone();
        scope.extend(self.globals.iter().map(|(k, v)| (k.clone(), v.clone())));

        resolve_references(&mut bindings, &scope)?;

        if self.expose_prelude {
            for (name, value) in prelude {
                bindings.entry(name).or_insert(value);
            }
        }

        Ok(bindings)
    }
}

impl Decoder for ScriptDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Mapping, BoxError> {
        let source = std::str::from_utf8(bytes).map_err(ScriptError::from)?;
        Ok(self.evaluate(source)?)
    }
}
