//! Format detection and decoding.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use super::script::ScriptDecoder;
use super::{BoxError, ConfigError, Mapping};

/// Extension of executable configuration scripts.
pub const SCRIPT_EXTENSION: &str = "conf";

/// Turns the raw bytes of one configuration file into a mapping.
pub trait Decoder: Send + Sync + fmt::Debug {
    fn decode(&self, bytes: &[u8]) -> Result<Mapping, BoxError>;
}

/// A configuration file together with the extension it is decoded by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    path: PathBuf,
    extension: String,
}

impl ConfigFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

#[derive(Debug)]
struct YamlDecoder;

impl Decoder for YamlDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Mapping, BoxError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Mapping::new());
        }
        let mut yaml: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
        // `<<: *anchor` merge keys
        yaml.apply_merge()?;
        let value: Value = serde_yaml::from_value(yaml)?;
        match value {
            // an empty document
            Value::Null => Ok(Mapping::new()),
            other => top_level_mapping(other),
        }
    }
}

#[derive(Debug)]
struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Mapping, BoxError> {
        top_level_mapping(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug)]
struct TomlDecoder;

impl Decoder for TomlDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Mapping, BoxError> {
        let table: toml::Table = toml::from_str(std::str::from_utf8(bytes)?)?;
        Ok(toml_table_to_mapping(table))
    }
}

fn top_level_mapping(value: Value) -> Result<Mapping, BoxError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("top-level document must be a mapping, found {}", kind(&other)).into()),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

pub(crate) fn toml_table_to_mapping(table: toml::Table) -> Mapping {
    table
        .into_iter()
        .map(|(key, value)| (key, toml_to_value(value)))
        .collect()
}

fn toml_to_value(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_value).collect()),
        toml::Value::Table(t) => Value::Object(toml_table_to_mapping(t)),
    }
}

/// Maps file extensions to decoders.
///
/// [`FormatRegistry::default`] knows `yaml`, `yml`, `json`, `toml` and the
/// `conf` script format. More can be added with [`register`](Self::register).
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    decoders: HashMap<String, Arc<dyn Decoder>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        let yaml: Arc<dyn Decoder> = Arc::new(YamlDecoder);
        registry.decoders.insert("yaml".into(), Arc::clone(&yaml));
        registry.decoders.insert("yml".into(), yaml);
        registry.register("json", JsonDecoder);
        registry.register("toml", TomlDecoder);
        registry.register(SCRIPT_EXTENSION, ScriptDecoder::new());
        registry
    }
}

impl FormatRegistry {
    /// A registry without any decoder.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Adds or replaces the decoder for an extension (without the dot).
    pub fn register(&mut self, extension: &str, decoder: impl Decoder + 'static) {
        self.decoders
            .insert(extension.to_lowercase(), Arc::new(decoder));
    }

    pub fn is_registered(&self, extension: &str) -> bool {
        self.decoders.contains_key(&extension.to_lowercase())
    }

    /// Returns the config file for `path` if its extension has a decoder.
    pub fn identify(&self, path: &Path) -> Option<ConfigFile> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        self.decoders.contains_key(&extension).then(|| ConfigFile {
            path: path.to_path_buf(),
            extension,
        })
    }

    /// Reads and decodes one config file.
    pub fn decode(&self, file: &ConfigFile) -> Result<Mapping, ConfigError> {
        let decoder = self
            .decoders
            .get(&file.extension)
            .ok_or_else(|| ConfigError::UnsupportedFormat(file.path.clone()))?;

        let bytes = std::fs::read(&file.path).map_err(|e| ConfigError::ReadError {
            path: file.path.clone(),
            source: e,
        })?;

        tracing::debug!(path = %file.path.display(), format = %file.extension, "decoding config file");
        decoder.decode(&bytes).map_err(|e| ConfigError::Decode {
            path: file.path.clone(),
            source: e,
        })
    }

    /// Identifies and decodes a path in one step.
    pub fn decode_path(&self, path: &Path) -> Result<Mapping, ConfigError> {
        let file = self
            .identify(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        self.decode(&file)
    }
}
