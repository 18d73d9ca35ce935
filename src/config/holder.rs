//! The resolved configuration.

use std::fmt;
use std::ops::Index;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{ConfigError, Mapping};

static NULL: Value = Value::Null;

/// Merged configuration returned by a resolution.
///
/// Values are reachable by key (`cfg["key"]`, [`get`](Self::get)) or by name
/// through typed access: [`get_as`](Self::get_as) for one key and
/// [`extract`](Self::extract) to turn every top-level key into a struct field.
///
/// ```no_run
/// use gitfig::Resolver;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct App {
///     foo: String,
/// }
///
/// let cfg = Resolver::builder().with_repo("/srv/config").resolve("app.yaml")?;
/// assert_eq!(cfg["foo"], "bar");
/// let app: App = cfg.extract()?;
/// assert_eq!(app.foo, "bar");
/// # Ok::<(), gitfig::ConfigError>(())
/// ```
///
/// A locked configuration rejects new keys; existing keys can still be
/// replaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Configuration {
    #[serde(skip)]
    name: String,
    values: Mapping,
    #[serde(skip)]
    locked: bool,
}

impl Configuration {
    pub fn new(name: impl Into<String>, values: Mapping) -> Self {
        Self {
            name: name.into(),
            values,
            locked: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Deserializes the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.values
            .get(key)
            .map(|value| T::deserialize(value).map_err(ConfigError::DeserializeError))
            .transpose()
    }

    /// Deserializes the whole configuration, one field per top-level key.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        Ok(T::deserialize(&Value::Object(self.values.clone()))?)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sets `key`, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, ConfigError> {
        let key = key.into();
        if self.locked && !self.values.contains_key(&key) {
            return Err(ConfigError::Locked(key));
        }
        Ok(self.values.insert(key, value.into()))
    }

    /// Adds an empty nested mapping under `name`.
    pub fn add_section(&mut self, name: impl Into<String>) -> Result<(), ConfigError> {
        self.insert(name, Value::Object(Mapping::new())).map(|_| ())
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn as_map(&self) -> &Mapping {
        &self.values
    }

    pub fn into_inner(self) -> Mapping {
        self.values
    }
}

impl Index<&str> for Configuration {
    type Output = Value;

    /// Missing keys yield `Value::Null`, like indexing a `serde_json::Value`.
    fn index(&self, key: &str) -> &Value {
        self.values.get(key).unwrap_or(&NULL)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration(name={:?}):", self.name)?;
        for (key, value) in &self.values {
            writeln!(f, "  {}.{} = {}", self.name, key, value)?;
        }
        Ok(())
    }
}

impl From<Configuration> for Mapping {
    fn from(config: Configuration) -> Self {
        config.values
    }
}

impl<'a> IntoIterator for &'a Configuration {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn sample() -> Configuration {
        let values = match json!({"lol": "haha", "foo": "bar", "port": 8080}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        Configuration::new("app", values)
    }

    #[derive(Debug, Deserialize)]
    struct App {
        lol: String,
        foo: String,
        port: u16,
    }

    #[test]
    fn test_key_and_named_access_agree() {
        let cfg = sample();
        let app: App = cfg.extract().unwrap();

        assert_eq!(cfg["lol"], "haha");
        assert_eq!(app.lol, "haha");
        assert_eq!(cfg.get("foo"), Some(&json!("bar")));
        assert_eq!(app.foo, "bar");
        assert_eq!(cfg.get_as::<u16>("port").unwrap(), Some(app.port));
    }

    #[test]
    fn test_missing_key() {
        let cfg = sample();
        assert!(cfg["absent"].is_null());
        assert!(cfg.get("absent").is_none());
        assert_eq!(cfg.get_as::<String>("absent").unwrap(), None);
    }

    #[test]
    fn test_get_as_type_mismatch() {
        let result = sample().get_as::<u16>("foo");
        assert!(matches!(result, Err(ConfigError::DeserializeError(_))));
    }

    #[test]
    fn test_lock_blocks_new_keys_only() {
        let mut cfg = sample();
        cfg.lock();
        assert!(cfg.is_locked());

        assert_eq!(cfg.insert("foo", "baz").unwrap(), Some(json!("bar")));
        assert!(matches!(cfg.insert("new", 1), Err(ConfigError::Locked(k)) if k == "new"));
        assert!(cfg.add_section("db").is_err());

        cfg.unlock();
        cfg.add_section("db").unwrap();
        assert_eq!(cfg["db"], json!({}));
    }

    #[test]
    fn test_display() {
        let mut values = Mapping::new();
        values.insert("foo".into(), json!("bar"));
        let cfg = Configuration::new("app", values);
        assert_eq!(cfg.to_string(), "Configuration(name=\"app\"):\n  app.foo = \"bar\"\n");
    }

    #[test]
    fn test_serializes_as_plain_mapping() {
        let cfg = sample();
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value, json!({"lol": "haha", "foo": "bar", "port": 8080}));
    }
}
