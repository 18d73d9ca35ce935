//! Variable reference resolution for script values.
//!
//! Supports `${name.field}` syntax for referencing bindings of the script
//! namespace. Use `$${...}` to escape and produce a literal `${...}`.
//!
//! A referenced script value is resolved on demand before it is substituted.
//! Substituted text is final: it is never scanned for references again and
//! `$$` inside it is kept as is.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::script::ScriptError;
use super::Mapping;

/// Resolves all `${path.to.field}` references in `table`.
///
/// Paths are looked up in `table` first and then in `scope`. Values taken
/// from `scope` are inserted verbatim.
/// Returns an error if a circular reference is detected or a referenced path doesn't exist.
pub fn resolve_references(table: &mut Mapping, scope: &Mapping) -> Result<(), ScriptError> {
    let raw = table.clone();
    let mut interpolator = Interpolator {
        table: &raw,
        scope,
        resolved: HashMap::new(),
        visiting: HashSet::new(),
    };

    let mut path = Vec::new();
    for (key, value) in table.iter_mut() {
        path.push(key.clone());
        interpolator.render_value(value, &mut path)?;
        path.pop();
    }

    Ok(())
}

struct Interpolator<'a> {
    table: &'a Mapping,
    scope: &'a Mapping,
    /// Rendered strings of the script, by key path.
    resolved: HashMap<Vec<String>, String>,
    /// Key paths currently being rendered.
    visiting: HashSet<Vec<String>>,
}

impl Interpolator<'_> {
    /// Renders every string under `value`, which sits at `path` in the table.
    fn render_value(&mut self, value: &mut Value, path: &mut Vec<String>) -> Result<(), ScriptError> {
        match value {
            Value::String(s) => *s = self.resolve_leaf(path)?,
            Value::Object(t) => {
                for (key, item) in t.iter_mut() {
                    path.push(key.clone());
                    self.render_value(item, path)?;
                    path.pop();
                }
            }
            Value::Array(arr) => {
                for item in arr.iter_mut() {
                    self.render_unaddressed(item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Renders strings that cannot be referenced themselves (array items).
    fn render_unaddressed(&mut self, value: &mut Value) -> Result<(), ScriptError> {
        match value {
            Value::String(s) => *s = self.render(s)?,
            Value::Object(t) => {
                for item in t.values_mut() {
                    self.render_unaddressed(item)?;
                }
            }
            Value::Array(arr) => {
                for item in arr.iter_mut() {
                    self.render_unaddressed(item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns the rendered form of the script string at `path`.
    fn resolve_leaf(&mut self, path: &[String]) -> Result<String, ScriptError> {
        if let Some(done) = self.resolved.get(path) {
            return Ok(done.clone());
        }
        if !self.visiting.insert(path.to_vec()) {
            return Err(ScriptError::CircularReference);
        }

        let raw = lookup(self.table, path)
            .and_then(Value::as_str)
            .ok_or_else(|| ScriptError::ReferenceNotFound(path.join(".")))?
            .to_string();
        let rendered = self.render(&raw)?;

        self.visiting.remove(path);
        self.resolved.insert(path.to_vec(), rendered.clone());
        Ok(rendered)
    }

    /// Substitutes every `${...}` reference in a string and unescapes `$$`.
    fn render(&mut self, s: &str) -> Result<String, ScriptError> {
        if !s.contains('$') {
            return Ok(s.to_string());
        }

        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '$' {
                result.push(ch);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let path =
                        consume_until(&mut chars, '}').ok_or(ScriptError::UnclosedReference)?;
                    result.push_str(&self.lookup_path(&path)?);
                }
                _ => result.push('$'),
            }
        }

        Ok(result)
    }

    /// Looks up a dotted path and returns the value as a string.
    fn lookup_path(&mut self, path: &str) -> Result<String, ScriptError> {
        let parts: Vec<String> = path.split('.').map(str::to_string).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ScriptError::InvalidReferencePath(path.to_string()));
        }

        let not_found = || ScriptError::ReferenceNotFound(path.to_string());

        if self.table.contains_key(&parts[0]) {
            return match lookup(self.table, &parts).ok_or_else(not_found)? {
                Value::String(_) => self.resolve_leaf(&parts),
                other => value_to_string(other, path),
            };
        }

        let value = lookup(self.scope, &parts).ok_or_else(not_found)?;
        value_to_string(value, path)
    }
}

fn lookup<'v>(root: &'v Mapping, parts: &[String]) -> Option<&'v Value> {
    let (first, rest) = parts.split_first()?;
    let mut current = root.get(first)?;
    for part in rest {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn consume_until(chars: &mut std::iter::Peekable<std::str::Chars>, delim: char) -> Option<String> {
    let mut result = String::new();
    for ch in chars.by_ref() {
        if ch == delim {
            return Some(result);
        }
        result.push(ch);
    }
    None
}

fn value_to_string(value: &Value, path: &str) -> Result<String, ScriptError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => {
            Err(ScriptError::NonScalarReference(path.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_table(value: Value) -> Mapping {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn test_simple_reference() {
        let mut table = make_table(json!({
            "host": "localhost",
            "url": "http://${host}/api",
        }));
        resolve_references(&mut table, &Mapping::new()).unwrap();
        assert_eq!(table["url"], "http://localhost/api");
    }

    #[test]
    fn test_scope_reference() {
        let scope = make_table(json!({"os": {"name": "linux", "sep": "/"}}));
        let mut table = make_table(json!({"platform": "${os.name}${os.sep}x86"}));
        resolve_references(&mut table, &scope).unwrap();
        assert_eq!(table["platform"], "linux/x86");
    }

    #[test]
    fn test_table_shadows_scope() {
        let scope = make_table(json!({"name": "outer"}));
        let mut table = make_table(json!({"name": "inner", "greeting": "hi ${name}"}));
        resolve_references(&mut table, &scope).unwrap();
        assert_eq!(table["greeting"], "hi inner");
    }

    #[test]
    fn test_chained_references() {
        let mut table = make_table(json!({
            "a": "hello",
            "b": "${a} world",
            "c": "${b}!",
        }));
        resolve_references(&mut table, &Mapping::new()).unwrap();
        assert_eq!(table["c"], "hello world!");
    }

    #[test]
    fn test_escape_survives_other_substitutions() {
        let mut table = make_table(json!({
            "host": "example.com",
            "url": "https://${host}",
            "literal": "use $${VAR} for env vars",
        }));
        resolve_references(&mut table, &Mapping::new()).unwrap();
        assert_eq!(table["literal"], "use ${VAR} for env vars");
        assert_eq!(table["url"], "https://example.com");
    }

    #[test]
    fn test_integer_coercion() {
        let mut table = make_table(json!({
            "port": 3000,
            "url": "http://localhost:${port}",
        }));
        resolve_references(&mut table, &Mapping::new()).unwrap();
        assert_eq!(table["url"], "http://localhost:3000");
    }

    #[test]
    fn test_circular_reference() {
        let mut table = make_table(json!({"a": "${b}", "b": "${a}"}));
        let result = resolve_references(&mut table, &Mapping::new());
        assert!(matches!(result, Err(ScriptError::CircularReference)));
    }

    #[test]
    fn test_missing_reference() {
        let mut table = make_table(json!({"url": "${nonexistent.path}"}));
        let result = resolve_references(&mut table, &Mapping::new());
        assert!(matches!(result, Err(ScriptError::ReferenceNotFound(_))));
    }

    #[test]
    fn test_non_scalar_reference() {
        let mut table = make_table(json!({"section": {"a": 1}, "x": "${section}"}));
        let result = resolve_references(&mut table, &Mapping::new());
        assert!(matches!(result, Err(ScriptError::NonScalarReference(_))));
    }

    #[test]
    fn test_unclosed_reference() {
        let mut table = make_table(json!({"x": "${oops"}));
        let result = resolve_references(&mut table, &Mapping::new());
        assert!(matches!(result, Err(ScriptError::UnclosedReference)));
    }

    #[test]
    fn test_array_values() {
        let mut table = make_table(json!({
            "base": "/api",
            "endpoints": ["${base}/users", "${base}/posts"],
        }));
        resolve_references(&mut table, &Mapping::new()).unwrap();
        assert_eq!(table["endpoints"][0], "/api/users");
        assert_eq!(table["endpoints"][1], "/api/posts");
    }

    #[test]
    fn test_scope_values_are_not_rescanned() {
        let scope = make_table(json!({"env": {
            "PASSWORD": "pa$$word",
            "GREETING": "hello ${name}",
        }}));
        let mut table = make_table(json!({
            "pw": "${env.PASSWORD}",
            "greeting": "${env.GREETING}",
        }));
        resolve_references(&mut table, &scope).unwrap();
        assert_eq!(table["pw"], "pa$$word");
        assert_eq!(table["greeting"], "hello ${name}");
    }

    #[test]
    fn test_escaped_reference_stays_literal_when_referenced() {
        let mut table = make_table(json!({
            "template": "$${user}",
            "copy": "${template}",
        }));
        resolve_references(&mut table, &Mapping::new()).unwrap();
        assert_eq!(table["template"], "${user}");
        assert_eq!(table["copy"], "${user}");
    }

    #[test]
    fn test_sibling_reference_inside_section() {
        let mut table = make_table(json!({
            "db": {"host": "db.local", "url": "pg://${db.host}"},
        }));
        resolve_references(&mut table, &Mapping::new()).unwrap();
        assert_eq!(table["db"]["url"], "pg://db.local");
    }

    #[test]
    fn test_self_reference_is_circular() {
        let mut table = make_table(json!({"a": "x${a}"}));
        let result = resolve_references(&mut table, &Mapping::new());
        assert!(matches!(result, Err(ScriptError::CircularReference)));
    }
}
