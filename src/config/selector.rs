//! Selectors: paths of config files or directories relative to the checkout root.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use super::ConfigError;

/// A relative path into the repository, as a `/`-separated string or as a
/// sequence of segments.
///
/// `$NAME` and `${NAME}` are expanded from the environment; unknown variables
/// are kept verbatim. `..`, absolute paths and drive prefixes are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    segments: Vec<String>,
}

/// What a selector points at inside the checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    File(PathBuf),
    Directory(PathBuf),
}

impl Selector {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Expands variables and checks that the selector stays inside the root.
    ///
    /// Returns the normalized relative path; no filesystem access happens here.
    pub fn validate(&self) -> Result<PathBuf, ConfigError> {
        let raw = self.to_string();
        let invalid = |reason: &str| ConfigError::invalid_selector(raw.clone(), reason);

        let mut relative = PathBuf::new();
        for (index, segment) in self.segments.iter().enumerate() {
            let expanded = expand_vars(segment);
            if (index == 0 && expanded.starts_with('/')) || Path::new(&expanded).has_root() {
                return Err(invalid("absolute paths are not allowed"));
            }
            for part in expanded.split('/') {
                for component in Path::new(part).components() {
                    match component {
                        Component::Normal(name) => relative.push(name),
                        Component::CurDir => {}
                        Component::ParentDir => {
                            return Err(invalid("parent directory segments are not allowed"))
                        }
                        Component::RootDir | Component::Prefix(_) => {
                            return Err(invalid("absolute paths are not allowed"))
                        }
                    }
                }
            }
        }
        Ok(relative)
    }

    /// Locates the selector under `root`.
    ///
    /// Symlinks that lead outside of `root` are rejected.
    pub fn resolve(&self, root: &Path) -> Result<Target, ConfigError> {
        let relative = self.validate()?;
        let joined = root.join(&relative);

        if !joined.exists() {
            return Err(ConfigError::SelectorNotFound(joined));
        }

        let canonical_root = canonicalize(root)?;
        let canonical = canonicalize(&joined)?;
        if !canonical.starts_with(&canonical_root) {
            return Err(ConfigError::invalid_selector(
                self.to_string(),
                "resolves outside of the checkout root",
            ));
        }

        if canonical.is_dir() {
            Ok(Target::Directory(canonical))
        } else if canonical.is_file() {
            Ok(Target::File(canonical))
        } else {
            Err(ConfigError::SelectorNotFound(joined))
        }
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, ConfigError> {
    path.canonicalize().map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        Self::new([s])
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Self::new([s])
    }
}

impl From<&String> for Selector {
    fn from(s: &String) -> Self {
        Self::new([s.as_str()])
    }
}

impl From<&[&str]> for Selector {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Selector {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

impl From<Vec<String>> for Selector {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

impl From<&Path> for Selector {
    fn from(path: &Path) -> Self {
        Self::new([path.to_string_lossy().into_owned()])
    }
}

/// Expands `$NAME` and `${NAME}` from the process environment.
fn expand_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match std::env::var(name) {
            Ok(value) if !name.is_empty() => {
                result.push_str(&value);
                rest = &after[consumed..];
            }
            _ => {
                let literal = if name.is_empty() { 0 } else { consumed };
                result.push('$');
                result.push_str(&after[..literal]);
                rest = &after[literal..];
            }
        }
    }

    result.push_str(rest);
    result
}
