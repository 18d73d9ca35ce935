use std::fmt;
use std::path::Path;

/// Location of a configuration repository: a local path or a remote URL.
///
/// The locator is opaque to the resolver and handed to the checkout provider
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoLocator(String);

impl RepoLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interprets the locator as a filesystem path.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepoLocator {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RepoLocator {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&Path> for RepoLocator {
    fn from(p: &Path) -> Self {
        Self(p.to_string_lossy().into_owned())
    }
}

/// A place a default repository locator can be looked up from.
///
/// Sources are consulted in registration order after an explicit locator.
pub trait LocatorSource: Send + Sync + fmt::Debug {
    fn locate(&self) -> Option<RepoLocator>;
}

/// Picks the locator: the explicit one if given, else the first source that
/// yields one.
pub fn select_locator(
    explicit: Option<&RepoLocator>,
    sources: &[Box<dyn LocatorSource>],
) -> Option<RepoLocator> {
    explicit
        .cloned()
        .or_else(|| sources.iter().find_map(|source| source.locate()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(Option<&'static str>);

    impl LocatorSource for Fixed {
        fn locate(&self) -> Option<RepoLocator> {
            self.0.map(RepoLocator::from)
        }
    }

    #[test]
    fn test_explicit_wins() {
        let sources: Vec<Box<dyn LocatorSource>> = vec![Box::new(Fixed(Some("from-source")))];
        let explicit = RepoLocator::new("explicit");
        let chosen = select_locator(Some(&explicit), &sources).unwrap();
        assert_eq!(chosen.as_str(), "explicit");
    }

    #[test]
    fn test_first_source_with_value_wins() {
        let sources: Vec<Box<dyn LocatorSource>> = vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some("second"))),
            Box::new(Fixed(Some("third"))),
        ];
        let chosen = select_locator(None, &sources).unwrap();
        assert_eq!(chosen.as_str(), "second");
    }

    #[test]
    fn test_nothing_found() {
        let sources: Vec<Box<dyn LocatorSource>> = vec![Box::new(Fixed(None))];
        assert!(select_locator(None, &sources).is_none());
    }
}
