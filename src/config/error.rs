use std::path::PathBuf;
use thiserror::Error;

/// Boxed underlying failure carried by [`ConfigError`] variants that wrap
/// collaborator errors (git, decoders).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("no repository locator given and none found in the environment")]
    MissingRepoLocator,

    #[error("failed to check out repository '{locator}': {source}")]
    Checkout { locator: String, source: BoxError },

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("selector not found: {0}")]
    SelectorNotFound(PathBuf),

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode config file '{path}': {source}")]
    Decode { path: PathBuf, source: BoxError },

    #[error("cannot add key '{0}' to a locked configuration")]
    Locked(String),

    #[error("failed to deserialize config: {0}")]
    DeserializeError(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid_selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn checkout(locator: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Checkout {
            locator: locator.into(),
            source: source.into(),
        }
    }
}
