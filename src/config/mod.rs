//! Configuration resolution from a repository checkout.

mod builder;
mod checkout;
mod env;
mod error;
mod format;
mod holder;
mod locator;
mod merge;
mod resolve;
mod script;
mod selector;
mod walk;

pub use builder::{get_config, Resolver};
pub use checkout::{Checkout, CheckoutProvider, GitCheckout, LocalCheckout};
pub use env::{EnvLocator, REPO_ENV_VAR};
pub use error::{BoxError, ConfigError};
pub use format::{ConfigFile, Decoder, FormatRegistry, SCRIPT_EXTENSION};
pub use holder::Configuration;
pub use locator::{LocatorSource, RepoLocator};
pub use merge::merge;
pub use script::{ScriptDecoder, ScriptError};
pub use selector::{Selector, Target};
pub use walk::{walk, walk_within};

/// Top-level names of one configuration file mapped to their values.
pub type Mapping = serde_json::Map<String, serde_json::Value>;
