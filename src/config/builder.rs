use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::checkout::{CheckoutProvider, GitCheckout};
use super::env::EnvLocator;
use super::format::{Decoder, FormatRegistry, SCRIPT_EXTENSION};
use super::holder::Configuration;
use super::locator::{select_locator, LocatorSource, RepoLocator};
use super::merge::{merge, overlay};
use super::script::ScriptDecoder;
use super::selector::{Selector, Target};
use super::walk::walk_within;
use super::{ConfigError, Mapping};

/// Resolves configuration selectors against a repository.
///
/// A selector names a file or a directory relative to the repository root.
/// A file is decoded on its own; every recognized file of a directory is
/// decoded in file name order. The results are merged shallowly: a key of a
/// later file replaces the whole value of an earlier one.
///
/// Precedence from lowest to highest: seed, files, overrides.
///
/// ## Repository
///
/// The repository comes from [`with_repo`](Self::with_repo) or, failing
/// that, from the first [`LocatorSource`] that yields one. The
/// `GITFIG_REPO_PATH` environment variable is consulted by default; use
/// [`without_env`](Self::without_env) to turn that off.
///
/// ## Side effects
///
/// Resolution clones or refreshes the repository on disk, and `.conf` files
/// are evaluated with access to the process environment. See
/// [`ScriptDecoder`](super::script::ScriptDecoder) for the trust boundary.
///
/// ## Example
///
/// ```no_run
/// use gitfig::Resolver;
///
/// let mut seed = gitfig::Mapping::new();
/// seed.insert("lol".into(), "haha".into());
///
/// let cfg = Resolver::builder()
///     .with_repo("https://example.com/acme/config.git")
///     .with_seed(seed)
///     .resolve("staging/proj2")?;
///
/// assert_eq!(cfg["lol"], "haha");
/// # Ok::<(), gitfig::ConfigError>(())
/// ```
#[derive(Debug)]
#[must_use = "builders do nothing until .resolve() is called"]
pub struct Resolver {
    repo: Option<RepoLocator>,
    locator_sources: Vec<Box<dyn LocatorSource>>,
    checkout: Arc<dyn CheckoutProvider>,
    registry: FormatRegistry,
    script: ScriptDecoder,
    /// Set once `with_decoder` replaced the `.conf` decoder.
    custom_script: bool,
    seed: Option<Mapping>,
    overrides: Mapping,
    recursive: bool,
    name: String,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            repo: None,
            locator_sources: vec![Box::new(EnvLocator::default())],
            checkout: Arc::new(GitCheckout::new()),
            registry: FormatRegistry::default(),
            script: ScriptDecoder::new(),
            custom_script: false,
            seed: None,
            overrides: Mapping::new(),
            recursive: false,
            name: "config".to_string(),
        }
    }
}

impl Resolver {
    /// Creates a new resolver builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the repository explicitly, taking precedence over every locator source.
    pub fn with_repo(mut self, repo: impl Into<RepoLocator>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    /// Adds a source consulted when no repository was set explicitly.
    ///
    /// Sources are tried in registration order, after the environment.
    pub fn with_locator_source(mut self, source: impl LocatorSource + 'static) -> Self {
        self.locator_sources.push(Box::new(source));
        self
    }

    /// Drops every locator source, including the environment default.
    pub fn without_env(mut self) -> Self {
        self.locator_sources.clear();
        self
    }

    pub fn with_checkout(mut self, provider: impl CheckoutProvider + 'static) -> Self {
        self.checkout = Arc::new(provider);
        self
    }

    /// Registers a decoder for an extension, replacing any existing one.
    ///
    /// A decoder registered for `conf` stays in place: later calls to
    /// [`with_global`](Self::with_global) or
    /// [`expose_prelude`](Self::expose_prelude) no longer affect `.conf` files.
    pub fn with_decoder(mut self, extension: &str, decoder: impl Decoder + 'static) -> Self {
        if extension.eq_ignore_ascii_case(SCRIPT_EXTENSION) {
            self.custom_script = true;
        }
        self.registry.register(extension, decoder);
        self
    }

    /// Binds a name visible to `.conf` scripts.
    ///
    /// Has no effect on `.conf` files once a custom decoder was registered
    /// for them with [`with_decoder`](Self::with_decoder).
    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.script = self.script.with_global(name, value);
        self.sync_script();
        self
    }

    /// Exports the `os` and `env` script bindings as configuration keys.
    ///
    /// Like [`with_global`](Self::with_global), ignored when `.conf` files
    /// use a custom decoder.
    pub fn expose_prelude(mut self, expose: bool) -> Self {
        self.script = self.script.expose_prelude(expose);
        self.sync_script();
        self
    }

    fn sync_script(&mut self) {
        if self.custom_script {
            tracing::debug!("custom .conf decoder registered, script options not applied");
            return;
        }
        self.registry.register(SCRIPT_EXTENSION, self.script.clone());
    }

    /// Base values that every file may override.
    pub fn with_seed(mut self, seed: Mapping) -> Self {
        self.seed = Some(seed);
        self
    }

    /// A value that overrides whatever the files define.
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Also collects files from subdirectories of a selected directory.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Name shown when the configuration is displayed.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn locator(&self) -> Result<RepoLocator, ConfigError> {
        let locator = select_locator(self.repo.as_ref(), &self.locator_sources)
            .ok_or(ConfigError::MissingRepoLocator)?;
        tracing::debug!(locator = %locator, "using config repository");
        Ok(locator)
    }

    /// Checks out the repository and resolves `selector` in it.
    pub fn resolve(&self, selector: impl Into<Selector>) -> Result<Configuration, ConfigError> {
        let selector = selector.into();
        let locator = self.locator()?;
        selector.validate()?;

        let checkout = self.checkout.checkout(&locator)?;
        tracing::debug!(root = %checkout.root().display(), "repository checked out");

        self.resolve_in(checkout.root(), selector)
    }

    /// Resolves `selector` in an already checked out tree.
    pub fn resolve_in(
        &self,
        root: &Path,
        selector: impl Into<Selector>,
    ) -> Result<Configuration, ConfigError> {
        let selector = selector.into();

        let layers = match selector.resolve(root)? {
            Target::File(path) => vec![self.registry.decode_path(&path)?],
            Target::Directory(dir) => walk_within(&dir, root, &self.registry, self.recursive)?
                .iter()
                .map(|file| self.registry.decode(file))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let mut values = merge(self.seed.as_ref(), layers);
        overlay(&mut values, self.overrides.clone());

        tracing::debug!(selector = %selector, keys = values.len(), "configuration resolved");
        Ok(Configuration::new(self.name.clone(), values))
    }

    /// Returns whether `selector` resolves to a non-empty configuration.
    pub fn check(&self, selector: impl Into<Selector>) -> bool {
        let selector = selector.into();
        match self.resolve(selector.clone()) {
            Ok(config) => !config.is_empty(),
            Err(e) => {
                tracing::warn!(selector = %selector, error = %e, "configuration check failed");
                false
            }
        }
    }
}

/// Resolves `selector` from `repo_path`, or from `GITFIG_REPO_PATH` when no
/// path is given, with `initdict` as the lowest-precedence layer.
pub fn get_config(
    selector: impl Into<Selector>,
    repo_path: Option<&str>,
    initdict: Option<Mapping>,
) -> Result<Configuration, ConfigError> {
    let mut resolver = Resolver::builder();
    if let Some(repo) = repo_path {
        resolver = resolver.with_repo(repo);
    }
    if let Some(seed) = initdict {
        resolver = resolver.with_seed(seed);
    }
    resolver.resolve(selector)
}
