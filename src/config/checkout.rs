//! Obtaining a local working tree for a repository locator.

use std::fmt;
use std::path::{Path, PathBuf};

use git2::build::RepoBuilder;
use git2::{Repository, ResetType};
use tempfile::TempDir;

use super::locator::RepoLocator;
use super::ConfigError;

/// A local directory holding the repository contents.
///
/// Temporary clones are removed when the checkout is dropped.
#[derive(Debug)]
pub struct Checkout {
    root: PathBuf,
    _guard: Option<TempDir>,
}

impl Checkout {
    /// A checkout of a directory that is not owned by the checkout.
    pub fn borrowed(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            _guard: None,
        }
    }

    fn temporary(dir: TempDir) -> Self {
        Self {
            root: dir.path().to_path_buf(),
            _guard: Some(dir),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Turns a repository locator into a local working tree reflecting the
/// latest fetched revision.
///
/// Implementations own network behaviour (timeouts, retries, credentials).
/// Refreshing the same work dir from several threads at once is not
/// synchronized here.
pub trait CheckoutProvider: Send + Sync + fmt::Debug {
    fn checkout(&self, locator: &RepoLocator) -> Result<Checkout, ConfigError>;
}

/// Uses the locator as an existing directory, without any refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCheckout;

impl CheckoutProvider for LocalCheckout {
    fn checkout(&self, locator: &RepoLocator) -> Result<Checkout, ConfigError> {
        let root = locator.as_path();
        if !root.is_dir() {
            return Err(ConfigError::checkout(
                locator.as_str(),
                format!("'{}' is not a directory", root.display()),
            ));
        }
        Ok(Checkout::borrowed(root))
    }
}

/// Clones the repository with libgit2.
///
/// By default every checkout is a fresh clone into a temporary directory that
/// is removed afterwards. With [`with_workdir`](Self::with_workdir) the clone
/// is made once and later checkouts fetch `origin` and hard-reset to it.
#[derive(Debug, Clone, Default)]
pub struct GitCheckout {
    branch: Option<String>,
    workdir: Option<PathBuf>,
    keep: bool,
}

impl GitCheckout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks out `branch` instead of the remote's default branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Keeps a persistent clone in `dir` and refreshes it on each checkout.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Leaves temporary clones on disk instead of removing them.
    pub fn keep_repo(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    fn clone_into(&self, locator: &RepoLocator, dest: &Path) -> Result<Repository, git2::Error> {
        tracing::info!(locator = %locator, dest = %dest.display(), "cloning config repository");
        let mut builder = RepoBuilder::new();
        if let Some(branch) = &self.branch {
            builder.branch(branch);
        }
        builder.clone(locator.as_str(), dest)
    }

    fn refresh(&self, repo: &Repository) -> Result<(), git2::Error> {
        tracing::info!(path = ?repo.workdir(), "refreshing config repository");
        let mut remote = repo.find_remote("origin")?;
        remote.fetch::<&str>(&[], None, None)?;

        let branch = match &self.branch {
            Some(branch) => branch.clone(),
            None => repo
                .head()?
                .shorthand()
                .map(str::to_string)
                .ok_or_else(|| git2::Error::from_str("HEAD does not name a branch"))?,
        };

        let target = repo.revparse_single(&format!("refs/remotes/origin/{branch}"))?;
        let commit = target.peel_to_commit()?;
        repo.reset(commit.as_object(), ResetType::Hard, None)?;
        Ok(())
    }

    fn persistent(&self, locator: &RepoLocator, dir: &Path) -> Result<Checkout, ConfigError> {
        let fail = |e: git2::Error| ConfigError::checkout(locator.as_str(), e);

        if dir.join(".git").exists() {
            let repo = Repository::open(dir).map_err(fail)?;
            self.refresh(&repo).map_err(fail)?;
        } else {
            self.clone_into(locator, dir).map_err(fail)?;
        }
        Ok(Checkout::borrowed(dir))
    }
}

impl CheckoutProvider for GitCheckout {
    fn checkout(&self, locator: &RepoLocator) -> Result<Checkout, ConfigError> {
        if let Some(dir) = &self.workdir {
            return self.persistent(locator, dir);
        }

        let dir = TempDir::new().map_err(|e| ConfigError::checkout(locator.as_str(), e))?;
        self.clone_into(locator, dir.path())
            .map_err(|e| ConfigError::checkout(locator.as_str(), e))?;

        if self.keep {
            Ok(Checkout::borrowed(dir.keep()))
        } else {
            Ok(Checkout::temporary(dir))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use git2::{IndexAddOption, Signature};
    use std::fs;

    /// Creates a repository in `dir` and commits `files` to it.
    pub(crate) fn init_repo(dir: &Path, files: &[(&str, &str)]) -> Repository {
        let repo = Repository::init(dir).unwrap();
        commit_files(&repo, files, "initial");
        repo
    }

    pub(crate) fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) {
        let workdir = repo.workdir().unwrap().to_path_buf();
        for (name, contents) in files {
            let path = workdir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        let mut index = repo.index().unwrap();
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("gitfig", "gitfig@example.com").unwrap();

        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    #[test]
    fn test_temporary_clone_removed_on_drop() {
        let origin = TempDir::new().unwrap();
        init_repo(origin.path(), &[("app.yaml", "name: demo\n")]);

        let checkout = GitCheckout::new()
            .checkout(&RepoLocator::from(origin.path()))
            .unwrap();
        let root = checkout.root().to_path_buf();
        assert_eq!(fs::read_to_string(root.join("app.yaml")).unwrap(), "name: demo\n");

        drop(checkout);
        assert!(!root.exists());
    }

    #[test]
    fn test_keep_repo_leaves_clone() {
        let origin = TempDir::new().unwrap();
        init_repo(origin.path(), &[("app.yaml", "name: demo\n")]);

        let checkout = GitCheckout::new()
            .keep_repo(true)
            .checkout(&RepoLocator::from(origin.path()))
            .unwrap();
        let root = checkout.root().to_path_buf();
        drop(checkout);

        assert!(root.join("app.yaml").exists());
        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_workdir_refreshes_to_latest_commit() {
        let origin = TempDir::new().unwrap();
        let repo = init_repo(origin.path(), &[("app.yaml", "version: 1\n")]);

        let work = TempDir::new().unwrap();
        let dir = work.path().join("clone");
        let provider = GitCheckout::new().with_workdir(&dir);
        let locator = RepoLocator::from(origin.path());

        let first = provider.checkout(&locator).unwrap();
        assert_eq!(fs::read_to_string(first.root().join("app.yaml")).unwrap(), "version: 1\n");

        commit_files(&repo, &[("app.yaml", "version: 2\n")], "bump");

        let second = provider.checkout(&locator).unwrap();
        assert_eq!(second.root(), dir.as_path());
        assert_eq!(fs::read_to_string(dir.join("app.yaml")).unwrap(), "version: 2\n");
    }

    #[test]
    fn test_bad_locator_is_checkout_error() {
        let missing = TempDir::new().unwrap();
        let locator = RepoLocator::from(missing.path().join("no-such-repo").as_path());
        let result = GitCheckout::new().checkout(&locator);
        assert!(matches!(result, Err(ConfigError::Checkout { .. })));
    }

    #[test]
    fn test_local_checkout() {
        let dir = TempDir::new().unwrap();
        let checkout = LocalCheckout.checkout(&RepoLocator::from(dir.path())).unwrap();
        assert_eq!(checkout.root(), dir.path());

        let result = LocalCheckout.checkout(&RepoLocator::from(dir.path().join("nope").as_path()));
        assert!(matches!(result, Err(ConfigError::Checkout { .. })));
    }
}
