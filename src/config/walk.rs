use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::format::{ConfigFile, FormatRegistry};
use super::ConfigError;

/// Lists the config files in `dir`, in the order they are merged.
///
/// Only immediate children are listed unless `recursive` is set. Entries are
/// sorted by file name within each directory; with recursion the walk is
/// depth-first and hidden directories (such as `.git`) are skipped. Files
/// without a registered extension are ignored.
///
/// Symlinks are followed, but every listed file must stay inside `dir`.
/// See [`walk_within`] to allow a wider root.
pub fn walk(
    dir: &Path,
    registry: &FormatRegistry,
    recursive: bool,
) -> Result<Vec<ConfigFile>, ConfigError> {
    walk_within(dir, dir, registry, recursive)
}

/// Like [`walk`], but symlinked files may point anywhere under `root`.
///
/// A config file whose target lies outside of `root` fails the walk with
/// [`ConfigError::InvalidSelector`].
pub fn walk_within(
    dir: &Path,
    root: &Path,
    registry: &FormatRegistry,
    recursive: bool,
) -> Result<Vec<ConfigFile>, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::SelectorNotFound(dir.to_path_buf()));
    }
    let root = canonicalize(root)?;

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden_dir(e))
    {
        let entry = entry.map_err(|e| ConfigError::ReadError {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file) = registry.identify(entry.path()) else {
            tracing::trace!(path = %entry.path().display(), "skipping unrecognized file");
            continue;
        };

        if !canonicalize(entry.path())?.starts_with(&root) {
            return Err(ConfigError::invalid_selector(
                entry.path().display().to_string(),
                "links outside of the checkout root",
            ));
        }
        files.push(file);
    }

    if files.is_empty() {
        return Err(ConfigError::SelectorNotFound(dir.to_path_buf()));
    }

    Ok(files)
}

fn canonicalize(path: &Path) -> Result<PathBuf, ConfigError> {
    path.canonicalize().map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}
