use serde_json::Value;

use super::locator::{LocatorSource, RepoLocator};
use super::Mapping;

/// Environment variable holding the default repository locator.
pub const REPO_ENV_VAR: &str = "GITFIG_REPO_PATH";

/// Reads the repository locator from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvLocator {
    var: String,
}

impl EnvLocator {
    pub fn new(var: impl Into<String>) -> Self {
        let var = var.into();
        assert!(!var.is_empty(), "variable name must not be empty");
        Self { var }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl Default for EnvLocator {
    fn default() -> Self {
        Self::new(REPO_ENV_VAR)
    }
}

impl LocatorSource for EnvLocator {
    fn locate(&self) -> Option<RepoLocator> {
        std::env::var(&self.var)
            .ok()
            .filter(|value| !value.is_empty())
            .map(RepoLocator::from)
    }
}

/// Snapshot of the process environment as a mapping of strings.
///
/// Variables whose name or value is not valid UTF-8 are left out.
pub fn env_table() -> Mapping {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

/// Platform facts exposed to scripts under the `os` name.
pub fn os_table() -> Mapping {
    let mut table = Mapping::new();
    table.insert("name".into(), Value::from(std::env::consts::OS));
    table.insert("family".into(), Value::from(std::env::consts::FAMILY));
    table.insert("arch".into(), Value::from(std::env::consts::ARCH));
    table.insert("sep".into(), Value::from(std::path::MAIN_SEPARATOR.to_string()));
    table.insert("pathsep".into(), Value::from(if cfg!(windows) { ";" } else { ":" }));
    if let Some(cwd) = std::env::current_dir()
        .ok()
        .and_then(|dir| dir.into_os_string().into_string().ok())
    {
        table.insert("cwd".into(), Value::from(cwd));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_locator_reads_variable() {
        std::env::set_var("GITFIG_TEST_ENV_LOCATOR", "/srv/config-repo");
        let locator = EnvLocator::new("GITFIG_TEST_ENV_LOCATOR").locate().unwrap();
        assert_eq!(locator.as_str(), "/srv/config-repo");
    }

    #[test]
    fn test_env_locator_ignores_empty_and_missing() {
        std::env::set_var("GITFIG_TEST_ENV_LOCATOR_EMPTY", "");
        assert!(EnvLocator::new("GITFIG_TEST_ENV_LOCATOR_EMPTY").locate().is_none());
        assert!(EnvLocator::new("GITFIG_TEST_ENV_LOCATOR_UNSET").locate().is_none());
    }

    #[test]
    fn test_default_uses_repo_env_var() {
        assert_eq!(EnvLocator::default().var(), REPO_ENV_VAR);
    }

    #[test]
    fn test_env_table_contains_variables() {
        std::env::set_var("GITFIG_TEST_ENV_TABLE", "present");
        let table = env_table();
        assert_eq!(table["GITFIG_TEST_ENV_TABLE"], "present");
    }

    #[test]
    fn test_os_table_fields() {
        let table = os_table();
        assert_eq!(table["name"], std::env::consts::OS);
        assert_eq!(table["sep"], std::path::MAIN_SEPARATOR.to_string());
        assert!(table.contains_key("pathsep"));
    }
}
