//! Application configuration resolved from a git repository.
//!
//! A selector names a file or directory inside the repository. Matching
//! files are decoded by extension (`yaml`, `yml`, `json`, `toml`, `conf`) and
//! merged into one [`Configuration`].

pub mod config;

pub use config::{get_config, ConfigError, Configuration, Mapping, Resolver};
