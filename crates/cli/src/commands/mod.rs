pub mod config_cmd;
pub mod history;
pub mod serve;

use skald_config::{AppConfig, ConfigError};
use std::path::Path;

/// Load config from `path` if given, else from the default location.
/// Environment overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}
