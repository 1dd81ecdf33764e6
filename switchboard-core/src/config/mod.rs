//! Configuration for the router and its provider adapters
//!
//! A configuration can come from a YAML or JSON file (with `${VAR}` and
//! `${VAR:-default}` environment interpolation) or from the process
//! environment alone via [`from_env`].

mod env;
mod error;
mod schema;
pub mod secrets;
mod validator;

pub use env::{from_env, from_lookup, interpolate_env_vars, interpolate_with};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    ConnectionConfig, ProviderSettings, ResilienceSettings, RoutingSettings, SwitchboardConfig,
    CONFIG_VERSION,
};
pub use secrets::{SafeLogging, SecretString};
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<SwitchboardConfig> {
    let path = path.as_ref();
    let content = read(path)?;

    let config: SwitchboardConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<SwitchboardConfig> {
    let path = path.as_ref();
    let content = read(path)?;

    let config: SwitchboardConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Read a file and interpolate environment variables before parsing
fn read(path: &Path) -> ConfigResult<String> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    env::interpolate_env_vars(&content)
}
