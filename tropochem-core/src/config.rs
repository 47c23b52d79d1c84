//! Loading of TOML configuration files
//!
//! Configuration structs derive `Deserialize` with `#[serde(default)]` so that
//! a file only needs to list the values that differ from the defaults.

use crate::errors::{ChemError, ChemResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Parse a configuration from a TOML string
pub fn from_toml_str<T: DeserializeOwned>(content: &str) -> ChemResult<T> {
    toml::from_str(content).map_err(|e| ChemError::InvalidConfig(e.to_string()))
}

/// Read and parse a TOML configuration file
pub fn from_toml_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> ChemResult<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| ChemError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
    from_toml_str(&content)
}

/// Render a configuration as TOML
pub fn to_toml_string<T: Serialize>(config: &T) -> ChemResult<String> {
    toml::to_string_pretty(config).map_err(|e| ChemError::InvalidConfig(e.to_string()))
}
