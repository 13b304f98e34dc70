// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in every search directory.
pub const CONFIG_FILE_NAME: &str = "chantrack.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),

    #[error("Config file {0} has no [{1}] section")]
    MissingSection(PathBuf, &'static str),
}

/// Default search order: current directory, user config dir, then /etc.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("chantrack").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/chantrack").join(CONFIG_FILE_NAME));
    paths
}

/// Deserialize `[key]` from the TOML file at `path`; `Ok(None)` when the
/// file has no such section.
fn load_section<T: DeserializeOwned>(path: &Path, key: &str) -> Result<Option<T>, ConfigError> {
    let parse_err = |e: &dyn std::fmt::Display| ConfigError::ParseError(path.to_path_buf(), e.to_string());

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    let mut table: toml::Table = toml::from_str(&content).map_err(|e| parse_err(&e))?;

    match table.remove(key) {
        Some(section) => section.try_into::<T>().map(Some).map_err(|e| parse_err(&e)),
        None => Ok(None),
    }
}

/// A configuration struct stored as one section of `chantrack.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section key, e.g. `"chantrack-server"`.
    fn section_key() -> &'static str;

    /// Load the section from `path`; a file without it is an error.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section::<Self>(path, Self::section_key())?
            .ok_or_else(|| ConfigError::MissingSection(path.to_path_buf(), Self::section_key()))
    }

    /// Load from the first default path holding the section, or fall back
    /// to `Default` when none does.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_from_candidates(&config_search_paths())
    }

    /// Like [`ConfigFile::load_from_default_paths`] over an explicit list.
    fn load_from_candidates(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in paths.iter().filter(|p| p.exists()) {
            if let Some(cfg) = load_section::<Self>(path, Self::section_key())? {
                return Ok((cfg, Some(path.clone())));
            }
            tracing::debug!(
                "{} has no [{}] section, continuing search",
                path.display(),
                Self::section_key()
            );
        }
        Ok((Self::default(), None))
    }

    /// Explicit path when given, otherwise the default search.
    fn load(path: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match path {
            Some(path) => Ok((Self::load_from_file(path)?, Some(path.to_path_buf()))),
            None => Self::load_from_default_paths(),
        }
    }
}
