//! Folder-structure configuration.
//!
//! A `directories.toml` file maps folder keys to paths relative to a root
//! folder. Values are either a single relative path or a list of path
//! segments that are joined in order:
//!
//! ```toml
//! raw_data_folder = "data/raw"
//! output_folder = ["data", "harmonized"]
//! ```
//!
//! The root folder defaults to the directory holding the TOML file and can be
//! overridden with the [`ROOT_ENV_VAR`] environment variable. The resolved
//! structure is built once at process start and handed to whoever needs it;
//! nothing here is global.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::env::get_env_var_opt;

/// Environment variable that overrides the root folder.
pub const ROOT_ENV_VAR: &str = "DEMAND_ROOT";

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the expected shape.
    #[error("Invalid folder configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A folder entry resolved to an empty path.
    #[error("Folder entry '{0}' is empty")]
    EmptyEntry(String),

    /// The requested folder key is not part of the configuration.
    #[error("Unknown folder key: {0}")]
    UnknownFolder(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FolderEntry {
    Single(String),
    Segments(Vec<String>),
}

/// Resolved folder structure: a root plus named absolute-ish folders under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldersConfig {
    root: PathBuf,
    folders: IndexMap<String, PathBuf>,
}

impl FoldersConfig {
    /// Parse a folder structure from TOML, resolving every entry against `root`.
    pub fn from_toml_str(toml_str: &str, root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let raw: IndexMap<String, FolderEntry> = toml::from_str(toml_str)?;

        let mut folders = IndexMap::with_capacity(raw.len());
        for (key, entry) in raw {
            let relative: PathBuf = match entry {
                FolderEntry::Single(p) => PathBuf::from(p.trim()),
                FolderEntry::Segments(parts) => parts.iter().map(|s| s.trim()).collect(),
            };
            if relative.as_os_str().is_empty() {
                return Err(ConfigError::EmptyEntry(key));
            }
            folders.insert(key, root.join(relative));
        }

        Ok(Self { root, folders })
    }

    /// Load a folder structure from a file.
    ///
    /// The root is `$DEMAND_ROOT` when set, otherwise the file's parent directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let root = match get_env_var_opt(ROOT_ENV_VAR) {
            Some(r) => PathBuf::from(r),
            None => path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        Self::from_toml_str(&text, root)
    }

    /// The root folder every entry is resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a folder by key.
    pub fn folder(&self, key: &str) -> Result<&Path, ConfigError> {
        self.folders
            .get(key)
            .map(PathBuf::as_path)
            .ok_or_else(|| ConfigError::UnknownFolder(key.to_string()))
    }

    /// Iterate over `(key, path)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.folders.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }
}
