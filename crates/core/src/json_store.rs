//! Plain JSON document files shared by history, favorites and templates.
//!
//! A missing or blank file reads as `T::default()`. Writes create the parent
//! directory and replace the file with pretty-printed JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonStoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to create directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn read_document<T>(path: &Path) -> Result<T, JsonStoreError>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let raw = fs::read_to_string(path).map_err(|source| JsonStoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&raw).map_err(|source| JsonStoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_document<T>(path: &Path, document: &T) -> Result<(), JsonStoreError>
where
    T: Serialize,
{
    if let Some(parent_dir) = path.parent() {
        fs::create_dir_all(parent_dir).map_err(|source| JsonStoreError::CreateDir {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let rendered =
        serde_json::to_string_pretty(document).map_err(|source| JsonStoreError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

    fs::write(path, rendered).map_err(|source| JsonStoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}
