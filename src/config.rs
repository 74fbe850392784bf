//! Backend selection.
//!
//! A dataset session is configured once with a [`ReaderConfig`], usually
//! read from a small JSON file:
//!
//! ```json
//! { "backend": "filesystem", "root": "/data/dmid" }
//! { "backend": "blob_store", "path": "/data/dmid.redb" }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reader::{BlobStoreReader, DataReader, FileSystemReader};
use crate::storage::{RedbFileStorage, StorageError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid reader config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("dataset root {} is not a directory", .0.display())]
    InvalidRoot(PathBuf),

    #[error("failed to open blob container {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: StorageError,
    },
}

/// Which backend a reader binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ReaderConfig {
    /// Files under a root directory.
    Filesystem { root: PathBuf },
    /// Files inside a single-file blob container.
    BlobStore { path: PathBuf },
}

impl ReaderConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Construct the configured reader.
    pub fn open(&self) -> Result<Box<dyn DataReader>, ConfigError> {
        match self {
            ReaderConfig::Filesystem { root } => {
                if !root.is_dir() {
                    return Err(ConfigError::InvalidRoot(root.clone()));
                }
                info!("Reading dataset from directory {}", root.display());
                Ok(Box::new(FileSystemReader::new(root.clone())))
            }
            ReaderConfig::BlobStore { path } => {
                let storage = RedbFileStorage::open(path).map_err(|source| ConfigError::Storage {
                    path: path.clone(),
                    source,
                })?;
                info!("Reading dataset from blob container {}", path.display());
                Ok(Box::new(BlobStoreReader::new(Arc::new(storage))))
            }
        }
    }
}
