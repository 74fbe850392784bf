use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;
use redb::{Database, TableDefinition};

use super::{BlobStorage, MemoryStream, OpenMode, StorageError};

const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Blob container backed by redb, a pure-Rust embedded key-value database.
///
/// The whole dataset lives in one file. Each stored file is a row of the
/// `files` table keyed by its slash-separated path relative to the dataset
/// root.
pub struct RedbFileStorage {
    db: Arc<Database>,
    open_streams: Arc<AtomicUsize>,
}

impl RedbFileStorage {
    /// Open an existing container.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if !path.is_file() {
            return Err(StorageError::NotFound {
                key: path.display().to_string(),
            });
        }
        let db = Database::open(path).map_err(::redb::Error::from)?;
        debug!("Opened blob container {}", path.display());
        Ok(Self::from_database(db))
    }

    /// Create a new container, or open it for appending if it already exists.
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        let db = Database::create(path).map_err(::redb::Error::from)?;

        // Make sure the table exists so that reads on an empty container
        // report missing keys instead of a missing table.
        let write_txn = db.begin_write().map_err(::redb::Error::from)?;
        {
            let _table = write_txn.open_table(FILES).map_err(::redb::Error::from)?;
        }
        write_txn.commit().map_err(::redb::Error::from)?;

        debug!("Created blob container {}", path.display());
        Ok(Self::from_database(db))
    }

    fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of streams handed out by [`BlobStorage::open_file`] that have
    /// not been closed yet.
    pub fn open_stream_count(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Store (or replace) one file.
    pub fn write_file(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.write_batch(&[(key.to_string(), bytes.to_vec())])
    }

    fn write_batch(&self, entries: &[(String, Vec<u8>)]) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(::redb::Error::from)?;
        {
            let mut table = write_txn.open_table(FILES).map_err(::redb::Error::from)?;
            for (key, value) in entries {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(::redb::Error::from)?;
            }
        }
        write_txn.commit().map_err(::redb::Error::from)?;
        Ok(())
    }

    /// Recursively store every file under `dir`, keyed by its path relative
    /// to `dir`. Returns the number of files stored.
    pub fn pack_directory(&self, dir: &Path) -> Result<usize, StorageError> {
        let mut entries = Vec::new();
        collect_files(dir, dir, &mut entries)?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        self.write_batch(&entries)?;
        debug!("Packed {} files from {}", entries.len(), dir.display());
        Ok(entries.len())
    }

    /// Sorted keys starting with `prefix`.
    pub fn list_files(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let read_txn = self.db.begin_read().map_err(::redb::Error::from)?;
        let table = match read_txn.open_table(FILES) {
            Ok(table) => table,
            Err(::redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(::redb::Error::from(e).into()),
        };

        let mut keys = Vec::new();
        for entry in table.range(prefix..).map_err(::redb::Error::from)? {
            let (key, _) = entry.map_err(::redb::Error::from)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    pub fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.read_bytes(&normalize_key(key))?.is_some())
    }

    fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let read_txn = self.db.begin_read().map_err(::redb::Error::from)?;
        let table = match read_txn.open_table(FILES) {
            Ok(table) => table,
            Err(::redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(::redb::Error::from(e).into()),
        };
        let value = table.get(key).map_err(::redb::Error::from)?;
        Ok(value.map(|v| v.value().to_vec()))
    }
}

impl BlobStorage for RedbFileStorage {
    type Stream = MemoryStream;

    fn open_file(&self, path: &str, mode: OpenMode) -> Result<MemoryStream, StorageError> {
        let key = normalize_key(path);
        let bytes = self.read_bytes(&key)?.ok_or_else(|| StorageError::NotFound {
            key: key.clone(),
        })?;
        debug!("Opened {key} ({} bytes, {mode:?})", bytes.len());
        MemoryStream::new(&key, bytes, mode, Arc::clone(&self.open_streams))
    }
}

/// Keys are stored without `.`/`..` segments or a leading slash. A `..`
/// that would climb above the namespace is kept, so the key simply does not
/// exist.
fn normalize_key(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." if segments.last().is_some_and(|s| *s != "..") => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Recursively collect `(key, bytes)` for every file under `dir`, with keys
/// relative to `base`.
fn collect_files(
    base: &Path,
    dir: &Path,
    out: &mut Vec<(String, Vec<u8>)>,
) -> Result<(), StorageError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(base, &path, out)?;
            continue;
        }
        let relative = path.strip_prefix(base).map_err(|e| {
            StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        // Forward slashes regardless of platform.
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        out.push((key, fs::read(&path)?));
    }
    Ok(())
}
