//! Reader over a blob container.
//!
//! Every read opens its own stream from the container and closes it again
//! before returning, on success and on failure alike. Long read loops (a
//! full training split) therefore never accumulate open streams.

use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::sync::Arc;

use image::DynamicImage;
use log::{debug, warn};

use super::{DataReader, FileSource};
use crate::data::loader::{decode_image, parse_csv, read_dimensions};
use crate::data::model::{Channels, ImageSize, Row};
use crate::error::{ReaderError, Result};
use crate::storage::{BlobStorage, BlobStream, OpenMode, StorageError};

// ---------------------------------------------------------------------------
// StreamGuard – closes a blob stream when it goes out of scope
// ---------------------------------------------------------------------------

/// Owns an open [`BlobStream`] and closes it on drop if nobody closed it
/// explicitly.
pub struct StreamGuard<T: BlobStream> {
    stream: T,
}

impl<T: BlobStream> StreamGuard<T> {
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    pub fn close(&mut self) -> std::result::Result<(), StorageError> {
        self.stream.close()
    }
}

impl<T: BlobStream> Drop for StreamGuard<T> {
    fn drop(&mut self) {
        if !self.stream.is_closed() {
            if let Err(e) = self.stream.close() {
                warn!("Failed to close blob stream: {e}");
            }
        }
    }
}

impl<T: BlobStream> Read for StreamGuard<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl<T: BlobStream> Seek for StreamGuard<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.stream.seek(pos)
    }
}

// ---------------------------------------------------------------------------
// BlobStoreReader
// ---------------------------------------------------------------------------

/// A [`DataReader`] that maps relative paths to keys of a blob container.
///
/// The container's own key space is the path namespace; there is no root
/// directory.
pub struct BlobStoreReader<S: BlobStorage> {
    storage: Arc<S>,
}

impl<S: BlobStorage> BlobStoreReader<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<StreamGuard<S::Stream>> {
        let stream = self
            .storage
            .open_file(path, mode)
            .map_err(|e| ReaderError::from_storage(path, e))?;
        debug!("Opened blob stream {path} ({mode:?})");
        Ok(StreamGuard::new(stream))
    }

    /// Run `f` on a freshly opened stream and close the stream afterwards,
    /// whatever `f` returned. An error from `f` takes precedence over an
    /// error from closing.
    fn with_stream<T>(
        &self,
        path: &str,
        mode: OpenMode,
        f: impl FnOnce(&mut StreamGuard<S::Stream>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.open(path, mode)?;
        let result = f(&mut guard);
        let closed = guard
            .close()
            .map_err(|e| ReaderError::from_storage(path, e));
        let value = result?;
        closed?;
        Ok(value)
    }
}

impl<S: BlobStorage> DataReader for BlobStoreReader<S> {
    fn read_csv_file(&self, path: &str) -> Result<Vec<Row>> {
        self.with_stream(path, OpenMode::Text, |stream| parse_csv(path, stream))
    }

    fn load_image(&self, path: &str, channels: Channels) -> Result<DynamicImage> {
        self.with_stream(path, OpenMode::Binary, |stream| {
            decode_image(path, BufReader::new(stream), channels)
        })
    }

    fn get_image_size(&self, path: &str) -> Result<ImageSize> {
        self.with_stream(path, OpenMode::Binary, |stream| {
            read_dimensions(path, BufReader::new(stream))
        })
    }

    /// The returned stream stays open until the caller drops it.
    fn load_file_path_or_stream(&self, path: &str) -> Result<FileSource> {
        let guard = self.open(path, OpenMode::Binary)?;
        Ok(FileSource::Stream(Box::new(guard)))
    }

    /// `parent(csv_path) / signal` in the container's namespace.
    fn resolve_signal_path(&self, csv_path: &str, signal: &str) -> Result<String> {
        // Keys are relative to the container; there is nothing above it.
        if signal.starts_with('/') {
            return Err(ReaderError::OutsideRoot {
                path: signal.to_string(),
            });
        }
        let parent = csv_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        if parent.is_empty() {
            Ok(signal.to_string())
        } else {
            Ok(format!("{parent}/{signal}"))
        }
    }
}
