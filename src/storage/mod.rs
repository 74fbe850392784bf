/// Blob container collaborator: a single-file key-value store holding the
/// bytes of every dataset file, keyed by slash-separated relative path.
///
/// ```text
///   BlobStorage::open_file(key, mode)
///        │
///        ▼
///   ┌────────────┐
///   │ BlobStream │  Read + Seek, explicit close()
///   └────────────┘
/// ```
///
/// Readers consume only the traits in this module; [`RedbFileStorage`] is
/// the concrete container shipped with the crate.
pub mod redb;

use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

pub use self::redb::RedbFileStorage;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no such key: {key}")]
    NotFound { key: String },

    #[error("stream is closed")]
    Closed,

    #[error("key {key} is not valid UTF-8 text: {message}")]
    Encoding { key: String, message: String },

    #[error("container error: {0}")]
    Backend(#[from] ::redb::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// How the bytes behind a key are going to be consumed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenMode {
    /// UTF-8 text. Validated at open time; a leading byte-order mark is
    /// stripped.
    Text,
    /// Raw bytes.
    Binary,
}

/// An open handle on one stored file.
///
/// Streams hold container resources until [`BlobStream::close`] is called.
/// Dropping a stream without closing it is a leak from the container's
/// point of view.
pub trait BlobStream: Read + Seek {
    fn close(&mut self) -> Result<(), StorageError>;

    fn is_closed(&self) -> bool;
}

/// A container that can open stored files as streams.
pub trait BlobStorage: Send + Sync {
    type Stream: BlobStream + Send + 'static;

    fn open_file(&self, path: &str, mode: OpenMode) -> Result<Self::Stream, StorageError>;
}

// ---------------------------------------------------------------------------
// MemoryStream – a stream over bytes copied out of the container
// ---------------------------------------------------------------------------

/// In-memory [`BlobStream`] that reports its lifetime to a shared counter of
/// open streams.
#[derive(Debug)]
pub struct MemoryStream {
    cursor: Cursor<Vec<u8>>,
    open_streams: Arc<AtomicUsize>,
    closed: bool,
}

impl MemoryStream {
    pub(crate) fn new(
        key: &str,
        mut bytes: Vec<u8>,
        mode: OpenMode,
        open_streams: Arc<AtomicUsize>,
    ) -> Result<Self, StorageError> {
        if mode == OpenMode::Text {
            if let Err(e) = std::str::from_utf8(&bytes) {
                return Err(StorageError::Encoding {
                    key: key.to_string(),
                    message: e.to_string(),
                });
            }
            if bytes.starts_with(UTF8_BOM) {
                bytes.drain(..UTF8_BOM.len());
            }
        }
        open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            cursor: Cursor::new(bytes),
            open_streams,
            closed: false,
        })
    }

    /// Total length of the stored file in bytes.
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, StorageError::Closed)
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        self.cursor.read(buf)
    }
}

impl Seek for MemoryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.closed {
            return Err(closed_error());
        }
        self.cursor.seek(pos)
    }
}

impl BlobStream for MemoryStream {
    fn close(&mut self) -> Result<(), StorageError> {
        if !self.closed {
            self.closed = true;
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
            // Release the buffer together with the handle.
            self.cursor = Cursor::new(Vec::new());
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
