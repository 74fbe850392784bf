//! Backend-agnostic dataset readers.
//!
//! [`DataReader`] is the one interface pipelines depend on. It has two
//! implementations:
//!
//! - [`FileSystemReader`]: relative paths resolved under a root directory
//! - [`BlobStoreReader`]: relative paths used as keys of a blob container
//!
//! All divergence between the two stays inside the implementations. In
//! particular each one supplies its own [`DataReader::resolve_signal_path`],
//! which [`DataReader::load_signals_from_csv`] uses to turn a CSV cell into
//! a path the same reader can load.

pub mod blob;
pub mod filesystem;

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::debug;

use crate::data::filter::matches;
use crate::data::model::{Channels, DataSpecifier, ImageSize, Row, DEFAULT_SIGNAL_COLUMN};
use crate::error::{ReaderError, Result};

pub use blob::BlobStoreReader;
pub use filesystem::FileSystemReader;

// ---------------------------------------------------------------------------
// FileSource – raw access to a stored file
// ---------------------------------------------------------------------------

/// Anything that can be read and seeked and moved across threads.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Backend-native handle returned by [`DataReader::load_file_path_or_stream`].
///
/// Consumers that only need bytes should call [`FileSource::into_reader`].
/// [`FileSource::as_path`] is only meaningful for filesystem-backed readers.
pub enum FileSource {
    /// A path on the local filesystem.
    Path(PathBuf),
    /// An open stream. Dropping it releases the underlying resource.
    Stream(Box<dyn ReadSeek>),
}

impl FileSource {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            FileSource::Path(path) => Some(path),
            FileSource::Stream(_) => None,
        }
    }

    /// Open the source as a buffered byte stream, whatever the backend.
    pub fn into_reader(self) -> io::Result<Box<dyn ReadSeek>> {
        match self {
            FileSource::Path(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            FileSource::Stream(stream) => Ok(stream),
        }
    }
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            FileSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// DataReader
// ---------------------------------------------------------------------------

/// Read access to a dataset of CSV manifests and images.
///
/// Every path argument is a slash-separated path relative to the reader's
/// backend (dataset root or container namespace). Reads are independent of
/// each other and never modify the backend.
pub trait DataReader: Send + Sync {
    /// Parse the comma-delimited CSV at `path`, header row first, into rows
    /// in file order.
    fn read_csv_file(&self, path: &str) -> Result<Vec<Row>>;

    /// Decode the image at `path` and convert it to `channels`.
    fn load_image(&self, path: &str, channels: Channels) -> Result<DynamicImage>;

    /// Dimensions of the image at `path`, without decoding its pixels.
    fn get_image_size(&self, path: &str) -> Result<ImageSize>;

    /// Backend-native handle on the raw file at `path`.
    fn load_file_path_or_stream(&self, path: &str) -> Result<FileSource>;

    /// Path (relative to this reader) of a file referenced by `signal` in the
    /// CSV at `csv_path`. `signal` is relative to the directory containing
    /// the CSV.
    fn resolve_signal_path(&self, csv_path: &str, signal: &str) -> Result<String>;

    /// Load every image referenced by `column_name` in the CSV at
    /// `csv_path`, in row order, skipping rows that do not match
    /// `data_specifier`.
    ///
    /// The first row that lacks the column, or whose image cannot be
    /// loaded, fails the whole call.
    fn load_signals_from_csv(
        &self,
        csv_path: &str,
        column_name: &str,
        channels: Channels,
        data_specifier: Option<&DataSpecifier>,
    ) -> Result<Vec<DynamicImage>> {
        let rows = self.read_csv_file(csv_path)?;

        let mut signals = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if let Some(spec) = data_specifier {
                if !matches(row, spec) {
                    continue;
                }
            }

            let signal = row
                .get(column_name)
                .ok_or_else(|| ReaderError::MissingColumn {
                    csv_path: csv_path.to_string(),
                    column: column_name.to_string(),
                    row: index,
                })?;
            let signal_path = self.resolve_signal_path(csv_path, signal)?;
            signals.push(self.load_image(&signal_path, channels)?);
        }

        debug!(
            "Loaded {} of {} signals from {csv_path} (column '{column_name}')",
            signals.len(),
            rows.len()
        );
        Ok(signals)
    }

    /// [`DataReader::load_signals_from_csv`] with the defaults for instance
    /// segmentation maps: the `seg_map` column, single channel, every row.
    fn load_signals(&self, csv_path: &str) -> Result<Vec<DynamicImage>> {
        self.load_signals_from_csv(csv_path, DEFAULT_SIGNAL_COLUMN, Channels::Luma, None)
    }
}

/// Join path components with forward slashes, regardless of platform.
pub(crate) fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
