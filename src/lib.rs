//! Read access to image datasets described by CSV manifests.
//!
//! A dataset is a set of CSV files and images addressed by slash-separated
//! relative paths. It lives either in a directory tree or packed into a
//! single-file blob container; [`DataReader`] hides which.
//!
//! ```no_run
//! use spai_data::{Channels, DataReader, FileSystemReader};
//!
//! let reader = FileSystemReader::new("/data/dmid");
//! let rows = reader.read_csv_file("train.csv")?;
//! let masks = reader.load_signals("signals/instances.csv")?;
//! let image = reader.load_image(rows[0].get("image").unwrap_or_default(), Channels::Rgb)?;
//! # Ok::<(), spai_data::ReaderError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod reader;
pub mod storage;

pub use config::{ConfigError, ReaderConfig};
pub use data::filter::{filter_rows, matches};
pub use data::model::{parse_specifier, Channels, DataSpecifier, ImageSize, Row, DEFAULT_SIGNAL_COLUMN};
pub use error::{ErrorKind, ReaderError, Result};
pub use reader::{BlobStoreReader, DataReader, FileSource, FileSystemReader};
pub use storage::{BlobStorage, BlobStream, OpenMode, RedbFileStorage, StorageError};
