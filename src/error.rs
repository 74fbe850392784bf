use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

// ---------------------------------------------------------------------------
// ReaderError – everything a read operation can fail with
// ---------------------------------------------------------------------------

/// Coarse classification of a [`ReaderError`], for callers that only need to
/// branch on what went wrong.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    NotFound,
    ParseError,
    DecodeError,
    MissingColumn,
    InvalidPath,
    Storage,
    Io,
}

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("resource not found: {path}")]
    NotFound { path: String },

    #[error("failed to parse CSV {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("CSV {path} is not valid text: {message}")]
    Encoding { path: String, message: String },

    #[error("CSV {path} has no header row")]
    MissingHeader { path: String },

    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("row {row} of {csv_path} has no column '{column}'")]
    MissingColumn {
        csv_path: String,
        column: String,
        row: usize,
    },

    #[error("{path} resolves outside the dataset root")]
    OutsideRoot { path: String },

    #[error("blob storage error for {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ReaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReaderError::NotFound { .. } => ErrorKind::NotFound,
            ReaderError::Parse { .. }
            | ReaderError::Encoding { .. }
            | ReaderError::MissingHeader { .. } => ErrorKind::ParseError,
            ReaderError::Decode { .. } => ErrorKind::DecodeError,
            ReaderError::MissingColumn { .. } => ErrorKind::MissingColumn,
            ReaderError::OutsideRoot { .. } => ErrorKind::InvalidPath,
            ReaderError::Storage { .. } => ErrorKind::Storage,
            ReaderError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Map a filesystem error, turning absence into [`ReaderError::NotFound`]
    /// keyed by the caller's relative path.
    pub(crate) fn from_io(relative: &str, absolute: PathBuf, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            ReaderError::NotFound {
                path: relative.to_string(),
            }
        } else {
            ReaderError::Io {
                path: absolute,
                source: err,
            }
        }
    }

    /// Map a CSV reader error. Only structural problems (ragged records,
    /// invalid UTF-8, ...) are parse errors; failures of the underlying
    /// stream stay I/O errors.
    pub(crate) fn from_csv(path: &str, err: csv::Error) -> Self {
        if !err.is_io_error() {
            return ReaderError::Parse {
                path: path.to_string(),
                source: err,
            };
        }
        match err.into_kind() {
            csv::ErrorKind::Io(io_err) => Self::from_io(path, PathBuf::from(path), io_err),
            other => ReaderError::Io {
                path: PathBuf::from(path),
                source: io::Error::new(io::ErrorKind::Other, format!("{other:?}")),
            },
        }
    }

    /// Map a blob storage error. Absent keys become [`ReaderError::NotFound`],
    /// text-mode encoding failures become parse errors.
    pub(crate) fn from_storage(path: &str, err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => ReaderError::NotFound {
                path: path.to_string(),
            },
            StorageError::Encoding { message, .. } => ReaderError::Encoding {
                path: path.to_string(),
                message,
            },
            other => ReaderError::Storage {
                path: path.to_string(),
                source: other,
            },
        }
    }

    /// Attach a path to an image error. I/O failures that mean "absent" are
    /// reported as [`ReaderError::NotFound`] rather than as decode failures.
    pub(crate) fn from_image(path: &str, err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io_err) if io_err.kind() == io::ErrorKind::NotFound => {
                ReaderError::NotFound {
                    path: path.to_string(),
                }
            }
            other => ReaderError::Decode {
                path: path.to_string(),
                source: other,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found_kind() {
        let err = ReaderError::from_io(
            "a/b.csv",
            PathBuf::from("/root/a/b.csv"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "resource not found: a/b.csv");
    }

    #[test]
    fn other_io_errors_keep_the_absolute_path() {
        let err = ReaderError::from_io(
            "a/b.csv",
            PathBuf::from("/root/a/b.csv"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/root/a/b.csv"));
    }

    #[test]
    fn storage_errors_are_classified() {
        let missing = ReaderError::from_storage(
            "x.png",
            StorageError::NotFound {
                key: "x.png".into(),
            },
        );
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let encoding = ReaderError::from_storage(
            "x.csv",
            StorageError::Encoding {
                key: "x.csv".into(),
                message: "invalid utf-8".into(),
            },
        );
        assert_eq!(encoding.kind(), ErrorKind::ParseError);

        let closed = ReaderError::from_storage("x.png", StorageError::Closed);
        assert_eq!(closed.kind(), ErrorKind::Storage);
    }

    #[test]
    fn decode_errors_carry_the_path() {
        let err = ReaderError::from_image(
            "masks/a.png",
            image::ImageError::Unsupported(
                image::error::UnsupportedError::from_format_and_kind(
                    image::error::ImageFormatHint::Unknown,
                    image::error::UnsupportedErrorKind::Format(
                        image::error::ImageFormatHint::Unknown,
                    ),
                ),
            ),
        );
        assert_eq!(err.kind(), ErrorKind::DecodeError);
        assert!(err.to_string().contains("masks/a.png"));
    }
}
