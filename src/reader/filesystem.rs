//! Reader over a plain directory tree.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{debug, error};

use super::{to_slash_path, DataReader, FileSource};
use crate::data::loader::{decode_image, parse_csv, read_dimensions};
use crate::data::model::{Channels, ImageSize, Row};
use crate::error::{ReaderError, Result};

/// A [`DataReader`] that maps relative paths to files under `root`.
#[derive(Debug, Clone)]
pub struct FileSystemReader {
    root: PathBuf,
}

impl FileSystemReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!("FileSystemReader rooted at {}", root.display());
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a relative dataset path.
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn open(&self, path: &str) -> Result<BufReader<File>> {
        let full = self.resolve(path);
        let file = File::open(&full).map_err(|e| ReaderError::from_io(path, full, e))?;
        Ok(BufReader::new(file))
    }
}

impl DataReader for FileSystemReader {
    fn read_csv_file(&self, path: &str) -> Result<Vec<Row>> {
        parse_csv(path, self.open(path)?)
    }

    fn load_image(&self, path: &str, channels: Channels) -> Result<DynamicImage> {
        let result = self
            .open(path)
            .and_then(|file| decode_image(path, file, channels));
        if let Err(e) = &result {
            error!("Failed to read: {path} ({e})");
        }
        result
    }

    fn get_image_size(&self, path: &str) -> Result<ImageSize> {
        read_dimensions(path, self.open(path)?)
    }

    fn load_file_path_or_stream(&self, path: &str) -> Result<FileSource> {
        let full = self.resolve(path);
        if !full.exists() {
            return Err(ReaderError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(FileSource::Path(full))
    }

    /// `root / parent(csv_path) / signal`, re-expressed relative to `root`
    /// so that it can be passed back to [`DataReader::load_image`].
    fn resolve_signal_path(&self, csv_path: &str, signal: &str) -> Result<String> {
        let csv_full = self.resolve(csv_path);
        let csv_dir = csv_full.parent().unwrap_or(self.root.as_path());
        let signal_full = csv_dir.join(signal);

        let relative = signal_full
            .strip_prefix(&self.root)
            .map_err(|_| ReaderError::OutsideRoot {
                path: signal_full.display().to_string(),
            })?;
        Ok(to_slash_path(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::error::ErrorKind;
    use image::{ColorType, GrayImage, ImageFormat};
    use tempfile::TempDir;

    fn dataset() -> (FileSystemReader, TempDir) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("sub/masks")).unwrap();
        GrayImage::from_pixel(6, 4, image::Luma([200]))
            .save_with_format(root.join("sub/masks/a.png"), ImageFormat::Png)
            .unwrap();
        fs::write(root.join("sub/data.csv"), "seg_map,class\nmasks/a.png,1\n").unwrap();
        fs::write(root.join("broken.png"), b"definitely not a png").unwrap();
        (FileSystemReader::new(root), tmp)
    }

    #[test]
    fn signal_paths_are_rebased_onto_the_root() {
        let reader = FileSystemReader::new("/data/root");
        assert_eq!(
            reader.resolve_signal_path("sub/data.csv", "masks/a.png").unwrap(),
            "sub/masks/a.png"
        );
        assert_eq!(
            reader.resolve_signal_path("data.csv", "masks/a.png").unwrap(),
            "masks/a.png"
        );
        assert_eq!(
            reader.resolve_signal_path("a/b/data.csv", "c.png").unwrap(),
            "a/b/c.png"
        );
    }

    #[test]
    fn absolute_signal_outside_root_is_rejected() {
        let reader = FileSystemReader::new("/data/root");
        let err = reader
            .resolve_signal_path("sub/data.csv", "/elsewhere/a.png")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
    }

    #[test]
    fn nested_csv_loads_sibling_masks() {
        let (reader, _tmp) = dataset();
        let signals = reader.load_signals("sub/data.csv").unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].color(), ColorType::L8);
        assert_eq!((signals[0].width(), signals[0].height()), (6, 4));
    }

    #[test]
    fn missing_paths_are_not_found() {
        let (reader, _tmp) = dataset();
        assert_eq!(reader.read_csv_file("nope.csv").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            reader.load_image("nope.png", Channels::Luma).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(reader.get_image_size("nope.png").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            reader.load_file_path_or_stream("nope.png").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn unreadable_csv_is_an_io_error() {
        let (reader, tmp) = dataset();
        fs::create_dir(tmp.path().join("dir.csv")).unwrap();
        let err = reader.read_csv_file("dir.csv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn broken_image_is_a_decode_error() {
        let (reader, _tmp) = dataset();
        let err = reader.load_image("broken.png", Channels::Rgb).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
        assert!(err.to_string().contains("broken.png"));
    }

    #[test]
    fn file_source_is_a_path_under_root() {
        let (reader, tmp) = dataset();
        let source = reader.load_file_path_or_stream("sub/data.csv").unwrap();
        assert_eq!(source.as_path(), Some(tmp.path().join("sub/data.csv").as_path()));
    }
}
