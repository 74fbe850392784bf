//! The reader contract, checked against both backends on the same dataset.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use image::{ColorType, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use tempfile::TempDir;

use spai_data::{
    BlobStoreReader, Channels, DataReader, DataSpecifier, ErrorKind, FileSystemReader,
    RedbFileStorage,
};

/// Dataset tree:
///
/// ```text
/// train.csv                image,seg_map,class
/// images/{0..4}.png        RGB, width = 10 + i
/// sub/signals.csv          seg_map,class   (paths relative to sub/)
/// sub/masks/{0..4}.png     gray, width = 20 + i
/// corrupt/bad.png          not an image
/// corrupt/signals.csv      references bad.png
/// ```
fn write_dataset(root: &Path) {
    fs::create_dir_all(root.join("images")).unwrap();
    fs::create_dir_all(root.join("sub/masks")).unwrap();
    fs::create_dir_all(root.join("corrupt")).unwrap();

    let mut train = String::from("image,seg_map,class\n");
    let mut signals = String::from("seg_map,class\n");
    for i in 0..5u32 {
        RgbImage::from_pixel(10 + i, 8, Rgb([i as u8, 100, 200]))
            .save_with_format(root.join(format!("images/{i}.png")), ImageFormat::Png)
            .unwrap();
        GrayImage::from_pixel(20 + i, 6, Luma([i as u8]))
            .save_with_format(root.join(format!("sub/masks/{i}.png")), ImageFormat::Png)
            .unwrap();
        let class = if i % 2 == 0 { "1" } else { "0" };
        train.push_str(&format!("images/{i}.png,sub/masks/{i}.png,{class}\n"));
        signals.push_str(&format!("masks/{i}.png,{class}\n"));
    }
    fs::write(root.join("train.csv"), train).unwrap();
    fs::write(root.join("sub/signals.csv"), signals).unwrap();
    fs::write(root.join("corrupt/bad.png"), b"\x89PNG but not really").unwrap();
    fs::write(root.join("corrupt/signals.csv"), "seg_map\nbad.png\n").unwrap();
}

struct Fixture {
    _tmp: TempDir,
    fs_reader: FileSystemReader,
    blob_reader: BlobStoreReader<RedbFileStorage>,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("dataset");
    write_dataset(&root);

    let storage = RedbFileStorage::create(&tmp.path().join("dataset.redb")).unwrap();
    storage.pack_directory(&root).unwrap();

    Fixture {
        fs_reader: FileSystemReader::new(root),
        blob_reader: BlobStoreReader::new(Arc::new(storage)),
        _tmp: tmp,
    }
}

impl Fixture {
    fn readers(&self) -> [(&str, &dyn DataReader); 2] {
        [("filesystem", &self.fs_reader), ("blob", &self.blob_reader)]
    }
}

#[test]
fn csv_rows_come_back_in_file_order() {
    let f = fixture();
    for (name, reader) in f.readers() {
        let rows = reader.read_csv_file("train.csv").unwrap();
        assert_eq!(rows.len(), 5, "{name}");
        let images: Vec<_> = rows.iter().map(|r| r.get("image").unwrap()).collect();
        assert_eq!(
            images,
            vec!["images/0.png", "images/1.png", "images/2.png", "images/3.png", "images/4.png"],
            "{name}"
        );
    }
}

#[test]
fn channel_depth_is_chosen_at_read_time() {
    let f = fixture();
    for (name, reader) in f.readers() {
        let luma = reader.load_image("images/2.png", Channels::from(1)).unwrap();
        assert_eq!(luma.color(), ColorType::L8, "{name}");
        for count in [0u8, 3, 4] {
            let rgb = reader.load_image("images/2.png", Channels::from(count)).unwrap();
            assert_eq!(rgb.color(), ColorType::Rgb8, "{name}");
        }
        let gray_as_rgb = reader.load_image("sub/masks/0.png", Channels::Rgb).unwrap();
        assert_eq!(gray_as_rgb.color(), ColorType::Rgb8, "{name}");
    }
}

#[test]
fn image_size_agrees_with_decoding() {
    let f = fixture();
    for (name, reader) in f.readers() {
        for path in ["images/3.png", "sub/masks/4.png"] {
            let size = reader.get_image_size(path).unwrap();
            let image = reader.load_image(path, Channels::Rgb).unwrap();
            assert_eq!((size.width, size.height), (image.width(), image.height()), "{name}");
        }
        let size = reader.get_image_size("images/3.png").unwrap();
        assert_eq!((size.width, size.height), (13, 8), "{name}");
    }
}

#[test]
fn signals_are_filtered_and_ordered() {
    let f = fixture();
    let spec: DataSpecifier = [("class".to_string(), "1".to_string())].into();
    for (name, reader) in f.readers() {
        let all = reader.load_signals("sub/signals.csv").unwrap();
        assert_eq!(all.len(), 5, "{name}");

        let matched = reader
            .load_signals_from_csv("sub/signals.csv", "seg_map", Channels::Luma, Some(&spec))
            .unwrap();
        let widths: Vec<_> = matched.iter().map(|s| s.width()).collect();
        assert_eq!(widths, vec![20, 22, 24], "{name}");
        assert!(matched.iter().all(|s| s.color() == ColorType::L8), "{name}");

        let none: DataSpecifier = [("class".to_string(), "7".to_string())].into();
        let empty = reader
            .load_signals_from_csv("sub/signals.csv", "seg_map", Channels::Luma, Some(&none))
            .unwrap();
        assert!(empty.is_empty(), "{name}");
    }
}

#[test]
fn signal_paths_resolve_against_the_csv_directory() {
    let f = fixture();
    for (name, reader) in f.readers() {
        assert_eq!(
            reader.resolve_signal_path("sub/signals.csv", "masks/1.png").unwrap(),
            "sub/masks/1.png",
            "{name}"
        );
        // Root-level CSV referencing nested masks.
        let signals = reader
            .load_signals_from_csv("train.csv", "seg_map", Channels::Luma, None)
            .unwrap();
        assert_eq!(signals.len(), 5, "{name}");
    }
}

#[test]
fn missing_resources_are_not_found() {
    let f = fixture();
    for (name, reader) in f.readers() {
        let kinds = [
            reader.read_csv_file("missing.csv").unwrap_err().kind(),
            reader.load_image("missing.png", Channels::Luma).unwrap_err().kind(),
            reader.get_image_size("missing.png").unwrap_err().kind(),
            reader.load_file_path_or_stream("missing.png").unwrap_err().kind(),
            reader.load_signals("missing.csv").unwrap_err().kind(),
        ];
        assert!(kinds.iter().all(|k| *k == ErrorKind::NotFound), "{name}: {kinds:?}");
    }
}

#[test]
fn one_corrupt_signal_fails_the_whole_call() {
    let f = fixture();
    for (name, reader) in f.readers() {
        let err = reader.load_signals("corrupt/signals.csv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError, "{name}");
        assert!(err.to_string().contains("corrupt/bad.png"), "{name}: {err}");

        let err = reader
            .load_signals_from_csv("sub/signals.csv", "mask", Channels::Luma, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingColumn, "{name}");
    }
}

#[test]
fn blob_streams_never_outlive_a_call() {
    let f = fixture();
    let reader = &f.blob_reader;

    for _ in 0..50 {
        reader.load_image("images/1.png", Channels::Rgb).unwrap();
        reader.get_image_size("images/1.png").unwrap();
        assert!(reader.load_image("corrupt/bad.png", Channels::Luma).is_err());
        assert!(reader.get_image_size("corrupt/bad.png").is_err());
    }
    reader.load_signals("sub/signals.csv").unwrap();
    assert!(reader.load_signals("corrupt/signals.csv").is_err());
    assert_eq!(reader.storage().open_stream_count(), 0);

    let source = reader.load_file_path_or_stream("train.csv").unwrap();
    assert_eq!(reader.storage().open_stream_count(), 1);
    drop(source);
    assert_eq!(reader.storage().open_stream_count(), 0);
}

#[test]
fn raw_sources_yield_the_same_bytes() {
    let f = fixture();
    let mut contents = Vec::new();
    for (_, reader) in f.readers() {
        let mut bytes = Vec::new();
        reader
            .load_file_path_or_stream("sub/signals.csv")
            .unwrap()
            .into_reader()
            .unwrap()
            .read_to_end(&mut bytes)
            .unwrap();
        contents.push(bytes);
    }
    assert_eq!(contents[0], contents[1]);
    assert!(f
        .fs_reader
        .load_file_path_or_stream("train.csv")
        .unwrap()
        .as_path()
        .is_some());
}
