use std::io::{BufRead, Read, Seek};
use std::sync::Arc;

use image::{DynamicImage, ImageError, ImageReader};
use log::{debug, warn};

use super::model::{Channels, ImageSize, Row};
use crate::error::{ReaderError, Result};

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Parse a comma-delimited CSV with a header row into rows, in file order.
///
/// `path` is only used for error messages. Records with a different number
/// of fields than the header are rejected. A column name that appears more
/// than once keeps its first position and the value of its last
/// occurrence.
pub fn parse_csv<R: Read>(path: &str, source: R) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .from_reader(source);

    let header = reader
        .headers()
        .map_err(|e| ReaderError::from_csv(path, e))?
        .clone();
    if header.is_empty() {
        return Err(ReaderError::MissingHeader {
            path: path.to_string(),
        });
    }
    let (columns, picks) = dedupe_header(&header);
    if columns.len() != header.len() {
        warn!("Duplicate columns in {path}; the last occurrence of each wins");
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ReaderError::from_csv(path, e))?;
        let values = picks
            .iter()
            .map(|&i| record.get(i).unwrap_or_default().to_string())
            .collect();
        rows.push(Row::new(Arc::clone(&columns), values));
    }

    debug!("Parsed {} rows with columns {:?} from {path}", rows.len(), columns);
    Ok(rows)
}

/// Unique column names in order of first appearance, and for each the index
/// of its last occurrence in the header.
fn dedupe_header(header: &csv::StringRecord) -> (Arc<[String]>, Vec<usize>) {
    let mut columns: Vec<String> = Vec::with_capacity(header.len());
    let mut picks = Vec::with_capacity(header.len());
    for (i, name) in header.iter().enumerate() {
        match columns.iter().position(|c| c == name) {
            Some(existing) => picks[existing] = i,
            None => {
                columns.push(name.to_string());
                picks.push(i);
            }
        }
    }
    (columns.into(), picks)
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

fn image_reader<R: BufRead + Seek>(path: &str, source: R) -> Result<ImageReader<R>> {
    ImageReader::new(source)
        .with_guessed_format()
        .map_err(|e| ReaderError::from_image(path, ImageError::IoError(e)))
}

/// Decode an image of any enabled format and convert it to `channels`.
pub fn decode_image<R: BufRead + Seek>(
    path: &str,
    source: R,
    channels: Channels,
) -> Result<DynamicImage> {
    let image = image_reader(path, source)?
        .decode()
        .map_err(|e| ReaderError::from_image(path, e))?;
    Ok(convert_channels(image, channels))
}

/// Read only as much of the image as needed to know its dimensions.
pub fn read_dimensions<R: BufRead + Seek>(path: &str, source: R) -> Result<ImageSize> {
    let dimensions = image_reader(path, source)?
        .into_dimensions()
        .map_err(|e| ReaderError::from_image(path, e))?;
    Ok(ImageSize::from(dimensions))
}

/// Convert to 8-bit luminance or 8-bit RGB. Buffers already in the target
/// layout are reused.
pub fn convert_channels(image: DynamicImage, channels: Channels) -> DynamicImage {
    match channels {
        Channels::Luma => DynamicImage::ImageLuma8(image.into_luma8()),
        Channels::Rgb => DynamicImage::ImageRgb8(image.into_rgb8()),
    }
}
