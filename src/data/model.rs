use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Column that holds instance segmentation maps in signal CSVs.
pub const DEFAULT_SIGNAL_COLUMN: &str = "seg_map";

// ---------------------------------------------------------------------------
// Row – one record of a CSV file
// ---------------------------------------------------------------------------

/// A single CSV record: column name → cell text, in header order.
///
/// All rows parsed from the same file share one header allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl Row {
    /// Build a row from a shared, duplicate-free header and one cell per
    /// column.
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<String>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Row { columns, values }
    }

    /// Convenience constructor for literal rows. A repeated column keeps its
    /// first position and its last value.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();
        for (k, v) in pairs {
            let (k, v) = (k.into(), v.into());
            match columns.iter().position(|c| *c == k) {
                Some(i) => values[i] = v,
                None => {
                    columns.push(k);
                    values.push(v);
                }
            }
        }
        Row {
            columns: columns.into(),
            values,
        }
    }

    /// Cell value for `column`, if the row has that column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i].as_str())
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Column names in header order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `(column, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// DataSpecifier – exact-match column filter
// ---------------------------------------------------------------------------

/// Column name → required cell value. An empty specifier selects every row.
pub type DataSpecifier = BTreeMap<String, String>;

/// Parse `column=value` terms into a [`DataSpecifier`].
///
/// The value is everything after the first `=`, so values may themselves
/// contain `=`. A later term for the same column replaces an earlier one.
pub fn parse_specifier<I, S>(terms: I) -> Result<DataSpecifier, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    terms
        .into_iter()
        .map(|term| {
            let term = term.as_ref();
            match term.split_once('=') {
                Some((column, value)) if !column.is_empty() => {
                    Ok((column.to_string(), value.to_string()))
                }
                _ => Err(format!("expected column=value, got '{term}'")),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Channels / ImageSize
// ---------------------------------------------------------------------------

/// Channel depth an image is converted to when loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channels {
    /// Single-channel luminance.
    #[default]
    Luma,
    /// Three-channel RGB.
    Rgb,
}

impl Channels {
    pub fn count(self) -> u8 {
        match self {
            Channels::Luma => 1,
            Channels::Rgb => 3,
        }
    }
}

/// `1` selects luminance; every other count selects RGB.
impl From<u8> for Channels {
    fn from(count: u8) -> Self {
        if count == 1 {
            Channels::Luma
        } else {
            Channels::Rgb
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for ImageSize {
    fn from((width, height): (u32, u32)) -> Self {
        ImageSize { width, height }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
