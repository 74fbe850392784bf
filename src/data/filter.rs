use super::model::{DataSpecifier, Row};

// ---------------------------------------------------------------------------
// Row predicate: does a row satisfy every column constraint?
// ---------------------------------------------------------------------------

/// Whether `row` matches `specifier`.
///
/// A row matches when, for every `(column, value)` in the specifier:
/// * the row has that column, and
/// * its cell equals `value` exactly (no trimming, no case folding).
///
/// A missing column is a non-match, not an error. An empty specifier
/// matches every row.
pub fn matches(row: &Row, specifier: &DataSpecifier) -> bool {
    specifier
        .iter()
        .all(|(column, value)| row.get(column) == Some(value.as_str()))
}

/// Rows passing `specifier`, in their original order. `None` passes
/// everything through.
pub fn filter_rows(rows: Vec<Row>, specifier: Option<&DataSpecifier>) -> Vec<Row> {
    match specifier {
        None => rows,
        Some(spec) => rows.into_iter().filter(|row| matches(row, spec)).collect(),
    }
}
