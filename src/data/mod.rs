/// Data layer: row and image types, decoding, and filtering.
///
/// Architecture:
/// ```text
///  .csv bytes          image bytes
///        │                  │
///        ▼                  ▼
///   ┌─────────────────────────────┐
///   │  loader                     │  parse CSV → Vec<Row>
///   │                             │  decode → DynamicImage / ImageSize
///   └─────────────────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  DataSpecifier exact-match → matching rows
///   └──────────┘
/// ```
///
/// Nothing here knows where bytes come from; the readers in
/// [`crate::reader`] feed this layer from a directory tree or a blob
/// container.

pub mod filter;
pub mod loader;
pub mod model;
