/// Data layer: core types, loading, and cell decoding.
///
/// Architecture:
/// ```text
///  file.parquet  or  dir/**/*.parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  read + schema check → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Table    │  record batches, rows decoded on demand (cell)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  record   │  row identifier, audio payload
///   └──────────┘
/// ```

pub mod cell;
pub mod loader;
pub mod model;
pub mod record;
