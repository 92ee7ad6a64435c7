/// Data layer: domains, loading, and persistence.
///
/// Architecture:
/// ```text
///   <inputs>/*.csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  validate columns, flip y → Domain
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Domain   │  points + label columns (+ neighbourhood id)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  domains/<name>.parquet, csvs/<name>.csv
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod writer;
