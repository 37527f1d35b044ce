/// Data layer: core types, loading, storing, filtering and aggregation.
///
/// Architecture:
/// ```text
///  .csv / .xlsx / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Batch
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ DatasetStore  │  Yes/No → 1/0, split by Theme, append
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  Region / Income / Country predicates → row indices
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ pipeline  │  project → coerce → sentinel → aggregate → Table
///   └──────────┘
/// ```

pub mod country;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod table;
