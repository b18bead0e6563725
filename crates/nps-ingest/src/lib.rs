//! Source ingestion for score enrichment.
//!
//! This crate covers the file-level side of the system: discovering
//! source exports per format, locating row-text siblings for fallback,
//! loading and validating the master lookup dataset, and reading
//! Arrow IPC / Feather files through polars.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use nps_ingest::{list_files, load_lookup_csv};
//! use nps_model::SourceFormat;
//!
//! let lookup = load_lookup_csv(Path::new("data/lookup.csv"))?;
//! let exports = list_files(Path::new("data"), SourceFormat::Parquet)?;
//! ```

mod discovery;
mod error;
mod ipc;
mod lookup;
mod values;

// === Error Types ===
pub use error::{IngestError, Result};

// === File Discovery ===
pub use discovery::{base_name, format_of, list_files, row_text_sibling};

// === Lookup Dataset ===
pub use lookup::{LookupTable, load_lookup_csv};

// === Columnar Files ===
pub use ipc::{probe_array_library, read_ipc_file, write_ipc_file};

// === Value Helpers ===
pub use values::{any_to_string, format_numeric};
