//! Data model for neuropsychological score enrichment.
//!
//! These types carry no I/O. They are shared by the ingest layer, the
//! embedded-engine layer and the CLI.
//!
//! - [`Stream`]: source category tag (cognitive, behavioral, validity)
//! - [`SourceFormat`]: on-disk export format, with its discovery priority
//! - [`JoinKey`]: normalized identifier matching source rows to lookup rows
//! - [`Relation`]: a registered, queryable relation
//! - [`SummaryRow`] / [`SummaryOptions`]: category-level statistics

pub mod columns;
pub mod enums;
pub mod error;
pub mod join_key;
pub mod relation;
pub mod summary;

pub use enums::{SourceFormat, Stream, SummaryLevel};
pub use error::{ModelError, Result};
pub use join_key::JoinKey;
pub use relation::Relation;
pub use summary::{SummaryOptions, SummaryRow};
