//! Embedded-engine layer for score enrichment.
//!
//! Source exports are registered as DuckDB relations, matched against the
//! master lookup through a normalized join key, and summarized per
//! category. Components, leaves first:
//!
//! - [`ConnectionManager`]: owns the engine handle and its capabilities
//! - [`RelationRegistrar`]: files to named relations, with format priority
//!   and row-text fallback
//! - [`LookupBootstrapper`]: the injected lookup plus its join-key views
//! - [`DomainReferenceBuilder`]: the deduplicated category taxonomy
//! - [`EnrichmentViewBuilder`]: per-stream enriched views and the
//!   unmapped-key log
//! - [`SummaryEngine`]: category statistics and `process` row sets
//!
//! [`Session`] wires them together.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use nps_engine::{Session, SessionConfig};
//! use nps_model::SummaryOptions;
//!
//! let lookup = nps_ingest::load_lookup_csv(Path::new("data/lookup.csv"))?;
//! let session = Session::open(SessionConfig::default().with_data_dir("data"), lookup)?;
//! for row in session.domain_summary(SummaryOptions::default())? {
//!     println!("{} {}", row.category, row.count);
//! }
//! ```

pub mod config;
pub mod connection;
pub mod domains;
pub mod enrich;
pub mod error;
pub mod frame;
pub mod lookup;
pub mod registrar;
pub mod session;
pub mod sql;
pub mod summary;

pub use config::SessionConfig;
pub use connection::{
    Capabilities, Capability, ConnectionManager, ConnectionOptions, ConnectionTarget,
    ExtensionSpec, RelationKind,
};
pub use domains::{DOMAINS_REF, DomainReferenceBuilder};
pub use enrich::{EnrichmentReport, EnrichmentViewBuilder, UNMAPPED_LOG, UnmappedKey};
pub use error::{EngineError, Result};
pub use lookup::{LOOKUP_RESOLVED_VIEW, LOOKUP_VIEW, LookupBootstrapper};
pub use registrar::{DirectoryScan, RelationRegistrar, SkippedFile};
pub use session::Session;
pub use sql::Ident;
pub use summary::SummaryEngine;
