use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::SourceFormat;

/// A named, queryable virtual table backed by exactly one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation name, unique within the session.
    pub name: String,
    /// File the relation reads from.
    pub path: PathBuf,
    /// Format actually used to register the relation.
    pub format: SourceFormat,
    pub registered_at: DateTime<Utc>,
    /// Set when a columnar registration fell back to a row-text sibling.
    pub fallback_from: Option<SourceFormat>,
}

impl Relation {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, format: SourceFormat) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            format,
            registered_at: Utc::now(),
            fallback_from: None,
        }
    }

    #[must_use]
    pub fn with_fallback_from(mut self, format: SourceFormat) -> Self {
        self.fallback_from = Some(format);
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback_from.is_some()
    }
}
