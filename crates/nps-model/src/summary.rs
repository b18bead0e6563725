//! Category-level summary statistics.

use serde::{Deserialize, Serialize};

use crate::enums::{Stream, SummaryLevel};

/// Options for a domain summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryOptions {
    pub level: SummaryLevel,
    /// Also group by stream.
    pub by_stream: bool,
    /// Include reference categories that have no scored rows.
    pub include_all: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            level: SummaryLevel::Domain,
            by_stream: false,
            include_all: true,
        }
    }
}

impl SummaryOptions {
    #[must_use]
    pub fn at_level(level: SummaryLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_by_stream(mut self, enable: bool) -> Self {
        self.by_stream = enable;
        self
    }

    #[must_use]
    pub fn with_include_all(mut self, enable: bool) -> Self {
        self.include_all = enable;
        self
    }
}

/// One aggregated category.
///
/// Statistics are `None` when the category has no rows with a numeric percentile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub category: String,
    pub stream: Option<Stream>,
    pub count: i64,
    pub mean_z: Option<f64>,
    pub sd_z: Option<f64>,
    pub mean_percentile: Option<f64>,
    pub min_percentile: Option<f64>,
    pub max_percentile: Option<f64>,
}

impl SummaryRow {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
