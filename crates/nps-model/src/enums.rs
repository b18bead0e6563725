//! Type-safe enumerations for streams, source formats and summary levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::columns;
use crate::error::ModelError;

/// An independently sourced category of test data.
///
/// Only [`Stream::Cognitive`] may carry the cognitive-only attributes
/// (`pass`, `verbal`, `timed`); every other stream has them nulled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stream {
    /// Performance-based cognitive tests.
    #[serde(rename = "neurocog")]
    Cognitive,
    /// Behavioral and emotional rating scales.
    #[serde(rename = "neurobehav")]
    Behavioral,
    /// Performance and symptom validity measures.
    #[serde(rename = "validity")]
    Validity,
}

impl Stream {
    /// All known streams, in the order enriched views are built.
    pub const ALL: [Stream; 3] = [Stream::Cognitive, Stream::Behavioral, Stream::Validity];

    /// Returns the stream tag as stored in the lookup `stream` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Cognitive => "neurocog",
            Stream::Behavioral => "neurobehav",
            Stream::Validity => "validity",
        }
    }

    pub fn is_cognitive(&self) -> bool {
        matches!(self, Stream::Cognitive)
    }

    /// Name of the enriched view built for this stream.
    pub fn enriched_view(&self) -> String {
        format!("{}_enriched", self.as_str())
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stream {
    type Err = ModelError;

    /// Accepts the stream tag or a descriptive alias (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "neurocog" | "cognitive" => Ok(Stream::Cognitive),
            "neurobehav" | "behavioral" | "behavioural" => Ok(Stream::Behavioral),
            "validity" => Ok(Stream::Validity),
            _ => Err(ModelError::UnknownStream(s.to_string())),
        }
    }
}

/// On-disk representation of a source export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Columnar binary read natively by the engine (Parquet).
    Parquet,
    /// Columnar binary read through the array library (Arrow IPC / Feather).
    Feather,
    /// Delimited text with an auto-detected schema.
    RowText,
}

impl SourceFormat {
    /// Scan order for directory discovery: fastest representation first.
    pub const PRIORITY: [SourceFormat; 3] = [
        SourceFormat::Parquet,
        SourceFormat::Feather,
        SourceFormat::RowText,
    ];

    /// File extensions (lowercase, without dot) recognised for this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceFormat::Parquet => &["parquet"],
            SourceFormat::Feather => &["feather", "arrow", "ipc"],
            SourceFormat::RowText => &["csv", "tsv", "txt"],
        }
    }

    /// Lower rank wins when the same dataset exists in several formats.
    pub fn rank(&self) -> u8 {
        match self {
            SourceFormat::Parquet => 0,
            SourceFormat::Feather => 1,
            SourceFormat::RowText => 2,
        }
    }

    pub fn is_columnar(&self) -> bool {
        !matches!(self, SourceFormat::RowText)
    }

    /// Classifies a file name by its extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::PRIORITY
            .into_iter()
            .find(|format| format.extensions().contains(&ext.as_str()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Parquet => "parquet",
            SourceFormat::Feather => "feather",
            SourceFormat::RowText => "csv",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceFormat {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parquet" => Ok(SourceFormat::Parquet),
            "feather" | "arrow" | "ipc" => Ok(SourceFormat::Feather),
            "csv" | "tsv" | "txt" | "text" | "row_text" => Ok(SourceFormat::RowText),
            _ => Err(ModelError::UnknownFormat(s.to_string())),
        }
    }
}

/// Taxonomy level a summary is grouped at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryLevel {
    #[default]
    Domain,
    Subdomain,
    Narrow,
}

impl SummaryLevel {
    /// Column holding this level in the lookup and enriched views.
    pub fn column(&self) -> &'static str {
        match self {
            SummaryLevel::Domain => columns::DOMAIN,
            SummaryLevel::Subdomain => columns::SUBDOMAIN,
            SummaryLevel::Narrow => columns::NARROW,
        }
    }
}

impl fmt::Display for SummaryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

impl FromStr for SummaryLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "domain" | "category" => Ok(SummaryLevel::Domain),
            "subdomain" | "subcategory" => Ok(SummaryLevel::Subdomain),
            "narrow" | "narrow_category" => Ok(SummaryLevel::Narrow),
            _ => Err(ModelError::UnknownLevel(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_from_str() {
        assert_eq!("neurocog".parse::<Stream>().unwrap(), Stream::Cognitive);
        assert_eq!(" NeuroBehav ".parse::<Stream>().unwrap(), Stream::Behavioral);
        assert_eq!("validity".parse::<Stream>().unwrap(), Stream::Validity);
        assert!("adaptive".parse::<Stream>().is_err());
    }

    #[test]
    fn test_only_cognitive_is_cognitive() {
        let cognitive: Vec<_> = Stream::ALL.iter().filter(|s| s.is_cognitive()).collect();
        assert_eq!(cognitive, vec![&Stream::Cognitive]);
    }

    #[test]
    fn test_format_priority_is_descending() {
        let ranks: Vec<u8> = SourceFormat::PRIORITY.iter().map(SourceFormat::rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            SourceFormat::from_extension("PARQUET"),
            Some(SourceFormat::Parquet)
        );
        assert_eq!(
            SourceFormat::from_extension("feather"),
            Some(SourceFormat::Feather)
        );
        assert_eq!(SourceFormat::from_extension("tsv"), Some(SourceFormat::RowText));
        assert_eq!(SourceFormat::from_extension("xlsx"), None);
    }

    #[test]
    fn test_level_columns() {
        assert_eq!(SummaryLevel::Domain.column(), "domain");
        assert_eq!("subcategory".parse::<SummaryLevel>().unwrap().column(), "subdomain");
        assert_eq!(SummaryLevel::Narrow.to_string(), "narrow");
    }
}
