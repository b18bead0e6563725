//! Master lookup dataset.
//!
//! The lookup maps test identifiers to the domain / subdomain / narrow
//! taxonomy per stream. It is loaded once and handed to the engine
//! explicitly; nothing searches for it.

use std::path::Path;

use polars::prelude::*;

use nps_model::JoinKey;
use nps_model::columns::{
    COGNITIVE_ATTRIBUTE_COLUMNS, IDENTIFIER_COLUMNS, LOOKUP_COLUMNS, REQUIRED_LOOKUP_COLUMNS,
    SCALE, TEST, TEST_NAME,
};

use crate::error::{IngestError, Result};

/// A validated lookup dataset in canonical column layout.
///
/// Every column of [`LOOKUP_COLUMNS`] is present and typed as string;
/// absent identifier and cognitive-attribute columns are filled with nulls.
/// Row order is registration order, which decides synonym conflicts.
#[derive(Debug, Clone)]
pub struct LookupTable {
    frame: DataFrame,
}

impl LookupTable {
    /// Validates and normalizes a lookup frame.
    ///
    /// Column names are matched case-insensitively after trimming. Extra
    /// columns are dropped.
    pub fn from_frame(mut frame: DataFrame) -> Result<Self> {
        let renames: Vec<(String, String)> = frame
            .get_column_names()
            .iter()
            .map(|name| (name.to_string(), name.trim().to_lowercase()))
            .filter(|(old, new)| old != new)
            .collect();
        for (old, new) in renames {
            frame.rename(&old, new.into())?;
        }

        let present: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let has = |column: &str| present.iter().any(|name| name == column);

        let mut missing: Vec<String> = REQUIRED_LOOKUP_COLUMNS
            .iter()
            .filter(|column| !has(column))
            .map(|column| (*column).to_string())
            .collect();
        if !IDENTIFIER_COLUMNS.iter().any(|column| has(column)) {
            missing.push(format!("one of {}", IDENTIFIER_COLUMNS.join("/")));
        }
        if !missing.is_empty() {
            return Err(IngestError::MissingLookupColumns { columns: missing });
        }

        let height = frame.height();
        for column in IDENTIFIER_COLUMNS
            .iter()
            .chain(COGNITIVE_ATTRIBUTE_COLUMNS.iter())
        {
            if !has(column) {
                tracing::debug!(column, "Filling absent lookup column with nulls");
                frame.with_column(Series::full_null((*column).into(), height, &DataType::String))?;
            }
        }

        let columns = LOOKUP_COLUMNS
            .iter()
            .map(|name| {
                frame
                    .column(name)
                    .and_then(|column| column.cast(&DataType::String))
            })
            .collect::<PolarsResult<Vec<Column>>>()?;

        Ok(Self {
            frame: DataFrame::new(columns)?,
        })
    }

    /// The normalized frame, in [`LOOKUP_COLUMNS`] order.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Join key of every row, computed with the coalesce rule.
    pub fn join_keys(&self) -> Result<Vec<Option<JoinKey>>> {
        let scale = self.frame.column(SCALE)?.str()?;
        let test = self.frame.column(TEST)?.str()?;
        let test_name = self.frame.column(TEST_NAME)?.str()?;
        Ok(scale
            .iter()
            .zip(test.iter())
            .zip(test_name.iter())
            .map(|((scale, test), test_name)| JoinKey::from_identifiers(scale, test, test_name))
            .collect())
    }

    /// Rows with no usable identifier; these can never match a source row.
    pub fn unmatchable_rows(&self) -> Result<usize> {
        Ok(self.join_keys()?.iter().filter(|key| key.is_none()).count())
    }
}

/// Loads a lookup dataset from a CSV file.
///
/// All columns are read as strings; classification values are never inferred
/// as numbers.
pub fn load_lookup_csv(path: &Path) -> Result<LookupTable> {
    if !path.is_file() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let table = LookupTable::from_frame(frame)?;
    tracing::info!(
        path = %path.display(),
        rows = table.len(),
        "Loaded lookup dataset"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(columns: Vec<(&str, Vec<Option<&str>>)>) -> DataFrame {
        let cols: Vec<Column> = columns
            .into_iter()
            .map(|(name, values)| Series::new(name.into(), values).into_column())
            .collect();
        DataFrame::new(cols).unwrap()
    }

    #[test]
    fn test_missing_required_columns_are_named() {
        let df = frame(vec![
            ("stream", vec![Some("neurocog")]),
            ("domain", vec![Some("Memory")]),
        ]);
        let err = LookupTable::from_frame(df).unwrap_err();
        match err {
            IngestError::MissingLookupColumns { columns } => {
                assert_eq!(
                    columns,
                    vec![
                        "subdomain".to_string(),
                        "narrow".to_string(),
                        "one of scale/test/test_name".to_string()
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_optional_columns_are_filled() {
        let df = frame(vec![
            ("Stream", vec![Some("neurocog")]),
            ("DOMAIN", vec![Some("Memory")]),
            ("subdomain", vec![Some("Verbal Memory")]),
            ("narrow", vec![Some("Recall")]),
            ("test_name", vec![Some("List Learning")]),
            ("notes", vec![Some("dropped")]),
        ]);
        let table = LookupTable::from_frame(df).unwrap();
        let names: Vec<String> = table
            .frame()
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, LOOKUP_COLUMNS.to_vec());
        assert_eq!(table.frame().column("pass").unwrap().null_count(), 1);
        assert_eq!(table.frame().column("scale").unwrap().null_count(), 1);
    }

    #[test]
    fn test_join_keys_and_unmatchable_rows() {
        let df = frame(vec![
            ("stream", vec![Some("neurocog"), Some("neurocog"), Some("neurobehav")]),
            ("domain", vec![Some("Memory"), Some("Attention"), Some("Mood")]),
            ("subdomain", vec![Some("a"), Some("b"), Some("c")]),
            ("narrow", vec![Some("x"), Some("y"), Some("z")]),
            ("scale", vec![Some(" Block Design "), Some(""), None]),
            ("test", vec![None, Some("  "), None]),
        ]);
        let table = LookupTable::from_frame(df).unwrap();
        let keys = table.join_keys().unwrap();
        assert_eq!(keys[0].as_ref().map(JoinKey::as_str), Some("block design"));
        assert_eq!(keys[1], None);
        assert_eq!(table.unmatchable_rows().unwrap(), 2);
    }
}
