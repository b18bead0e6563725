//! Identifier and literal handling for generated SQL.
//!
//! Relation names the library creates go through [`Ident`]'s allow-list.
//! Column names read back from the engine catalog are quoted with
//! [`quote_ident`]. File paths embedded in view definitions use
//! [`quote_literal`], since view DDL cannot take bind parameters.
//! Data values are always bound.

use std::fmt;

use nps_model::columns::{SCALE, TEST, TEST_NAME};

use crate::error::{EngineError, Result};

const MAX_IDENT_LEN: usize = 63;

/// A validated relation name: `[A-Za-z_][A-Za-z0-9_]*`, at most 63 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ident(String);

impl Ident {
    /// Validates an explicit name, rejecting anything outside the allow-list.
    pub fn new(name: &str) -> Result<Self> {
        if is_valid(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(EngineError::InvalidIdentifier {
                name: name.to_string(),
            })
        }
    }

    /// Derives a name from free text such as a file stem.
    ///
    /// Characters outside the allow-list become `_`; a leading digit gets a
    /// `_` prefix.
    pub fn sanitize(raw: &str) -> Result<Self> {
        let mut name: String = raw
            .trim()
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect();
        if name.starts_with(|ch: char| ch.is_ascii_digit()) {
            name.insert(0, '_');
        }
        name.truncate(MAX_IDENT_LEN);
        Self::new(&name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for embedding in SQL.
    pub fn quoted(&self) -> String {
        quote_ident(&self.0)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENT_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Quotes an identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Leading and trailing whitespace, matching what `str::trim` strips.
const EDGE_WHITESPACE: &str = r"^[\s\v\x{85}\p{Z}]+|[\s\v\x{85}\p{Z}]+$";

/// Catalog spelling of `name` among `available`, compared ASCII case-insensitively.
///
/// The engine resolves identifiers without regard to case, so a source
/// header `Scale` is the `scale` column.
pub fn find_column<'a>(available: &'a [String], name: &str) -> Option<&'a str> {
    available
        .iter()
        .find(|column| column.eq_ignore_ascii_case(name))
        .map(String::as_str)
}

/// Identifier columns present in `available`, in join-key precedence order.
pub fn identifier_columns(available: &[String]) -> Vec<&str> {
    [SCALE, TEST, TEST_NAME]
        .iter()
        .filter_map(|column| find_column(available, column))
        .collect()
}

/// Strips Unicode whitespace from both ends of a text expression.
pub fn trim_expr(expr: &str) -> String {
    format!("regexp_replace({expr}, {}, '', 'g')", quote_literal(EDGE_WHITESPACE))
}

/// SQL expression computing the join key over the identifier columns present.
///
/// Mirrors [`nps_model::JoinKey::from_identifiers`]: each identifier is
/// cast to text, trimmed and case-folded, empty strings count as absent,
/// and the first non-empty one wins.
pub fn join_key_expr(qualifier: Option<&str>, available: &[String]) -> String {
    let parts: Vec<String> = identifier_columns(available)
        .into_iter()
        .map(|column| {
            let column = match qualifier {
                Some(q) => format!("{q}.{}", quote_ident(column)),
                None => quote_ident(column),
            };
            format!(
                "NULLIF(lower({}), '')",
                trim_expr(&format!("CAST({column} AS VARCHAR)"))
            )
        })
        .collect();

    match parts.len() {
        0 => "CAST(NULL AS VARCHAR)".to_string(),
        1 => parts[0].clone(),
        _ => format!("COALESCE({})", parts.join(", ")),
    }
}

/// Numeric view of a column that may be absent or stored as text.
pub fn numeric_expr(column: &str, available: &[String]) -> String {
    match find_column(available, column) {
        Some(name) => format!("TRY_CAST({} AS DOUBLE)", quote_ident(name)),
        None => "CAST(NULL AS DOUBLE)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_ident_allow_list() {
        assert!(Ident::new("neurocog").is_ok());
        assert!(Ident::new("_lookup_raw").is_ok());
        assert!(Ident::new("x; DROP TABLE lookup").is_err());
        assert!(Ident::new("1abc").is_err());
        assert!(Ident::new("").is_err());
        assert!(Ident::new(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_sanitize_file_stems() {
        assert_eq!(Ident::sanitize("neurocog-2024").unwrap().as_str(), "neurocog_2024");
        assert_eq!(Ident::sanitize("2024 export").unwrap().as_str(), "_2024_export");
        assert!(Ident::sanitize("   ").is_err());
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident("Raw \"Score\""), "\"Raw \"\"Score\"\"\"");
        assert_eq!(quote_literal("/data/o'brien.csv"), "'/data/o''brien.csv'");
    }

    #[test]
    fn test_join_key_expr_uses_present_columns() {
        let expr = join_key_expr(None, &names(&["scale", "percentile"]));
        assert!(expr.starts_with("NULLIF(lower(regexp_replace(CAST(\"scale\" AS VARCHAR), "));

        let expr = join_key_expr(Some("s"), &names(&["test_name", "scale"]));
        assert!(expr.starts_with("COALESCE(NULLIF(lower(regexp_replace(CAST(s.\"scale\""));
        assert!(expr.contains("s.\"test_name\""));

        assert_eq!(join_key_expr(None, &names(&["z"])), "CAST(NULL AS VARCHAR)");
    }

    #[test]
    fn test_columns_match_regardless_of_case() {
        let columns = names(&["Scale", "Percentile", "TEST_NAME"]);
        assert_eq!(find_column(&columns, "scale"), Some("Scale"));
        assert_eq!(identifier_columns(&columns), vec!["Scale", "TEST_NAME"]);

        let expr = join_key_expr(None, &columns);
        assert!(expr.contains("CAST(\"Scale\" AS VARCHAR)"));
        assert!(expr.contains("CAST(\"TEST_NAME\" AS VARCHAR)"));
        assert_eq!(
            numeric_expr("percentile", &columns),
            "TRY_CAST(\"Percentile\" AS DOUBLE)"
        );
    }

    #[test]
    fn test_numeric_expr() {
        assert_eq!(
            numeric_expr("z", &names(&["z"])),
            "TRY_CAST(\"z\" AS DOUBLE)"
        );
        assert_eq!(numeric_expr("z", &names(&["scale"])), "CAST(NULL AS DOUBLE)");
    }

    #[test]
    fn test_trimmed_key_matches_join_key_normalize() {
        let conn = duckdb::Connection::open_in_memory().unwrap();
        for raw in ["Block Design\t", "\r\nBlock Design ", "\u{a0}Block Design\u{3000}"] {
            let sql = format!("SELECT lower({})", trim_expr("CAST(? AS VARCHAR)"));
            let key: String = conn.query_row(&sql, [raw], |row| row.get(0)).unwrap();
            let expected = nps_model::JoinKey::normalize(raw).unwrap();
            assert_eq!(key, expected.as_str(), "input {raw:?}");
        }
    }
}
