//! Per-stream enriched views and unmapped-key diagnostics.
//!
//! Each enriched view keeps every source row. Rows whose join key has no
//! lookup entry carry null classification columns; those keys are counted,
//! appended to [`UNMAPPED_LOG`] and summarized in one warning per stream.

use std::collections::BTreeMap;

use chrono::Utc;
use duckdb::params;
use serde::Serialize;

use nps_model::Stream;
use nps_model::columns::{
    COGNITIVE_ATTRIBUTE_COLUMNS, DOMAIN, ENRICHMENT_COLUMNS, JOIN_KEY, NARROW, STREAM, SUBDOMAIN,
};

use crate::connection::ConnectionManager;
use crate::error::{EngineError, Result};
use crate::lookup::{LOOKUP_RESOLVED_VIEW, LookupBootstrapper};
use crate::sql::{identifier_columns, join_key_expr, quote_ident, quote_literal};

/// Append-only log of unmatched join keys.
pub const UNMAPPED_LOG: &str = "unmapped_keys_log";

/// Keys listed in the per-stream warning.
const WARNING_EXAMPLES: usize = 10;

/// A join key no lookup row matched, with its row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmappedKey {
    pub key: String,
    pub count: i64,
}

/// What one stream's rebuild produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentReport {
    pub stream: Stream,
    /// Source relation the view reads.
    pub source: String,
    /// Name of the enriched view.
    pub view: String,
    /// Distinct unmatched keys, most frequent first.
    pub unmapped: Vec<UnmappedKey>,
    /// Rows with no usable scale, test or test_name value.
    pub unkeyed_rows: i64,
}

impl EnrichmentReport {
    pub fn is_fully_mapped(&self) -> bool {
        self.unmapped.is_empty() && self.unkeyed_rows == 0
    }

    /// The warning line emitted for unclassified rows, if any.
    pub fn warning(&self) -> Option<String> {
        if self.unmapped.is_empty() {
            return (self.unkeyed_rows > 0).then(|| {
                format!(
                    "{}: {} in {}",
                    self.stream,
                    unkeyed_note(self.unkeyed_rows),
                    self.view
                )
            });
        }
        let examples: Vec<&str> = self
            .unmapped
            .iter()
            .take(WARNING_EXAMPLES)
            .map(|key| key.key.as_str())
            .collect();
        let mut line = format!(
            "{}: {} unmapped join key{} in {} (e.g. {})",
            self.stream,
            self.unmapped.len(),
            if self.unmapped.len() == 1 { "" } else { "s" },
            self.view,
            examples.join(", ")
        );
        if self.unmapped.len() > WARNING_EXAMPLES {
            line.push_str(&format!(
                " and {} more",
                self.unmapped.len() - WARNING_EXAMPLES
            ));
        }
        if self.unkeyed_rows > 0 {
            line.push_str(&format!("; {}", unkeyed_note(self.unkeyed_rows)));
        }
        Some(line)
    }
}

fn unkeyed_note(rows: i64) -> String {
    format!(
        "{rows} row{} without a join key",
        if rows == 1 { "" } else { "s" }
    )
}

/// Builds the `<stream>_enriched` views.
#[derive(Debug, Clone)]
pub struct EnrichmentViewBuilder {
    sources: BTreeMap<Stream, String>,
}

impl Default for EnrichmentViewBuilder {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl EnrichmentViewBuilder {
    /// Streams without an entry read from the relation named after the stream tag.
    pub fn new(sources: BTreeMap<Stream, String>) -> Self {
        Self { sources }
    }

    /// Source relation for a stream.
    pub fn source_for(&self, stream: Stream) -> &str {
        self.sources
            .get(&stream)
            .map(String::as_str)
            .unwrap_or_else(|| stream.as_str())
    }

    /// Rebuilds the enriched view of every stream whose source is registered.
    ///
    /// Streams without a queryable source are skipped and any stale view
    /// for them is dropped.
    pub fn refresh(
        &self,
        manager: &ConnectionManager,
        lookup: &LookupBootstrapper,
    ) -> Result<Vec<EnrichmentReport>> {
        lookup.ensure_registered(manager, false)?;

        let mut reports = Vec::new();
        for stream in Stream::ALL {
            let source = self.source_for(stream);
            let view = stream.enriched_view();
            if !manager.is_queryable(source)? {
                tracing::debug!(%stream, source, "No source relation; skipping enrichment");
                manager.drop_relation(&view)?;
                continue;
            }

            let columns = manager.relation_columns(source)?;
            if identifier_columns(&columns).is_empty() {
                tracing::warn!(
                    %stream,
                    source,
                    "Source has no scale, test or test_name column; no row can be classified"
                );
            }
            manager.execute_batch(&enriched_view_sql(stream, source, &view, &columns))?;

            let unmapped = self.log_unmapped(manager, stream, &view)?;
            let unkeyed_rows = count_unkeyed(manager, &view)?;
            let report = EnrichmentReport {
                stream,
                source: source.to_string(),
                view,
                unmapped,
                unkeyed_rows,
            };
            match report.warning() {
                Some(line) => tracing::warn!("{line}"),
                None => tracing::debug!(%stream, view = %report.view, "All join keys mapped"),
            }
            reports.push(report);
        }
        Ok(reports)
    }

    fn log_unmapped(
        &self,
        manager: &ConnectionManager,
        stream: Stream,
        view: &str,
    ) -> Result<Vec<UnmappedKey>> {
        let sql = format!(
            "SELECT {join_key}, count(*) AS n FROM {view} \
             WHERE {domain} IS NULL AND {join_key} IS NOT NULL \
             GROUP BY {join_key} ORDER BY n DESC, {join_key}",
            join_key = quote_ident(JOIN_KEY),
            domain = quote_ident(DOMAIN),
            view = quote_ident(view),
        );
        let conn = manager.conn()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|source| EngineError::query(&sql, source))?;
        let unmapped = stmt
            .query_map([], |row| {
                Ok(UnmappedKey {
                    key: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .map_err(|source| EngineError::query(&sql, source))?
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(|source| EngineError::query(&sql, source))?;

        if unmapped.is_empty() {
            return Ok(unmapped);
        }

        manager.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {log} \
             (logged_at TIMESTAMP, stream VARCHAR, join_key VARCHAR, n BIGINT)",
            log = quote_ident(UNMAPPED_LOG)
        ))?;
        let insert = format!(
            "INSERT INTO {} VALUES (CAST(? AS TIMESTAMP), ?, ?, ?)",
            quote_ident(UNMAPPED_LOG)
        );
        let logged_at = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        for key in &unmapped {
            manager.execute(
                &insert,
                params![logged_at, stream.as_str(), key.key, key.count],
            )?;
        }
        Ok(unmapped)
    }
}

fn count_unkeyed(manager: &ConnectionManager, view: &str) -> Result<i64> {
    let sql = format!(
        "SELECT count(*) FROM {} WHERE {} IS NULL",
        quote_ident(view),
        quote_ident(JOIN_KEY)
    );
    manager
        .conn()?
        .query_row(&sql, [], |row| row.get(0))
        .map_err(|source| EngineError::query(&sql, source))
}

/// View DDL for one stream.
///
/// Source columns that clash with enrichment columns are replaced. For
/// non-cognitive streams the cognitive attributes are null whatever the
/// lookup says.
fn enriched_view_sql(stream: Stream, source: &str, view: &str, columns: &[String]) -> String {
    let clashing: Vec<String> = columns
        .iter()
        .filter(|column| {
            ENRICHMENT_COLUMNS
                .iter()
                .any(|enrichment| enrichment.eq_ignore_ascii_case(column))
        })
        .map(|column| quote_ident(column))
        .collect();
    let exclude = if clashing.is_empty() {
        String::new()
    } else {
        format!(" EXCLUDE ({})", clashing.join(", "))
    };

    let mut selected: Vec<String> = [DOMAIN, SUBDOMAIN, NARROW]
        .iter()
        .map(|column| format!("l.{}", quote_ident(column)))
        .collect();
    for column in COGNITIVE_ATTRIBUTE_COLUMNS {
        let column = quote_ident(column);
        selected.push(if stream.is_cognitive() {
            format!("l.{column}")
        } else {
            format!("CAST(NULL AS VARCHAR) AS {column}")
        });
    }
    let tag = quote_literal(stream.as_str());
    selected.push(format!("{tag} AS {}", quote_ident(STREAM)));

    format!(
        "CREATE OR REPLACE VIEW {view} AS \
         WITH src AS (SELECT *{exclude}, {key} AS {join_key} FROM {source}) \
         SELECT src.*, {selected} \
         FROM src LEFT JOIN {resolved} l \
         ON l.{join_key} = src.{join_key} AND l.{stream_col} = {tag}",
        view = quote_ident(view),
        key = join_key_expr(None, columns),
        join_key = quote_ident(JOIN_KEY),
        source = quote_ident(source),
        selected = selected.join(", "),
        resolved = quote_ident(LOOKUP_RESOLVED_VIEW),
        stream_col = quote_ident(STREAM),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(keys: &[(&str, i64)]) -> EnrichmentReport {
        EnrichmentReport {
            stream: Stream::Cognitive,
            source: "neurocog".to_string(),
            view: "neurocog_enriched".to_string(),
            unmapped: keys
                .iter()
                .map(|(key, count)| UnmappedKey {
                    key: (*key).to_string(),
                    count: *count,
                })
                .collect(),
            unkeyed_rows: 0,
        }
    }

    #[test]
    fn test_warning_line() {
        let report = report(&[("trail making b", 3), ("rey-o copy", 1)]);
        insta::assert_snapshot!(
            report.warning().unwrap(),
            @"neurocog: 2 unmapped join keys in neurocog_enriched (e.g. trail making b, rey-o copy)"
        );
    }

    #[test]
    fn test_warning_lists_at_most_ten_examples() {
        let keys: Vec<(String, i64)> = (0..12).map(|i| (format!("k{i:02}"), 1)).collect();
        let keys: Vec<(&str, i64)> = keys.iter().map(|(k, n)| (k.as_str(), *n)).collect();
        let line = report(&keys).warning().unwrap();
        assert!(line.contains("k09"));
        assert!(!line.contains("k10"));
        assert!(line.ends_with(" and 2 more"));
    }

    #[test]
    fn test_fully_mapped_has_no_warning() {
        assert!(report(&[]).warning().is_none());
        assert!(report(&[]).is_fully_mapped());
    }

    #[test]
    fn test_unkeyed_rows_are_reported() {
        let mut only_unkeyed = report(&[]);
        only_unkeyed.unkeyed_rows = 2;
        assert!(!only_unkeyed.is_fully_mapped());
        insta::assert_snapshot!(
            only_unkeyed.warning().unwrap(),
            @"neurocog: 2 rows without a join key in neurocog_enriched"
        );

        let mut both = report(&[("rey-o copy", 1)]);
        both.unkeyed_rows = 1;
        assert!(both.warning().unwrap().ends_with("; 1 row without a join key"));
    }

    #[test]
    fn test_view_sql_excludes_clashing_columns_in_any_case() {
        let columns = vec!["Scale".to_string(), "Domain".to_string(), "Percentile".to_string()];
        let sql = enriched_view_sql(Stream::Cognitive, "neurocog", "neurocog_enriched", &columns);
        assert!(sql.contains("EXCLUDE (\"Domain\")"));
        assert!(sql.contains("CAST(\"Scale\" AS VARCHAR)"));
    }

    #[test]
    fn test_view_sql_nulls_attributes_for_other_streams() {
        let columns = vec!["scale".to_string(), "pass".to_string(), "z".to_string()];
        let sql = enriched_view_sql(Stream::Behavioral, "neurobehav", "neurobehav_enriched", &columns);
        assert!(sql.contains("EXCLUDE (\"pass\")"));
        assert!(sql.contains("CAST(NULL AS VARCHAR) AS \"pass\""));
        assert!(!sql.contains("l.\"pass\""));

        let sql = enriched_view_sql(Stream::Cognitive, "neurocog", "neurocog_enriched", &columns);
        assert!(sql.contains("l.\"pass\""));
    }
}
