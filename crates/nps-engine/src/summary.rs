//! Category-level statistics and per-category row sets.

use duckdb::params_from_iter;
use polars::prelude::DataFrame;

use nps_model::columns::{DOMAIN, JOIN_KEY, NARROW, PERCENTILE, SCALE, STREAM, SUBDOMAIN, Z};
use nps_model::{Stream, SummaryOptions, SummaryRow};

use crate::connection::ConnectionManager;
use crate::domains::DOMAINS_REF;
use crate::error::{EngineError, Result};
use crate::frame::query_frame;
use crate::sql::{find_column, numeric_expr, quote_ident, quote_literal, trim_expr};

/// Aggregates and filters the enriched views.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryEngine;

impl SummaryEngine {
    /// Summary statistics per category across every enriched stream.
    ///
    /// Only rows with a numeric percentile and a non-null category count.
    /// With `include_all` and an existing reference relation, reference
    /// categories without data appear with a zero count and null
    /// statistics. Ordered by mean percentile descending (nulls last), then
    /// category name.
    pub fn domain_summary(
        &self,
        manager: &ConnectionManager,
        options: SummaryOptions,
    ) -> Result<Vec<SummaryRow>> {
        let sql = self.summary_sql(manager, options)?;
        tracing::debug!(level = %options.level, by_stream = options.by_stream, "Computing domain summary");

        let conn = manager.conn()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|source| EngineError::query(&sql, source))?;
        let rows = stmt
            .query_map([], |row| {
                let stream: Option<String> = row.get(1)?;
                Ok(SummaryRow {
                    category: row.get(0)?,
                    stream: stream.and_then(|s| s.parse::<Stream>().ok()),
                    count: row.get(2)?,
                    mean_z: row.get(3)?,
                    sd_z: row.get(4)?,
                    mean_percentile: row.get(5)?,
                    min_percentile: row.get(6)?,
                    max_percentile: row.get(7)?,
                })
            })
            .map_err(|source| EngineError::query(&sql, source))?
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(|source| EngineError::query(&sql, source))?;
        Ok(rows)
    }

    fn summary_sql(&self, manager: &ConnectionManager, options: SummaryOptions) -> Result<String> {
        let level = quote_ident(options.level.column());
        let stream_col = quote_ident(STREAM);

        let mut parts = Vec::new();
        for stream in Stream::ALL {
            let view = stream.enriched_view();
            if !manager.is_queryable(&view)? {
                continue;
            }
            let columns = manager.relation_columns(&view)?;
            parts.push(format!(
                "SELECT {domain}, {subdomain}, {narrow}, {stream_col}, \
                 {percentile_expr} AS {percentile}, {z_expr} AS {z} FROM {view}",
                domain = quote_ident(DOMAIN),
                subdomain = quote_ident(SUBDOMAIN),
                narrow = quote_ident(NARROW),
                percentile_expr = numeric_expr(PERCENTILE, &columns),
                percentile = quote_ident(PERCENTILE),
                z_expr = numeric_expr(Z, &columns),
                z = quote_ident(Z),
                view = quote_ident(&view),
            ));
        }
        let enriched = if parts.is_empty() {
            tracing::warn!("No enriched views; summary will only list reference categories");
            format!(
                "SELECT CAST(NULL AS VARCHAR) AS {domain}, CAST(NULL AS VARCHAR) AS {subdomain}, \
                 CAST(NULL AS VARCHAR) AS {narrow}, CAST(NULL AS VARCHAR) AS {stream_col}, \
                 CAST(NULL AS DOUBLE) AS {percentile}, CAST(NULL AS DOUBLE) AS {z} WHERE false",
                domain = quote_ident(DOMAIN),
                subdomain = quote_ident(SUBDOMAIN),
                narrow = quote_ident(NARROW),
                percentile = quote_ident(PERCENTILE),
                z = quote_ident(Z),
            )
        } else {
            parts.join(" UNION ALL ")
        };

        let (group_stream, select_stream) = if options.by_stream {
            (format!(", {stream_col}"), format!("{stream_col} AS stream"))
        } else {
            (String::new(), "CAST(NULL AS VARCHAR) AS stream".to_string())
        };
        let percentile = quote_ident(PERCENTILE);
        let z = quote_ident(Z);
        let aggregate = format!(
            "SELECT {level} AS category, {select_stream}, count(*) AS n, \
             avg({z}) AS mean_z, stddev_samp({z}) AS sd_z, \
             avg({percentile}) AS mean_percentile, \
             min({percentile}) AS min_percentile, max({percentile}) AS max_percentile \
             FROM enriched WHERE {percentile} IS NOT NULL AND {level} IS NOT NULL \
             GROUP BY {level}{group_stream}"
        );

        let order = if options.by_stream {
            "ORDER BY mean_percentile DESC NULLS LAST, category ASC, stream ASC"
        } else {
            "ORDER BY mean_percentile DESC NULLS LAST, category ASC"
        };

        let with_reference = options.include_all && manager.is_queryable(DOMAINS_REF)?;
        if options.include_all && !with_reference {
            tracing::info!("Domain reference absent; summary lists only categories with data");
        }

        if !with_reference {
            return Ok(format!(
                "WITH enriched AS ({enriched}), agg AS ({aggregate}) \
                 SELECT category, stream, n, mean_z, sd_z, mean_percentile, min_percentile, max_percentile \
                 FROM agg {order}"
            ));
        }

        let known: Vec<String> = Stream::ALL.iter().map(|s| quote_literal(s.as_str())).collect();
        let (reference, join_stream, stream_out) = if options.by_stream {
            (
                format!(
                    "SELECT DISTINCT {level} AS category, {stream_col} AS stream FROM {domains} \
                     WHERE {level} IS NOT NULL AND {stream_col} IN ({known})",
                    domains = quote_ident(DOMAINS_REF),
                    known = known.join(", ")
                ),
                " AND r.stream = a.stream",
                "COALESCE(r.stream, a.stream) AS stream",
            )
        } else {
            (
                format!(
                    "SELECT DISTINCT {level} AS category FROM {domains} WHERE {level} IS NOT NULL",
                    domains = quote_ident(DOMAINS_REF)
                ),
                "",
                "CAST(NULL AS VARCHAR) AS stream",
            )
        };

        Ok(format!(
            "WITH enriched AS ({enriched}), agg AS ({aggregate}), ref AS ({reference}) \
             SELECT COALESCE(r.category, a.category) AS category, {stream_out}, \
             COALESCE(a.n, 0) AS n, a.mean_z, a.sd_z, a.mean_percentile, \
             a.min_percentile, a.max_percentile \
             FROM ref r FULL JOIN agg a ON r.category = a.category{join_stream} \
             {order}"
        ))
    }

    /// Rows of one stream's enriched view in one domain, highest percentile first.
    ///
    /// `scales` restricts the rows by scale name (case and padding
    /// insensitive); without a `scale` column the join key is matched.
    pub fn process(
        &self,
        manager: &ConnectionManager,
        category: &str,
        stream: Stream,
        scales: &[&str],
    ) -> Result<DataFrame> {
        let view = stream.enriched_view();
        let columns = manager.relation_columns(&view)?;

        let mut params: Vec<String> = vec![category.to_string()];
        let mut sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            quote_ident(&view),
            quote_ident(DOMAIN)
        );
        if !scales.is_empty() {
            let filter = match find_column(&columns, SCALE) {
                Some(scale) => format!(
                    "lower({})",
                    trim_expr(&format!("CAST({} AS VARCHAR)", quote_ident(scale)))
                ),
                None => quote_ident(JOIN_KEY),
            };
            let placeholders = vec!["?"; scales.len()].join(", ");
            sql.push_str(&format!(" AND {filter} IN ({placeholders})"));
            params.extend(scales.iter().map(|s| s.trim().to_lowercase()));
        }
        sql.push_str(&format!(
            " ORDER BY {} DESC NULLS LAST",
            numeric_expr(PERCENTILE, &columns)
        ));

        let frame = query_frame(manager.conn()?, &sql, params_from_iter(params.iter()))?;
        tracing::debug!(%stream, category, rows = frame.height(), "Processed category");
        Ok(frame)
    }
}
