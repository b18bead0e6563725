//! Registration of the master lookup and its join-key views.

use nps_ingest::LookupTable;
use nps_model::columns::{IDENTIFIER_COLUMNS, JOIN_KEY, STREAM};

use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::frame::load_frame;
use crate::sql::{Ident, join_key_expr, quote_ident, trim_expr};

/// Internal table holding the lookup rows as loaded.
pub const LOOKUP_TABLE: &str = "_lookup_raw";
/// Stable view over the lookup with a normalized stream and a join key.
pub const LOOKUP_VIEW: &str = "lookup";
/// One row per (join key, stream): the last registered synonym.
pub const LOOKUP_RESOLVED_VIEW: &str = "lookup_resolved";
/// Registration ordinal used to resolve synonym conflicts.
pub const LOOKUP_ORDINAL: &str = "_lookup_ord";

/// Puts the injected lookup dataset into the engine.
#[derive(Debug, Clone)]
pub struct LookupBootstrapper {
    lookup: LookupTable,
}

impl LookupBootstrapper {
    pub fn new(lookup: LookupTable) -> Self {
        Self { lookup }
    }

    pub fn lookup(&self) -> &LookupTable {
        &self.lookup
    }

    /// Registers the lookup unless it is already queryable.
    ///
    /// Returns `true` when the relations were (re)built. With `force` the
    /// table and both views are rebuilt from the in-process dataset.
    pub fn ensure_registered(&self, manager: &ConnectionManager, force: bool) -> Result<bool> {
        if !force
            && manager.is_queryable(LOOKUP_VIEW)?
            && manager.is_queryable(LOOKUP_RESOLVED_VIEW)?
        {
            tracing::debug!("Lookup already registered");
            return Ok(false);
        }

        let unmatchable = self.lookup.unmatchable_rows()?;
        if unmatchable > 0 {
            tracing::warn!(
                rows = unmatchable,
                "Lookup rows without scale, test or test_name can never match a source row"
            );
        }

        let frame = self
            .lookup
            .frame()
            .with_row_index(LOOKUP_ORDINAL.into(), None)?;

        manager.drop_relation(LOOKUP_RESOLVED_VIEW)?;
        manager.drop_relation(LOOKUP_VIEW)?;
        manager.drop_relation(LOOKUP_TABLE)?;
        load_frame(manager.conn()?, &Ident::new(LOOKUP_TABLE)?, &frame)?;

        let identifiers: Vec<String> = IDENTIFIER_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        let stream = quote_ident(STREAM);
        manager.execute_batch(&format!(
            "CREATE VIEW {view} AS \
             SELECT * REPLACE (lower({trimmed}) AS {stream}), {key} AS {join_key} \
             FROM {table}",
            view = quote_ident(LOOKUP_VIEW),
            trimmed = trim_expr(&stream),
            key = join_key_expr(None, &identifiers),
            join_key = quote_ident(JOIN_KEY),
            table = quote_ident(LOOKUP_TABLE),
        ))?;
        manager.execute_batch(&format!(
            "CREATE VIEW {resolved} AS \
             SELECT * FROM {view} \
             WHERE {join_key} IS NOT NULL \
             QUALIFY row_number() OVER (PARTITION BY {join_key}, {stream} ORDER BY {ord} DESC) = 1",
            resolved = quote_ident(LOOKUP_RESOLVED_VIEW),
            view = quote_ident(LOOKUP_VIEW),
            join_key = quote_ident(JOIN_KEY),
            ord = quote_ident(LOOKUP_ORDINAL),
        ))?;

        tracing::info!(rows = self.lookup.len(), "Lookup registered");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionOptions;
    use polars::prelude::*;

    fn manager() -> ConnectionManager {
        let mut manager = ConnectionManager::new(ConnectionOptions {
            install_extensions: false,
            ..ConnectionOptions::default()
        });
        manager.connect().unwrap();
        manager
    }

    fn lookup() -> LookupTable {
        let frame = df!(
            "stream" => ["NeuroCog ", "neurocog", "neurobehav"],
            "domain" => ["Memory", "Attention", "Mood"],
            "subdomain" => ["Verbal", "Working Memory", "Depression"],
            "narrow" => ["Recall", "Span", "Symptoms"],
            "scale" => ["Block Design", " BLOCK DESIGN", "BDI-2"]
        )
        .unwrap();
        LookupTable::from_frame(frame).unwrap()
    }

    fn scalar<T: duckdb::types::FromSql>(manager: &ConnectionManager, sql: &str) -> T {
        manager.conn().unwrap().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_registers_views_with_join_key() {
        let manager = manager();
        let bootstrapper = LookupBootstrapper::new(lookup());
        assert!(bootstrapper.ensure_registered(&manager, false).unwrap());

        let streams: i64 = scalar(
            &manager,
            "SELECT count(*) FROM lookup WHERE stream = 'neurocog' AND join_key = 'block design'",
        );
        assert_eq!(streams, 2);
    }

    #[test]
    fn test_last_registered_synonym_wins() {
        let manager = manager();
        let bootstrapper = LookupBootstrapper::new(lookup());
        bootstrapper.ensure_registered(&manager, false).unwrap();

        let domain: String = scalar(
            &manager,
            "SELECT domain FROM lookup_resolved WHERE join_key = 'block design' AND stream = 'neurocog'",
        );
        assert_eq!(domain, "Attention");
        let rows: i64 = scalar(&manager, "SELECT count(*) FROM lookup_resolved");
        assert_eq!(rows, 2);
    }

    #[test]
    fn test_second_call_is_noop_unless_forced() {
        let manager = manager();
        let bootstrapper = LookupBootstrapper::new(lookup());
        assert!(bootstrapper.ensure_registered(&manager, false).unwrap());
        assert!(!bootstrapper.ensure_registered(&manager, false).unwrap());
        assert!(bootstrapper.ensure_registered(&manager, true).unwrap());

        let rows: i64 = scalar(&manager, "SELECT count(*) FROM lookup");
        assert_eq!(rows, 3);
    }
}
