//! The deduplicated category taxonomy derived from the lookup.

use nps_model::Stream;
use nps_model::columns::{COGNITIVE_ATTRIBUTE_COLUMNS, DOMAIN, NARROW, STREAM, SUBDOMAIN};

use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::lookup::{LOOKUP_VIEW, LookupBootstrapper};
use crate::sql::{quote_ident, quote_literal};

/// Reference relation: distinct (domain, subdomain, narrow, stream) tuples.
pub const DOMAINS_REF: &str = "domains_ref";

/// Builds [`DOMAINS_REF`] from the lookup view.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainReferenceBuilder;

impl DomainReferenceBuilder {
    /// Creates the reference relation unless it already exists.
    ///
    /// Returns `true` when it was (re)built. A rebuild drops and recreates
    /// the whole table. Cognitive-only attributes are null for every stream
    /// other than the cognitive one.
    pub fn ensure(
        &self,
        manager: &ConnectionManager,
        lookup: &LookupBootstrapper,
        force: bool,
    ) -> Result<bool> {
        lookup.ensure_registered(manager, false)?;

        if !force && manager.is_queryable(DOMAINS_REF)? {
            tracing::debug!("Domain reference already built");
            return Ok(false);
        }

        let cognitive = quote_literal(Stream::Cognitive.as_str());
        let attributes: Vec<String> = COGNITIVE_ATTRIBUTE_COLUMNS
            .iter()
            .map(|column| {
                let column = quote_ident(column);
                format!(
                    "CASE WHEN {stream} = {cognitive} THEN {column} END AS {column}",
                    stream = quote_ident(STREAM)
                )
            })
            .collect();

        manager.drop_relation(DOMAINS_REF)?;
        manager.execute_batch(&format!(
            "CREATE TABLE {table} AS \
             SELECT DISTINCT {domain}, {subdomain}, {narrow}, {stream}, {attributes} \
             FROM {lookup}",
            table = quote_ident(DOMAINS_REF),
            domain = quote_ident(DOMAIN),
            subdomain = quote_ident(SUBDOMAIN),
            narrow = quote_ident(NARROW),
            stream = quote_ident(STREAM),
            attributes = attributes.join(", "),
            lookup = quote_ident(LOOKUP_VIEW),
        ))?;

        tracing::info!(relation = DOMAINS_REF, "Domain reference built");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionOptions;
    use nps_ingest::LookupTable;
    use polars::prelude::*;

    fn setup() -> (ConnectionManager, LookupBootstrapper) {
        let mut manager = ConnectionManager::new(ConnectionOptions {
            install_extensions: false,
            ..ConnectionOptions::default()
        });
        manager.connect().unwrap();
        let frame = df!(
            "stream" => ["neurocog", "neurocog", "neurobehav"],
            "domain" => ["Memory", "Memory", "Mood"],
            "subdomain" => ["Verbal", "Verbal", "Depression"],
            "narrow" => ["Recall", "Recall", "Symptoms"],
            "scale" => ["List Recall", "Story Recall", "BDI-2"],
            "pass" => ["planning", "planning", "planning"]
        )
        .unwrap();
        let lookup = LookupBootstrapper::new(LookupTable::from_frame(frame).unwrap());
        (manager, lookup)
    }

    #[test]
    fn test_distinct_tuples_with_isolated_attributes() {
        let (manager, lookup) = setup();
        assert!(DomainReferenceBuilder.ensure(&manager, &lookup, false).unwrap());

        let conn = manager.conn().unwrap();
        let rows: i64 = conn
            .query_row("SELECT count(*) FROM domains_ref", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);

        let pass: Option<String> = conn
            .query_row(
                "SELECT pass FROM domains_ref WHERE stream = 'neurobehav'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(pass, None);
    }

    #[test]
    fn test_rebuild_only_when_forced() {
        let (manager, lookup) = setup();
        assert!(DomainReferenceBuilder.ensure(&manager, &lookup, false).unwrap());
        assert!(!DomainReferenceBuilder.ensure(&manager, &lookup, false).unwrap());
        assert!(DomainReferenceBuilder.ensure(&manager, &lookup, true).unwrap());
    }
}
