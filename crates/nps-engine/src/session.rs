//! The session facade.
//!
//! A [`Session`] owns one engine handle and wires the components in
//! dependency order: connection, relation discovery, lookup, domain
//! reference, enriched views. Dropping the session releases the handle.

use std::path::Path;

use duckdb::Params;
use polars::prelude::DataFrame;

use nps_ingest::LookupTable;
use nps_model::{Relation, SourceFormat, Stream, SummaryOptions, SummaryRow};

use crate::config::SessionConfig;
use crate::connection::{Capabilities, ConnectionManager};
use crate::domains::DomainReferenceBuilder;
use crate::enrich::{EnrichmentReport, EnrichmentViewBuilder, UNMAPPED_LOG};
use crate::error::Result;
use crate::frame::query_frame;
use crate::lookup::LookupBootstrapper;
use crate::registrar::{DirectoryScan, RelationRegistrar};
use crate::sql::quote_ident;
use crate::summary::SummaryEngine;

/// One connected engine with the lookup and source relations registered.
pub struct Session {
    config: SessionConfig,
    manager: ConnectionManager,
    registrar: RelationRegistrar,
    lookup: LookupBootstrapper,
    domains: DomainReferenceBuilder,
    enrichment: EnrichmentViewBuilder,
    summary: SummaryEngine,
    opening_reports: Vec<EnrichmentReport>,
}

impl Session {
    /// Connects and bootstraps everything the configuration names.
    ///
    /// When `data_dir` is set its exports are registered and the enriched
    /// views are built; otherwise only the lookup and domain reference exist
    /// until sources are registered.
    pub fn open(config: SessionConfig, lookup: LookupTable) -> Result<Self> {
        let mut manager = ConnectionManager::new(config.connection_options());
        manager.connect()?;

        let mut session = Self {
            enrichment: EnrichmentViewBuilder::new(config.stream_sources.clone()),
            config,
            manager,
            registrar: RelationRegistrar::new(),
            lookup: LookupBootstrapper::new(lookup),
            domains: DomainReferenceBuilder,
            summary: SummaryEngine,
            opening_reports: Vec::new(),
        };

        if let Some(dir) = session.config.data_dir.clone() {
            let formats = session.config.formats.clone();
            session.register_all_in_directory(&dir, &formats)?;
        }
        session.ensure_lookup_registered(false)?;
        session.ensure_domains_ref(false)?;
        session.opening_reports = session.refresh_enriched_views()?;
        Ok(session)
    }

    /// Releases the engine handle. Further engine calls return
    /// [`crate::EngineError::NotConnected`].
    pub fn close(&mut self) {
        self.manager.disconnect();
        self.registrar.clear();
    }

    pub fn is_open(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.manager.capabilities()
    }

    /// Enrichment reports from the refresh done by [`Session::open`].
    pub fn opening_reports(&self) -> &[EnrichmentReport] {
        &self.opening_reports
    }

    /// Relations registered from source files, by name.
    pub fn relations(&self) -> Vec<Relation> {
        self.registrar.relations().cloned().collect()
    }

    pub fn register_row_text(&mut self, path: &Path, name: Option<&str>) -> Result<Relation> {
        self.registrar.register_row_text(&self.manager, path, name)
    }

    /// Registers a Parquet or Feather file, falling back to a row-text sibling.
    pub fn register_columnar(&mut self, path: &Path, name: Option<&str>) -> Result<Relation> {
        self.registrar.register_columnar(&self.manager, path, name)
    }

    pub fn register_all_in_directory(
        &mut self,
        dir: &Path,
        formats: &[SourceFormat],
    ) -> Result<DirectoryScan> {
        self.registrar
            .register_all_in_directory(&self.manager, dir, formats)
    }

    pub fn ensure_lookup_registered(&self, force: bool) -> Result<bool> {
        self.lookup.ensure_registered(&self.manager, force)
    }

    pub fn ensure_domains_ref(&self, force: bool) -> Result<bool> {
        self.domains.ensure(&self.manager, &self.lookup, force)
    }

    /// Rebuilds the enriched view of every registered stream.
    pub fn refresh_enriched_views(&self) -> Result<Vec<EnrichmentReport>> {
        self.enrichment.refresh(&self.manager, &self.lookup)
    }

    pub fn domain_summary(&self, options: SummaryOptions) -> Result<Vec<SummaryRow>> {
        self.summary.domain_summary(&self.manager, options)
    }

    /// Enriched rows of one stream in one domain, highest percentile first.
    ///
    /// Enriched views are refreshed first when the stream's view is missing.
    pub fn process(&self, category: &str, stream: Stream, scales: &[&str]) -> Result<DataFrame> {
        if !self.manager.is_queryable(&stream.enriched_view())? {
            tracing::debug!(%stream, "Enriched view missing; refreshing");
            self.refresh_enriched_views()?;
        }
        self.summary
            .process(&self.manager, category, stream, scales)
    }

    /// Runs a read query against any registered relation or view.
    pub fn query(&self, sql: &str) -> Result<DataFrame> {
        self.query_with(sql, [])
    }

    /// Runs a read query with bound parameters.
    pub fn query_with<P: Params>(&self, sql: &str, params: P) -> Result<DataFrame> {
        query_frame(self.manager.conn()?, sql, params)
    }

    /// The unmapped-key log, oldest entries first. Empty before the first miss.
    pub fn unmapped_log(&self) -> Result<DataFrame> {
        if self.manager.relation_kind(UNMAPPED_LOG)?.is_none() {
            return Ok(DataFrame::empty());
        }
        self.query(&format!(
            "SELECT * FROM {} ORDER BY logged_at, stream, n DESC, join_key",
            quote_ident(UNMAPPED_LOG)
        ))
    }
}
