//! Registration of source files as named relations.
//!
//! Row-text and Parquet files become views over the engine's own readers.
//! Feather files are read with polars and materialized as tables. A
//! columnar file that cannot be registered falls back to a row-text file
//! with the same base name in the same directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nps_ingest::{IngestError, base_name, format_of, list_files, read_ipc_file, row_text_sibling};
use nps_model::{Relation, SourceFormat};

use crate::connection::{Capability, ConnectionManager};
use crate::error::{EngineError, Result};
use crate::frame::load_frame;
use crate::sql::{Ident, quote_literal};

/// A file a directory scan could not register.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of [`RelationRegistrar::register_all_in_directory`].
#[derive(Debug, Clone, Default)]
pub struct DirectoryScan {
    pub registered: Vec<Relation>,
    pub skipped: Vec<SkippedFile>,
}

/// Tracks the relations registered during a session.
///
/// Keyed by lowercased name, since the engine resolves names without
/// regard to case.
#[derive(Debug, Default)]
pub struct RelationRegistrar {
    relations: BTreeMap<String, Relation>,
}

impl RelationRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered relations, by name.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    pub fn get(&self, name: &str) -> Option<&Relation> {
        self.relations.get(&name.to_ascii_lowercase())
    }

    /// Forgets every relation. Called when the engine handle goes away.
    pub fn clear(&mut self) {
        self.relations.clear();
    }

    /// Creates or replaces a view over a delimited text file.
    pub fn register_row_text(
        &mut self,
        manager: &ConnectionManager,
        path: &Path,
        name: Option<&str>,
    ) -> Result<Relation> {
        let ident = relation_name(path, name)?;
        create_row_text_view(manager, path, &ident)?;
        Ok(self.record(Relation::new(ident.as_str(), path, SourceFormat::RowText)))
    }

    /// Creates or replaces a view over a Parquet file.
    pub fn register_parquet(
        &mut self,
        manager: &ConnectionManager,
        path: &Path,
        name: Option<&str>,
    ) -> Result<Relation> {
        ensure_file(path)?;
        let ident = relation_name(path, name)?;
        ensure_capability(manager, Capability::Parquet, path)?;
        let sql = format!(
            "CREATE VIEW {} AS SELECT * FROM read_parquet({})",
            ident.quoted(),
            quote_literal(&path.to_string_lossy())
        );
        manager.drop_relation(ident.as_str())?;
        manager.execute_batch(&sql)?;

        Ok(self.record(Relation::new(ident.as_str(), path, SourceFormat::Parquet)))
    }

    /// Reads an Arrow IPC / Feather file and materializes it as a table.
    pub fn register_feather(
        &mut self,
        manager: &ConnectionManager,
        path: &Path,
        name: Option<&str>,
    ) -> Result<Relation> {
        ensure_file(path)?;
        let ident = relation_name(path, name)?;
        ensure_capability(manager, Capability::ArrayLibrary, path)?;
        let frame = read_ipc_file(path)?;
        manager.drop_relation(ident.as_str())?;
        load_frame(manager.conn()?, &ident, &frame)?;

        Ok(self.record(Relation::new(ident.as_str(), path, SourceFormat::Feather)))
    }

    /// Registers a columnar file, falling back to a row-text sibling on failure.
    ///
    /// The fallback is taken when the file is missing, its capability is not
    /// loaded, or the engine rejects it. Invalid explicit names and a closed
    /// connection are returned as-is.
    pub fn register_columnar(
        &mut self,
        manager: &ConnectionManager,
        path: &Path,
        name: Option<&str>,
    ) -> Result<Relation> {
        let format = format_of(path)
            .filter(SourceFormat::is_columnar)
            .ok_or_else(|| EngineError::UnknownFormat {
                path: path.to_path_buf(),
            })?;

        let attempt = match format {
            SourceFormat::Parquet => self.register_parquet(manager, path, name),
            _ => self.register_feather(manager, path, name),
        };

        let error = match attempt {
            Ok(relation) => return Ok(relation),
            Err(error) if !is_recoverable(&error) => return Err(error),
            Err(error) => error,
        };

        let Some(sibling) = row_text_sibling(path) else {
            return Err(error);
        };
        let ident = relation_name(path, name)?;

        tracing::warn!(
            relation = %ident,
            path = %path.display(),
            fallback = %sibling.display(),
            %error,
            "Columnar registration failed; using row-text sibling"
        );
        create_row_text_view(manager, &sibling, &ident)?;
        let relation =
            Relation::new(ident.as_str(), sibling, SourceFormat::RowText).with_fallback_from(format);
        Ok(self.record(relation))
    }

    /// Registers every source file in `dir`, highest-priority format first.
    ///
    /// Each base name is registered at most once per scan, so a dataset
    /// present as both Parquet and CSV is served from Parquet. Files that
    /// fail are skipped with a warning. A missing directory yields an empty
    /// scan.
    pub fn register_all_in_directory(
        &mut self,
        manager: &ConnectionManager,
        dir: &Path,
        formats: &[SourceFormat],
    ) -> Result<DirectoryScan> {
        let mut ordered: Vec<SourceFormat> = formats.to_vec();
        ordered.sort_by_key(SourceFormat::rank);
        ordered.dedup();

        let mut scan = DirectoryScan::default();
        let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();

        for format in ordered {
            let files = match list_files(dir, format) {
                Ok(files) => files,
                Err(IngestError::DirectoryNotFound { path }) => {
                    tracing::warn!(path = %path.display(), "Data directory not found; nothing registered");
                    return Ok(scan);
                }
                Err(error) => return Err(error.into()),
            };

            for path in files {
                let ident = match base_name(&path).map(Ident::sanitize) {
                    Some(Ok(ident)) => ident,
                    _ => {
                        tracing::warn!(path = %path.display(), "Cannot derive a relation name; skipping");
                        scan.skipped.push(SkippedFile {
                            reason: "no usable base name".to_string(),
                            path,
                        });
                        continue;
                    }
                };
                if let Some(registered) = seen.get(&ident.as_str().to_ascii_lowercase()) {
                    if base_name(registered) == base_name(&path) {
                        tracing::debug!(
                            relation = %ident,
                            path = %path.display(),
                            "Already registered from a higher-priority format"
                        );
                    } else {
                        tracing::warn!(
                            relation = %ident,
                            path = %path.display(),
                            registered = %registered.display(),
                            "File name maps to an already registered relation; skipping"
                        );
                        scan.skipped.push(SkippedFile {
                            reason: format!(
                                "relation '{ident}' already registered from {}",
                                registered.display()
                            ),
                            path,
                        });
                    }
                    continue;
                }

                let result = if format.is_columnar() {
                    self.register_columnar(manager, &path, None)
                } else {
                    self.register_row_text(manager, &path, None)
                };
                match result {
                    Ok(relation) => {
                        seen.insert(relation.name.to_ascii_lowercase(), path);
                        scan.registered.push(relation);
                    }
                    Err(EngineError::NotConnected) => return Err(EngineError::NotConnected),
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "Skipping source file");
                        scan.skipped.push(SkippedFile {
                            path,
                            reason: error.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            registered = scan.registered.len(),
            skipped = scan.skipped.len(),
            "Directory scan complete"
        );
        Ok(scan)
    }

    fn record(&mut self, relation: Relation) -> Relation {
        tracing::info!(
            relation = %relation.name,
            path = %relation.path.display(),
            format = %relation.format,
            "Registered relation"
        );
        self.relations
            .insert(relation.name.to_ascii_lowercase(), relation.clone());
        relation
    }
}

fn create_row_text_view(manager: &ConnectionManager, path: &Path, ident: &Ident) -> Result<()> {
    ensure_file(path)?;
    let sql = format!(
        "CREATE VIEW {} AS SELECT * FROM read_csv_auto({})",
        ident.quoted(),
        quote_literal(&path.to_string_lossy())
    );
    manager.drop_relation(ident.as_str())?;
    manager.execute_batch(&sql)
}

fn ensure_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(EngineError::FileNotFound {
            path: path.to_path_buf(),
        })
    }
}

fn ensure_capability(manager: &ConnectionManager, capability: Capability, path: &Path) -> Result<()> {
    if manager.has(capability) {
        Ok(())
    } else {
        Err(EngineError::CapabilityUnavailable {
            capability,
            path: path.to_path_buf(),
        })
    }
}

/// Explicit names must already be valid; default names are sanitized stems.
fn relation_name(path: &Path, name: Option<&str>) -> Result<Ident> {
    match name {
        Some(name) => Ident::new(name),
        None => {
            let stem = base_name(path).ok_or_else(|| EngineError::InvalidIdentifier {
                name: path.display().to_string(),
            })?;
            Ident::sanitize(stem)
        }
    }
}

fn is_recoverable(error: &EngineError) -> bool {
    matches!(
        error,
        EngineError::FileNotFound { .. }
            | EngineError::CapabilityUnavailable { .. }
            | EngineError::Query { .. }
            | EngineError::Frame { .. }
            | EngineError::Ingest(_)
    )
}
