//! Engine handle ownership and capability loading.
//!
//! [`ConnectionManager`] is the only place a DuckDB handle is opened or
//! closed. Everything else borrows the handle through [`ConnectionManager::conn`].

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::sql::Ident;

/// An optional engine feature probed at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Native Parquet reader (columnar binary A).
    Parquet,
    /// Full-text search extension.
    FullText,
    /// Semi-structured (JSON) extension.
    Json,
    /// In-process array library for Arrow IPC / Feather (columnar binary B).
    ArrayLibrary,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Parquet => "parquet",
            Capability::FullText => "fts",
            Capability::Json => "json",
            Capability::ArrayLibrary => "array_library",
        }
    }

    /// Maps an engine extension name to the capability it provides.
    pub fn from_extension(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "parquet" => Some(Capability::Parquet),
            "fts" => Some(Capability::FullText),
            "json" => Some(Capability::Json),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities that loaded successfully on the current connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    available: BTreeSet<Capability>,
}

impl Capabilities {
    pub fn has(&self, capability: Capability) -> bool {
        self.available.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.available.iter().copied()
    }

    fn insert(&mut self, capability: Capability) {
        self.available.insert(capability);
    }

    fn clear(&mut self) {
        self.available.clear();
    }
}

/// Where the engine keeps its data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionTarget {
    #[default]
    InMemory,
    /// A database file; exclusively locked while open.
    File(PathBuf),
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::InMemory => f.write_str(":memory:"),
            ConnectionTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// An engine extension to load at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSpec {
    pub name: String,
    /// Failure of a required extension is warned about; optional ones only log.
    pub required: bool,
}

impl ExtensionSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub target: ConnectionTarget,
    /// Extensions in load order.
    pub extensions: Vec<ExtensionSpec>,
    /// Attempt `INSTALL` when `LOAD` fails. Needs network access.
    pub install_extensions: bool,
    pub probe_array_library: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            target: ConnectionTarget::InMemory,
            extensions: vec![
                ExtensionSpec::required("parquet"),
                ExtensionSpec::optional("fts"),
                ExtensionSpec::optional("json"),
            ],
            install_extensions: true,
            probe_array_library: true,
        }
    }
}

/// Owns the single engine handle for a session.
///
/// Dropping the manager disconnects, so the database file lock is released
/// on every exit path.
pub struct ConnectionManager {
    options: ConnectionOptions,
    conn: Option<Connection>,
    capabilities: Capabilities,
}

impl ConnectionManager {
    pub fn new(options: ConnectionOptions) -> Self {
        Self {
            options,
            conn: None,
            capabilities: Capabilities::default(),
        }
    }

    /// Opens a fresh handle, disconnecting first if already connected.
    ///
    /// Extension and array-library failures degrade capabilities; only a
    /// failure to open the handle itself is an error.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            tracing::debug!("Reconnecting: closing existing engine handle");
            self.disconnect();
        }

        let conn = match &self.options.target {
            ConnectionTarget::InMemory => Connection::open_in_memory(),
            ConnectionTarget::File(path) => Connection::open(path),
        }
        .map_err(|source| EngineError::Connect {
            target: self.options.target.to_string(),
            source,
        })?;

        let mut capabilities = Capabilities::default();
        for spec in &self.options.extensions {
            let name = match Ident::new(&spec.name) {
                Ok(name) => name,
                Err(error) => {
                    tracing::warn!(extension = %spec.name, %error, "Skipping extension");
                    continue;
                }
            };
            match load_extension(&conn, &name, self.options.install_extensions) {
                Ok(()) => {
                    if let Some(capability) = Capability::from_extension(&spec.name) {
                        capabilities.insert(capability);
                    }
                    tracing::debug!(extension = %spec.name, "Loaded engine extension");
                }
                Err(error) if spec.required => {
                    tracing::warn!(
                        extension = %spec.name,
                        %error,
                        "Required extension unavailable; continuing in degraded mode"
                    );
                }
                Err(error) => {
                    tracing::info!(
                        extension = %spec.name,
                        %error,
                        "Optional extension unavailable"
                    );
                }
            }
        }

        if self.options.probe_array_library {
            match nps_ingest::probe_array_library() {
                Ok(()) => capabilities.insert(Capability::ArrayLibrary),
                Err(error) => {
                    tracing::warn!(%error, "Array library probe failed; Feather sources disabled");
                }
            }
        }

        tracing::info!(
            engine = %self.options.target,
            capabilities = ?capabilities.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            "Engine connected"
        );

        self.conn = Some(conn);
        self.capabilities = capabilities;
        Ok(())
    }

    /// Closes the handle if open. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, error)) = conn.close() {
                tracing::warn!(%error, "Engine handle did not close cleanly");
            } else {
                tracing::debug!(engine = %self.options.target, "Engine disconnected");
            }
        }
        self.capabilities.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Borrows the open handle.
    pub fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(EngineError::NotConnected)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.options.target
    }

    /// Executes one or more statements without results.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::trace!(sql, "execute");
        self.conn()?
            .execute_batch(sql)
            .map_err(|source| EngineError::query(sql, source))
    }

    /// Executes a single statement with bound parameters.
    pub fn execute<P: duckdb::Params>(&self, sql: &str, params: P) -> Result<usize> {
        tracing::trace!(sql, "execute");
        self.conn()?
            .execute(sql, params)
            .map_err(|source| EngineError::query(sql, source))
    }

    /// Returns the kind of a relation in the main catalog, if it exists.
    ///
    /// Names compare case-insensitively, as the engine resolves them.
    pub fn relation_kind(&self, name: &str) -> Result<Option<RelationKind>> {
        const SQL: &str = "SELECT table_type FROM information_schema.tables \
                           WHERE table_schema = 'main' AND lower(table_name) = lower(?)";
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(SQL)
            .map_err(|source| EngineError::query(SQL, source))?;
        let mut rows = stmt
            .query([name])
            .map_err(|source| EngineError::query(SQL, source))?;
        let Some(row) = rows.next().map_err(|source| EngineError::query(SQL, source))? else {
            return Ok(None);
        };
        let table_type: String = row.get(0).map_err(|source| EngineError::query(SQL, source))?;
        Ok(Some(if table_type.eq_ignore_ascii_case("VIEW") {
            RelationKind::View
        } else {
            RelationKind::Table
        }))
    }

    /// True when the relation exists and a zero-row select against it binds.
    pub fn is_queryable(&self, name: &str) -> Result<bool> {
        if self.relation_kind(name)?.is_none() {
            return Ok(false);
        }
        let sql = format!("SELECT * FROM {} LIMIT 0", crate::sql::quote_ident(name));
        match self.conn()?.execute_batch(&sql) {
            Ok(()) => Ok(true),
            Err(error) => {
                tracing::debug!(relation = name, %error, "Relation exists but is not queryable");
                Ok(false)
            }
        }
    }

    /// Drops a table or view by name, whichever it is.
    pub fn drop_relation(&self, name: &str) -> Result<()> {
        let quoted = crate::sql::quote_ident(name);
        match self.relation_kind(name)? {
            Some(RelationKind::View) => self.execute_batch(&format!("DROP VIEW {quoted}")),
            Some(RelationKind::Table) => self.execute_batch(&format!("DROP TABLE {quoted}")),
            None => Ok(()),
        }
    }

    /// Column names of a relation, in ordinal order.
    pub fn relation_columns(&self, name: &str) -> Result<Vec<String>> {
        const SQL: &str = "SELECT column_name FROM information_schema.columns \
                           WHERE table_schema = 'main' AND lower(table_name) = lower(?) \
                           ORDER BY ordinal_position";
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(SQL)
            .map_err(|source| EngineError::query(SQL, source))?;
        let columns = stmt
            .query_map([name], |row| row.get::<_, String>(0))
            .map_err(|source| EngineError::query(SQL, source))?
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(|source| EngineError::query(SQL, source))?;
        if columns.is_empty() {
            return Err(EngineError::UnknownRelation {
                name: name.to_string(),
            });
        }
        Ok(columns)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Whether a catalog entry is a base table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Table,
    View,
}

fn load_extension(conn: &Connection, name: &Ident, install: bool) -> duckdb::Result<()> {
    let load = format!("LOAD {name}");
    match conn.execute_batch(&load) {
        Ok(()) => Ok(()),
        Err(error) if !install => Err(error),
        Err(_) => {
            conn.execute_batch(&format!("INSTALL {name}"))?;
            conn.execute_batch(&load)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> ConnectionOptions {
        ConnectionOptions {
            install_extensions: false,
            ..ConnectionOptions::default()
        }
    }

    #[test]
    fn test_connect_and_disconnect_are_idempotent() {
        let mut manager = ConnectionManager::new(offline());
        manager.connect().unwrap();
        manager.connect().unwrap();
        assert!(manager.is_connected());

        manager.disconnect();
        manager.disconnect();
        assert!(!manager.is_connected());
        assert!(manager.capabilities().iter().next().is_none());
        assert!(matches!(manager.conn(), Err(EngineError::NotConnected)));
    }

    #[test]
    fn test_unknown_extension_degrades() {
        let options = ConnectionOptions {
            extensions: vec![ExtensionSpec::required("no_such_extension")],
            ..offline()
        };
        let mut manager = ConnectionManager::new(options);
        manager.connect().unwrap();
        assert!(!manager.has(Capability::Parquet));
        assert!(manager.has(Capability::ArrayLibrary));
    }

    #[test]
    fn test_invalid_extension_name_is_never_executed() {
        let options = ConnectionOptions {
            extensions: vec![ExtensionSpec::optional(
                "json; CREATE TABLE injected AS SELECT 1 AS a",
            )],
            ..offline()
        };
        let mut manager = ConnectionManager::new(options);
        manager.connect().unwrap();
        assert_eq!(manager.relation_kind("injected").unwrap(), None);
        assert!(!manager.has(Capability::Json));
    }

    #[test]
    fn test_catalog_lookup_ignores_case() {
        let mut manager = ConnectionManager::new(offline());
        manager.connect().unwrap();
        manager
            .execute_batch("CREATE TABLE \"NeuroCog\" (\"Scale\" VARCHAR)")
            .unwrap();
        assert_eq!(manager.relation_kind("neurocog").unwrap(), Some(RelationKind::Table));
        assert!(manager.is_queryable("neurocog").unwrap());
        assert_eq!(manager.relation_columns("neurocog").unwrap(), vec!["Scale"]);
    }

    #[test]
    fn test_relation_catalog_helpers() {
        let mut manager = ConnectionManager::new(offline());
        manager.connect().unwrap();
        manager
            .execute_batch("CREATE TABLE t (a INTEGER, \"b c\" VARCHAR); CREATE VIEW v AS SELECT a FROM t;")
            .unwrap();

        assert_eq!(manager.relation_kind("t").unwrap(), Some(RelationKind::Table));
        assert_eq!(manager.relation_kind("v").unwrap(), Some(RelationKind::View));
        assert_eq!(manager.relation_kind("nope").unwrap(), None);
        assert_eq!(manager.relation_columns("t").unwrap(), vec!["a", "b c"]);
        assert!(manager.is_queryable("v").unwrap());

        manager.drop_relation("v").unwrap();
        manager.drop_relation("v").unwrap();
        assert!(!manager.is_queryable("v").unwrap());
    }

    #[test]
    fn test_query_error_carries_sql() {
        let mut manager = ConnectionManager::new(offline());
        manager.connect().unwrap();
        let err = manager.execute_batch("SELECT * FROM does_not_exist").unwrap_err();
        assert!(err.to_string().contains("does_not_exist"));
    }
}
