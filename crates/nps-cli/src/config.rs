//! TOML configuration for the `nps` binary.
//!
//! ```toml
//! lookup = "data/lookup.csv"
//!
//! [engine]
//! data_dir = "data/exports"
//! database = "scores.duckdb"
//! install_extensions = false
//!
//! [engine.stream_sources]
//! neurobehav = "rating_scales"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use nps_engine::SessionConfig;

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub engine: SessionConfig,
    /// Master lookup CSV.
    pub lookup: Option<PathBuf>,
}

impl CliConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("parse configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read configuration {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Applies command-line overrides; flags win over file values.
    #[must_use]
    pub fn with_overrides(
        mut self,
        lookup: Option<PathBuf>,
        data_dir: Option<PathBuf>,
        database: Option<PathBuf>,
        offline: bool,
    ) -> Self {
        if lookup.is_some() {
            self.lookup = lookup;
        }
        if data_dir.is_some() {
            self.engine.data_dir = data_dir;
        }
        if database.is_some() {
            self.engine.database = database;
        }
        if offline {
            self.engine.install_extensions = false;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nps_model::{SourceFormat, Stream};

    #[test]
    fn test_parse_full_file() {
        let config = CliConfig::from_toml(
            r#"
            lookup = "data/lookup.csv"

            [engine]
            data_dir = "data/exports"
            formats = ["parquet", "row_text"]
            install_extensions = false

            [engine.stream_sources]
            neurobehav = "rating_scales"
            "#,
        )
        .unwrap();

        assert_eq!(config.lookup, Some(PathBuf::from("data/lookup.csv")));
        assert_eq!(config.engine.data_dir, Some(PathBuf::from("data/exports")));
        assert_eq!(
            config.engine.formats,
            vec![SourceFormat::Parquet, SourceFormat::RowText]
        );
        assert!(!config.engine.install_extensions);
        assert!(config.engine.probe_array_library);
        assert_eq!(
            config.engine.stream_sources.get(&Stream::Behavioral).map(String::as_str),
            Some("rating_scales")
        );
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = CliConfig::from_toml("").unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_unknown_stream_rejected() {
        let err = CliConfig::from_toml("[engine.stream_sources]\nadaptive = \"abas\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let config = CliConfig::from_toml("[engine]\ndatabase = \"file.duckdb\"\n")
            .unwrap()
            .with_overrides(None, Some(PathBuf::from("exports")), None, true);
        assert_eq!(config.engine.database, Some(PathBuf::from("file.duckdb")));
        assert_eq!(config.engine.data_dir, Some(PathBuf::from("exports")));
        assert!(!config.engine.install_extensions);
    }
}
