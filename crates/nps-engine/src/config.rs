//! Session configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use nps_model::{SourceFormat, Stream};

use crate::connection::{ConnectionOptions, ConnectionTarget, ExtensionSpec};

/// Settings for [`crate::Session::open`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Database file; in-memory when unset.
    pub database: Option<PathBuf>,
    /// Directory scanned for source exports when the session opens.
    pub data_dir: Option<PathBuf>,
    /// Formats scanned in `data_dir`.
    pub formats: Vec<SourceFormat>,
    /// Attempt `INSTALL` for extensions that fail to load.
    pub install_extensions: bool,
    /// Extensions loaded after parquet; their failure only logs.
    pub optional_extensions: Vec<String>,
    pub probe_array_library: bool,
    /// Source relation per stream, when it differs from the stream tag.
    pub stream_sources: BTreeMap<Stream, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            database: None,
            data_dir: None,
            formats: SourceFormat::PRIORITY.to_vec(),
            install_extensions: true,
            optional_extensions: vec!["fts".to_string(), "json".to_string()],
            probe_array_library: true,
            stream_sources: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_formats(mut self, formats: Vec<SourceFormat>) -> Self {
        self.formats = formats;
        self
    }

    #[must_use]
    pub fn with_install_extensions(mut self, enable: bool) -> Self {
        self.install_extensions = enable;
        self
    }

    #[must_use]
    pub fn with_stream_source(mut self, stream: Stream, relation: impl Into<String>) -> Self {
        self.stream_sources.insert(stream, relation.into());
        self
    }

    /// Connection settings derived from this configuration.
    pub fn connection_options(&self) -> ConnectionOptions {
        let mut extensions = vec![ExtensionSpec::required("parquet")];
        extensions.extend(
            self.optional_extensions
                .iter()
                .map(|name| ExtensionSpec::optional(name.as_str())),
        );
        ConnectionOptions {
            target: self
                .database
                .clone()
                .map_or(ConnectionTarget::InMemory, ConnectionTarget::File),
            extensions,
            install_extensions: self.install_extensions,
            probe_array_library: self.probe_array_library,
        }
    }
}
