//! Source file discovery.

use std::path::{Path, PathBuf};

use nps_model::SourceFormat;

use crate::error::{IngestError, Result};

/// Lists all files of one format in a directory.
///
/// Returns files sorted by filename. Subdirectories are not searched.
pub fn list_files(dir: &Path, format: SourceFormat) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();

    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if format_of(&path) == Some(format) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(files)
}

/// Classifies a path by its extension.
pub fn format_of(path: &Path) -> Option<SourceFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(SourceFormat::from_extension)
}

/// File name without its extension.
pub fn base_name(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|stem| stem.to_str())
}

/// Finds a row-text file next to `path` sharing its base name.
///
/// Extensions are tried in [`SourceFormat::RowText`] order, so `foo.csv`
/// wins over `foo.txt`. The file itself does not need to exist.
pub fn row_text_sibling(path: &Path) -> Option<PathBuf> {
    let stem = base_name(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    SourceFormat::RowText
        .extensions()
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|candidate| candidate.is_file() && candidate != path)
}
