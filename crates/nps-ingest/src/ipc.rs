//! Arrow IPC / Feather reading through the polars array library.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use polars::prelude::*;

use crate::error::{IngestError, Result};

/// Reads an Arrow IPC (Feather v2) file into a DataFrame.
pub fn read_ipc_file(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IngestError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IngestError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    IpcReader::new(file)
        .finish()
        .map_err(|e| IngestError::IpcRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Writes a DataFrame as an Arrow IPC file.
pub fn write_ipc_file(path: &Path, frame: &mut DataFrame) -> Result<()> {
    let file = File::create(path).map_err(|e| IngestError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    IpcWriter::new(file).finish(frame)?;
    Ok(())
}

/// Verifies the array library can write and re-read a trivial table in memory.
pub fn probe_array_library() -> Result<()> {
    let mut frame = df!(
        "scale" => ["probe"],
        "score" => [1i64]
    )?;

    let mut buffer = Vec::new();
    IpcWriter::new(&mut buffer).finish(&mut frame)?;
    let read_back = IpcReader::new(Cursor::new(buffer)).finish()?;

    if read_back.equals_missing(&frame) {
        Ok(())
    } else {
        Err(IngestError::ArrayRoundTrip {
            reason: format!("expected {frame:?}, read back {read_back:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_probe_succeeds() {
        probe_array_library().unwrap();
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("validity.feather");
        let mut frame = df!(
            "scale" => ["TOMM Trial 1", "RDS"],
            "percentile" => [Some(45.0), None]
        )
        .unwrap();

        write_ipc_file(&path, &mut frame).unwrap();
        let read = read_ipc_file(&path).unwrap();

        assert_eq!(read.height(), 2);
        assert!(read.equals_missing(&frame));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_ipc_file(&dir.path().join("absent.feather"));
        assert!(matches!(result, Err(IngestError::FileNotFound { .. })));
    }
}
