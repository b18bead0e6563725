//! Tests for lookup dataset loading.

use std::fs;
use std::path::PathBuf;

use nps_ingest::{IngestError, load_lookup_csv};
use tempfile::TempDir;

fn write_lookup(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("lookup.csv");
    fs::write(&path, contents).expect("write lookup");
    path
}

#[test]
fn loads_lookup_with_string_columns() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_lookup(
        &dir,
        "stream,domain,subdomain,narrow,scale,test,test_name,pass,verbal,timed\n\
         neurocog,Visual Perception/Construction,Visuospatial,Construction,Block Design,wais4,WAIS-IV,Perceptual,Nonverbal,Timed\n\
         neurobehav,Emotional/Behavioral,Mood,Depression,BDI-2,bdi2,Beck Depression Inventory,,,\n",
    );

    let table = load_lookup_csv(&path).expect("load lookup");
    assert_eq!(table.len(), 2);
    assert_eq!(table.unmatchable_rows().expect("keys"), 0);

    let keys = table.join_keys().expect("keys");
    assert_eq!(keys[0].as_ref().map(|k| k.as_str()), Some("block design"));
    assert_eq!(keys[1].as_ref().map(|k| k.as_str()), Some("bdi-2"));
}

#[test]
fn numeric_looking_values_stay_strings() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_lookup(
        &dir,
        "stream,domain,subdomain,narrow,test\nvalidity,Validity,PVT,Embedded,15\n",
    );

    let table = load_lookup_csv(&path).expect("load lookup");
    let test = table.frame().column("test").expect("test column");
    assert_eq!(test.str().expect("string column").get(0), Some("15"));
}

#[test]
fn missing_classification_columns_fail() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_lookup(&dir, "stream,scale\nneurocog,Block Design\n");

    let err = load_lookup_csv(&path).expect_err("should fail");
    let message = err.to_string();
    assert!(matches!(err, IngestError::MissingLookupColumns { .. }));
    assert!(message.contains("domain"));
    assert!(message.contains("subdomain"));
    assert!(message.contains("narrow"));
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().expect("temp dir");
    let err = load_lookup_csv(&dir.path().join("absent.csv")).expect_err("should fail");
    assert!(matches!(err, IngestError::FileNotFound { .. }));
}
