#![allow(dead_code)]

use std::path::PathBuf;

use football_valuations::config::{DatasetLocation, PipelineConfig};
use football_valuations::ingest::{DirectorySource, ingest_all};
use football_valuations::loader::load_dimensions;
use football_valuations::partition::MonthPartition;
use football_valuations::store::Store;
use tempfile::TempDir;

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

pub fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

pub fn month(key: &str) -> MonthPartition {
    key.parse().expect("valid partition key")
}

/// A config rooted in a fresh temp dir that reads the bundled CSV dataset.
pub fn fixture_config() -> (TempDir, PipelineConfig) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = PipelineConfig::with_data_dir(dir.path().join("data"));
    config.dataset = DatasetLocation::Directory(fixture_path("dataset"));
    config.ensure_dirs().expect("create data dirs");
    (dir, config)
}

pub fn fixture_source() -> DirectorySource {
    DirectorySource {
        dir: fixture_path("dataset"),
    }
}

/// Snapshots written and dimension tables loaded from the fixture dataset.
pub fn ingested_store() -> (TempDir, PipelineConfig, Store) {
    let (dir, config) = fixture_config();
    ingest_all(&fixture_source(), &config).expect("ingest fixtures");
    let store = Store::open(&config.db_path).expect("open store");
    load_dimensions(&store, &config).expect("load dimensions");
    (dir, config, store)
}
