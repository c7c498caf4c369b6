#![cfg(test)]

// Test-only helpers shared by the unit test modules.
use std::collections::HashMap;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::Visualizer;
use crate::config::ImportConfig;
use crate::import::{CommitOptions, UploadSource};
use crate::types::DatasetId;

/// Flat request map from literal pairs.
pub fn request(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

/// A scratch directory and a store log path inside it. Keep the dir alive for the test.
pub fn temp_log(name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(name);
    (dir, path)
}

/// Registers `data` as a CSV upload and imports it under `name`.
pub fn import_csv(v: &Visualizer, name: &str, data: &[u8]) -> DatasetId {
    let up = v.register_upload("data.csv", None, UploadSource::Bytes(data.to_vec())).expect("register upload");
    v.commit(up.id, &ImportConfig::new(name), CommitOptions::default()).expect("import").dataset_id
}
