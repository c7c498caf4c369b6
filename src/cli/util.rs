use std::path::Path;

use crate::api::Request;

/// Builds a request map from optional values, skipping the absent ones.
pub fn request(pairs: &[(&str, Option<String>)]) -> Request {
    pairs
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| ((*k).to_string(), v.clone())))
        .collect()
}

/// The declared upload name: the last path component, or the whole path when there is none.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
