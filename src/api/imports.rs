//! Upload entry points: analyze (preview) and import (commit).

use crate::Visualizer;
use crate::config::{ImportConfig, ParseOverrides};
use crate::errors::ImportError;
use crate::import::{Analysis, CommitOptions, ImportOutcome};
use crate::types::UploadId;

use super::params::{self, Request};

/// Previews an upload using the optional `delimiter`, `encoding` and `has_header` overrides.
///
/// # Errors
/// `Validation` for bad parameters, otherwise see [`Visualizer::analyze`].
pub fn analyze_file(v: &Visualizer, upload: UploadId, req: &Request) -> Result<Analysis, ImportError> {
    let overrides = ParseOverrides::from_params(req)?;
    v.analyze(upload, &overrides)
}

/// Imports an upload with the flat form configuration. A `dataset_id` parameter retries
/// the import into that failed dataset.
///
/// # Errors
/// `Validation` for bad parameters, otherwise see [`Visualizer::commit`].
pub fn import_file(v: &Visualizer, upload: UploadId, req: &Request) -> Result<ImportOutcome, ImportError> {
    let config = ImportConfig::from_params(req)?;
    let opts = CommitOptions {
        target: params::opt_u64(req, "dataset_id")?.map(crate::types::DatasetId),
        ..CommitOptions::default()
    };
    v.commit(upload, &config, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::request as req;
    use crate::errors::ErrorKind;
    use crate::import::UploadSource;

    #[test]
    fn analyze_honours_overrides() {
        let v = Visualizer::in_memory();
        let up = v.register_upload("a.csv", None, UploadSource::Bytes(b"1|2\n3|4\n".to_vec())).unwrap();
        let a = analyze_file(&v, up.id, &req(&[("delimiter", "|"), ("has_header", "false")])).unwrap();
        assert_eq!(a.preview.columns, vec!["column_1", "column_2"]);
        assert_eq!(a.preview.rows.len(), 2);
    }

    #[test]
    fn import_requires_a_name() {
        let v = Visualizer::in_memory();
        let up = v.register_upload("a.csv", None, UploadSource::Bytes(b"a\n1\n".to_vec())).unwrap();
        let err = import_file(&v, up.id, &req(&[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let out = import_file(&v, up.id, &req(&[("dataset_name", "A")])).unwrap();
        assert_eq!(out.rows_imported, 1);
    }
}
