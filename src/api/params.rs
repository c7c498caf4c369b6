//! Typed access to the flat string maps the host framework forwards.

use std::collections::HashMap;

use crate::errors::ImportError;
use crate::types::{DatasetId, DatasetStatus, UploadId};

pub type Request = HashMap<String, String>;

fn raw<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// # Errors
/// `Validation` when present but not a non-negative integer.
pub fn opt_u64(req: &Request, key: &str) -> Result<Option<u64>, ImportError> {
    raw(req, key)
        .map(|s| s.parse::<u64>().map_err(|_| ImportError::validation(format!("{key} must be a non-negative integer, got {s:?}"))))
        .transpose()
}

pub fn opt_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    raw(req, key)
}

/// # Errors
/// `Validation` when missing or malformed.
pub fn dataset_id(req: &Request, key: &str) -> Result<DatasetId, ImportError> {
    opt_u64(req, key)?
        .map(DatasetId)
        .ok_or_else(|| ImportError::validation(format!("{key} is required")))
}

/// Comma or whitespace separated ids, e.g. `"3,4, 9"`.
///
/// # Errors
/// `Validation` when missing, empty, or any entry is not an id.
pub fn dataset_ids(req: &Request, key: &str) -> Result<Vec<DatasetId>, ImportError> {
    let s = raw(req, key).ok_or_else(|| ImportError::validation(format!("{key} is required")))?;
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<u64>()
                .map(DatasetId)
                .map_err(|_| ImportError::validation(format!("invalid dataset id {p:?}")))
        })
        .collect()
}

/// # Errors
/// `Validation` when missing or not a uuid.
pub fn upload_id(req: &Request) -> Result<UploadId, ImportError> {
    let s = raw(req, "upload_id").ok_or_else(|| ImportError::validation("upload_id is required"))?;
    UploadId::parse(s).ok_or_else(|| ImportError::validation(format!("invalid upload_id {s:?}")))
}

/// `status` filter for listings: a status name, or `all`. Absent means active only.
///
/// # Errors
/// `Validation` for an unknown status name.
pub fn status_filter(req: &Request) -> Result<Option<DatasetStatus>, ImportError> {
    match raw(req, "status") {
        None => Ok(Some(DatasetStatus::Active)),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => DatasetStatus::parse(s)
            .map(Some)
            .ok_or_else(|| ImportError::validation(format!("unknown status {s:?}"))),
    }
}
