//! Preconditions checked before any byte of content is parsed.

use crate::config::ImportSettings;
use crate::errors::{ImportError, Location};
use crate::sniff::Classification;
use crate::types::FileKind;

use super::upload::Upload;

fn allowed_list(settings: &ImportSettings) -> String {
    settings.allowed_types.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
}

/// Size limit and declared extension.
///
/// # Errors
/// `Validation` for an oversized upload or an extension outside the allowed set.
pub fn check_upload(settings: &ImportSettings, upload: &Upload) -> Result<(), ImportError> {
    if upload.size > settings.max_file_size {
        return Err(ImportError::validation(format!(
            "file is {} bytes; the maximum is {} bytes",
            upload.size, settings.max_file_size
        )));
    }
    let declared = upload.extension().map_or(FileKind::Unknown, FileKind::from_extension);
    if !settings.allowed_types.contains(&declared) {
        return Err(ImportError::validation(format!(
            "file type {:?} is not allowed; expected one of: {}",
            upload.extension().unwrap_or(""),
            allowed_list(settings)
        )));
    }
    Ok(())
}

/// The sniffed structure must be recognizable and allowed.
///
/// # Errors
/// `Structural` for an unknown structure, `Validation` for a kind outside the allowed set.
pub fn check_classification(settings: &ImportSettings, c: &Classification) -> Result<(), ImportError> {
    if c.kind == FileKind::Unknown {
        return Err(ImportError::Structural {
            message: "file content is not recognizable as csv, json or xml".into(),
            location: Location::default(),
            dataset_id: None,
        });
    }
    if !settings.allowed_types.contains(&c.kind) {
        return Err(ImportError::validation(format!(
            "content looks like {}, which is not allowed; expected one of: {}",
            c.kind,
            allowed_list(settings)
        )));
    }
    Ok(())
}
