use crate::types::DatasetId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Best-effort position of a structural problem inside the source bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u64>,
}

impl Location {
    pub fn at_byte(offset: u64) -> Self {
        Self { byte_offset: Some(offset), ..Self::default() }
    }

    pub fn at_line(line: u64, column: u64) -> Self {
        Self { line: Some(line), column: Some(column), ..Self::default() }
    }

    pub fn is_known(&self) -> bool {
        self.byte_offset.is_some() || self.line.is_some()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(b) = self.byte_offset {
            parts.push(format!("byte {b}"));
        }
        if let Some(l) = self.line {
            parts.push(format!("line {l}"));
        }
        if let Some(c) = self.column {
            parts.push(format!("column {c}"));
        }
        if parts.is_empty() {
            f.write_str("unknown position")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Errors raised while turning bytes into rows.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed structure at {location}: {message}")]
    MalformedStructure { message: String, location: Location },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub fn malformed(message: impl Into<String>, location: Location) -> Self {
        Self::MalformedStructure { message: message.into(), location }
    }
}

/// Errors raised by a [`crate::store::DatasetStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset not found: {0}")]
    NotFound(DatasetId),

    #[error("store conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store codec error: {0}")]
    Codec(String),
}

impl From<bincode::error::EncodeError> for StoreError {
    fn from(e: bincode::error::EncodeError) -> Self {
        Self::Codec(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for StoreError {
    fn from(e: bincode::error::DecodeError) -> Self {
        Self::Codec(e.to_string())
    }
}

/// Public error of every entry point.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("structural error at {location}: {message}")]
    Structural { message: String, location: Location, dataset_id: Option<DatasetId> },

    #[error("storage error: {message}")]
    Storage { message: String, dataset_id: Option<DatasetId>, last_row_index: Option<u64> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("import of dataset {dataset_id} cancelled after {rows_written} rows")]
    Cancelled { dataset_id: DatasetId, rows_written: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ParseError> for ImportError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::MalformedStructure { message, location } => {
                Self::Structural { message, location, dataset_id: None }
            }
            ParseError::Io(e) => Self::Io(e),
        }
    }
}

impl From<StoreError> for ImportError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(format!("dataset {id}")),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Invalid(msg) => Self::Validation(msg),
            other => Self::Storage { message: other.to_string(), dataset_id: None, last_row_index: None },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Structural,
    Storage,
    NotFound,
    Conflict,
    Cancelled,
    Io,
}

/// Structured `{kind, message}` error handed back to the host framework.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<DatasetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_row_index: Option<u64>,
}

impl ImportError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Structural { .. } => ErrorKind::Structural,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Storage failures may succeed when retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Io(_))
    }

    pub fn dataset_id(&self) -> Option<DatasetId> {
        match self {
            Self::Structural { dataset_id, .. } | Self::Storage { dataset_id, .. } => *dataset_id,
            Self::Cancelled { dataset_id, .. } => Some(*dataset_id),
            _ => None,
        }
    }

    /// Attaches the dataset an in-flight import was writing to.
    #[must_use]
    pub fn with_dataset(self, id: DatasetId) -> Self {
        match self {
            Self::Structural { message, location, .. } => {
                Self::Structural { message, location, dataset_id: Some(id) }
            }
            Self::Storage { message, last_row_index, .. } => {
                Self::Storage { message, dataset_id: Some(id), last_row_index }
            }
            other => other,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let (location, last_row_index) = match self {
            Self::Structural { location, .. } if location.is_known() => (Some(*location), None),
            Self::Storage { last_row_index, .. } => (None, *last_row_index),
            _ => (None, None),
        };
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            location,
            dataset_id: self.dataset_id(),
            last_row_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_map_to_structural() {
        let e: ImportError = ParseError::malformed("unterminated quote", Location::at_byte(7)).into();
        assert_eq!(e.kind(), ErrorKind::Structural);
        let r = e.with_dataset(DatasetId(3)).report();
        assert_eq!(r.dataset_id, Some(DatasetId(3)));
        assert_eq!(r.location.and_then(|l| l.byte_offset), Some(7));
        assert!(r.message.contains("byte 7"));
    }

    #[test]
    fn store_errors_are_retryable_storage() {
        let e: ImportError = StoreError::Codec("bad frame".into()).into();
        assert_eq!(e.kind(), ErrorKind::Storage);
        assert!(e.is_retryable());
        let e: ImportError = StoreError::NotFound(DatasetId(9)).into();
        assert_eq!(e.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn report_serializes_kind_in_snake_case() {
        let r = ImportError::NotFound("dataset 1".into()).report();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["kind"], "not_found");
        assert!(v.get("location").is_none());
    }
}
