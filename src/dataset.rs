//! Persisted entities: datasets, their row records and visualizations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DatasetId, DatasetStatus, Delimiter, FileKind, TextEncoding, VisualizationId};

/// Dataset metadata. `total_rows`, `total_columns` and `columns` are only meaningful
/// once `status` is `Active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_type: FileKind,
    pub file_size: u64,
    pub delimiter: Delimiter,
    pub encoding: TextEncoding,
    pub has_header: bool,
    pub columns: Vec<String>,
    pub total_rows: u64,
    pub total_columns: u64,
    pub imported_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: DatasetStatus,
    pub failure_reason: Option<String>,
}

impl Dataset {
    pub(crate) fn from_draft(id: DatasetId, draft: NewDataset, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            file_name: draft.file_name,
            file_type: draft.file_type,
            file_size: draft.file_size,
            delimiter: draft.delimiter,
            encoding: draft.encoding,
            has_header: draft.has_header,
            columns: Vec::new(),
            total_rows: 0,
            total_columns: 0,
            imported_at: now,
            updated_at: now,
            status: DatasetStatus::Importing,
            failure_reason: None,
        }
    }
}

/// Metadata known before any row is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDataset {
    pub name: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_type: FileKind,
    pub file_size: u64,
    pub delimiter: Delimiter,
    pub encoding: TextEncoding,
    pub has_header: bool,
}

/// Editable metadata; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// One stored row: its dense index and the column-name to value mapping, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRecord {
    pub row_index: u64,
    pub values: Vec<(String, String)>,
}

impl RowRecord {
    pub fn new(row_index: u64, columns: &[String], values: Vec<String>) -> Self {
        let values = columns.iter().cloned().zip(values).collect();
        Self { row_index, values }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVisualization {
    pub dataset_id: DatasetId,
    pub name: String,
    pub kind: String,
    /// Rendering configuration as a JSON document, stored opaquely.
    pub config_json: String,
    pub shortcode: Option<String>,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visualization {
    pub id: VisualizationId,
    pub dataset_id: DatasetId,
    pub name: String,
    pub kind: String,
    pub config_json: String,
    pub shortcode: Option<String>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Listing parameters. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u64,
    pub per_page: u64,
    pub search: Option<String>,
    /// `None` lists every status.
    pub status: Option<DatasetStatus>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self { page: 1, per_page: 20, search: None, status: Some(DatasetStatus::Active) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}
