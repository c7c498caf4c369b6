//! Listing, preview and lifecycle entry points over the dataset store.

use serde::Serialize;

use crate::Visualizer;
use crate::dataset::{Dataset, DatasetPatch, ListQuery, Page};
use crate::errors::{ErrorReport, ImportError};
use crate::store::PurgeSummary;
use crate::types::{DatasetId, DatasetStatus};

/// Stored columns and the leading rows of one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetPreview {
    pub dataset: Dataset,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: u64,
}

/// # Errors
/// `Validation` for `page == 0`.
pub fn get_datasets(
    v: &Visualizer,
    page: Option<u64>,
    per_page: Option<u64>,
    search: Option<&str>,
    status: Option<DatasetStatus>,
) -> Result<Page<Dataset>, ImportError> {
    let listing = &v.settings().listing;
    let per_page = per_page
        .unwrap_or(listing.default_per_page as u64)
        .clamp(1, listing.max_per_page.max(1) as u64);
    let query = ListQuery {
        page: page.unwrap_or(1),
        per_page,
        search: search.map(str::to_string),
        status,
    };
    Ok(v.store().list_datasets(&query)?)
}

/// First `limit` stored rows (default `preview_rows`, at most `max_per_page`), laid out in
/// column order with absent values as empty strings.
///
/// # Errors
/// `NotFound` for an unknown id.
pub fn get_dataset_preview(v: &Visualizer, id: DatasetId, limit: Option<u64>) -> Result<DatasetPreview, ImportError> {
    let settings = v.settings();
    let limit = limit
        .unwrap_or(settings.import.preview_rows as u64)
        .min(settings.listing.max_per_page as u64);
    let dataset = v.store().get_dataset(id)?;
    let records = v.store().rows(id, 0, limit)?;
    let columns = dataset.columns.clone();
    let rows = records
        .iter()
        .map(|r| columns.iter().map(|c| r.get(c).unwrap_or_default().to_string()).collect())
        .collect();
    let total_rows = v.store().row_count(id)?;
    Ok(DatasetPreview { dataset, columns, rows, total_rows })
}

/// # Errors
/// `NotFound`, or `Conflict` while the dataset is importing.
pub fn delete_dataset(v: &Visualizer, id: DatasetId) -> Result<Dataset, ImportError> {
    Ok(v.store().delete_dataset(id)?)
}

/// # Errors
/// `NotFound`, or `Conflict` when the dataset is not soft-deleted.
pub fn restore_dataset(v: &Visualizer, id: DatasetId) -> Result<Dataset, ImportError> {
    Ok(v.store().restore_dataset(id)?)
}

/// Removes the dataset, its rows and its visualizations.
///
/// # Errors
/// `NotFound`, or `Conflict` while an import holds the dataset.
pub fn purge_dataset(v: &Visualizer, id: DatasetId) -> Result<PurgeSummary, ImportError> {
    Ok(v.store().hard_delete_dataset(id)?)
}

/// # Errors
/// `Validation` for a blank name, `NotFound` for an unknown id.
pub fn update_dataset(v: &Visualizer, id: DatasetId, patch: DatasetPatch) -> Result<Dataset, ImportError> {
    Ok(v.store().update_dataset(id, patch)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Delete,
    Restore,
    Purge,
}

impl BulkAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delete" => Some(Self::Delete),
            "restore" => Some(Self::Restore),
            "purge" => Some(Self::Purge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub dataset_id: DatasetId,
    pub error: ErrorReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub action: BulkAction,
    pub succeeded: Vec<DatasetId>,
    pub failed: Vec<BulkFailure>,
}

/// Applies one action to each id independently; a failing id does not stop the rest.
///
/// # Errors
/// `Validation` for an unknown action or an empty id list.
pub fn bulk_action(v: &Visualizer, action_type: &str, ids: &[DatasetId]) -> Result<BulkReport, ImportError> {
    let action = BulkAction::parse(action_type)
        .ok_or_else(|| ImportError::validation(format!("unknown bulk action {action_type:?}")))?;
    if ids.is_empty() {
        return Err(ImportError::validation("no datasets selected"));
    }
    let mut report = BulkReport { action, succeeded: Vec::new(), failed: Vec::new() };
    for &id in ids {
        let result = match action {
            BulkAction::Delete => delete_dataset(v, id).map(drop),
            BulkAction::Restore => restore_dataset(v, id).map(drop),
            BulkAction::Purge => purge_dataset(v, id).map(drop),
        };
        match result {
            Ok(()) => report.succeeded.push(id),
            Err(e) => {
                log::warn!("bulk {action:?}: dataset {id} failed: {e}");
                report.failed.push(BulkFailure { dataset_id: id, error: e.report() });
            }
        }
    }
    Ok(report)
}
