//! Dataset Store: metadata CRUD, row records, visualizations and paginated listing.

mod engine;
mod oplog;

pub use engine::Engine;

use crate::dataset::{Dataset, DatasetPatch, ListQuery, NewDataset, NewVisualization, Page, RowRecord, Visualization};
use crate::errors::StoreError;
use crate::types::{DatasetId, JobId};

/// What a hard delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PurgeSummary {
    pub dataset_id: DatasetId,
    pub rows_removed: u64,
    pub visualizations_removed: u64,
}

/// Storage connection threaded through the coordinator and entry points.
///
/// Import-side mutations (`append_rows`, `complete_import`, `fail_import`) are only
/// accepted from the job that holds the dataset's lease; anything else is a `Conflict`.
pub trait DatasetStore: Send + Sync {
    /// Creates a dataset in `Importing` state, leased to `owner`.
    fn create_dataset(&self, draft: NewDataset, owner: JobId) -> Result<Dataset, StoreError>;

    /// Re-leases a `Failed` dataset for an in-place retry: rows are cleared and the
    /// metadata replaced by `draft`. Identity and import date are kept.
    fn claim_for_retry(&self, id: DatasetId, draft: NewDataset, owner: JobId) -> Result<Dataset, StoreError>;

    /// Appends a batch in order; returns the number of rows now stored.
    fn append_rows(&self, id: DatasetId, owner: JobId, rows: Vec<RowRecord>) -> Result<u64, StoreError>;

    /// Sets the final counters, flips the dataset to `Active` and releases the lease.
    fn complete_import(
        &self,
        id: DatasetId,
        owner: JobId,
        columns: Vec<String>,
        total_rows: u64,
    ) -> Result<Dataset, StoreError>;

    /// Marks the dataset `Failed`, keeping written rows, and releases the lease.
    fn fail_import(&self, id: DatasetId, owner: JobId, reason: &str) -> Result<Dataset, StoreError>;

    fn get_dataset(&self, id: DatasetId) -> Result<Dataset, StoreError>;

    fn update_dataset(&self, id: DatasetId, patch: DatasetPatch) -> Result<Dataset, StoreError>;

    fn list_datasets(&self, query: &ListQuery) -> Result<Page<Dataset>, StoreError>;

    /// Soft delete: hides the dataset from default listings, keeps its rows.
    fn delete_dataset(&self, id: DatasetId) -> Result<Dataset, StoreError>;

    fn restore_dataset(&self, id: DatasetId) -> Result<Dataset, StoreError>;

    /// Removes the dataset, its rows and its visualizations.
    fn hard_delete_dataset(&self, id: DatasetId) -> Result<PurgeSummary, StoreError>;

    /// Rows with `row_index >= offset`, at most `limit` of them, in index order.
    fn rows(&self, id: DatasetId, offset: u64, limit: u64) -> Result<Vec<RowRecord>, StoreError>;

    fn row_count(&self, id: DatasetId) -> Result<u64, StoreError>;

    fn create_visualization(&self, new: NewVisualization) -> Result<Visualization, StoreError>;

    fn visualizations(&self, dataset_id: DatasetId) -> Result<Vec<Visualization>, StoreError>;
}
