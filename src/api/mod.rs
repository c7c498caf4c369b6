//! Entry points called by the host framework, plus the route registry that maps
//! route names onto them.

pub mod datasets;
pub mod imports;
pub mod params;
pub mod router;

pub use datasets::{
    BulkAction, BulkFailure, BulkReport, DatasetPreview, bulk_action, delete_dataset, get_dataset_preview,
    get_datasets, purge_dataset, restore_dataset, update_dataset,
};
pub use imports::{analyze_file, import_file};
pub use params::Request;
pub use router::{dispatch, routes};
