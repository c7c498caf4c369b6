mod job;
mod pipeline;
mod upload;
mod validate;

pub use job::{CancelToken, CommitOptions, ImportJob, ImportOutcome, Progress, ProgressSnapshot};
pub use pipeline::{Analysis, Importer};
pub use upload::{Upload, UploadClaim, UploadRegistry, UploadSource};
pub use validate::{check_classification, check_upload};
