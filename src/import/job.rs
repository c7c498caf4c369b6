use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ImportConfig;
use crate::types::{DatasetId, JobId, UploadId};
use crate::warnings::Warnings;

/// Cooperative cancellation flag, checked between batch flushes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Live counters of a running import, shareable with an observer thread.
#[derive(Debug, Default)]
pub struct Progress {
    rows_processed: AtomicU64,
    batches_flushed: AtomicU64,
    rows_written: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub rows_processed: u64,
    pub batches_flushed: u64,
    pub rows_written: u64,
}

impl Progress {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            rows_processed: self.rows_processed.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn row_processed(&self) -> u64 {
        self.rows_processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn batch_flushed(&self, rows: u64) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
    }
}

/// Caller-side knobs for one commit.
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Retry in place into this `Failed` dataset instead of creating a new one.
    pub target: Option<DatasetId>,
    pub cancel: Option<CancelToken>,
    pub progress: Option<Arc<Progress>>,
}

/// One import run. Owned by the coordinator for its duration.
#[derive(Debug)]
pub struct ImportJob {
    pub id: JobId,
    pub upload: UploadId,
    pub config: ImportConfig,
    pub progress: Arc<Progress>,
    pub cancel: CancelToken,
    pub started_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn new(upload: UploadId, config: ImportConfig, opts: &CommitOptions) -> Self {
        Self {
            id: JobId::new(),
            upload,
            config,
            progress: opts.progress.clone().unwrap_or_default(),
            cancel: opts.cancel.clone().unwrap_or_default(),
            started_at: Utc::now(),
        }
    }
}

/// Successful import summary.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub job_id: JobId,
    pub dataset_id: DatasetId,
    pub rows_imported: u64,
    pub columns: Vec<String>,
    pub warnings: Warnings,
}
