use std::io::Read;
use std::sync::Arc;

use serde::Serialize;

use super::job::{CommitOptions, ImportJob, ImportOutcome};
use super::upload::{Upload, UploadRegistry};
use super::validate::{check_classification, check_upload};
use crate::config::{ImportConfig, ImportSettings, ParseOverrides};
use crate::dataset::{NewDataset, RowRecord};
use crate::errors::{ImportError, StoreError};
use crate::parse::{ParseOptions, RowReader};
use crate::schema::{Inferencer, Preview};
use crate::sniff::{Classification, Sniffer};
use crate::store::DatasetStore;
use crate::types::{DatasetId, FileKind, UploadId};
use crate::warnings::Warnings;

/// Result of analyzing an upload: what it is, how it would be parsed, and a preview.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub upload_id: UploadId,
    pub file_name: String,
    pub file_size: u64,
    pub classification: Classification,
    pub options: ParseOptions,
    pub preview: Preview,
}

/// Orchestrates sniff, parse, infer and persist for registered uploads.
pub struct Importer {
    store: Arc<dyn DatasetStore>,
    uploads: Arc<UploadRegistry>,
    settings: ImportSettings,
    sniffer: Sniffer,
    inferencer: Inferencer,
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer").field("settings", &self.settings).finish()
    }
}

impl Importer {
    pub fn new(store: Arc<dyn DatasetStore>, uploads: Arc<UploadRegistry>, settings: ImportSettings) -> Self {
        Self {
            sniffer: Sniffer::from_settings(&settings),
            inferencer: Inferencer::from_settings(&settings),
            store,
            uploads,
            settings,
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    fn upload(&self, id: UploadId) -> Result<Upload, ImportError> {
        self.uploads.get(id).ok_or_else(|| ImportError::NotFound(format!("upload {id}")))
    }

    fn classify(&self, upload: &Upload) -> Result<Classification, ImportError> {
        check_upload(&self.settings, upload)?;
        let c = self.sniffer.sniff_reader(upload.open()?, upload.size, upload.extension(), upload.mime.as_deref())?;
        check_classification(&self.settings, &c)?;
        Ok(c)
    }

    /// Sniffs the upload and parses a bounded sample into a preview. Nothing is stored.
    ///
    /// # Errors
    /// `Validation` (size, type), `Structural` (unknown or malformed content), `NotFound`.
    pub fn analyze(&self, upload_id: UploadId, overrides: &ParseOverrides) -> Result<Analysis, ImportError> {
        let upload = self.upload(upload_id)?;
        let mut classification = self.classify(&upload)?;
        let options = overrides.resolve(&classification);
        let reader = RowReader::open(classification.kind, &options, upload.open()?)?;
        let sampled = self.inferencer.infer(classification.kind, reader, upload.size)?;

        let mut warnings = Warnings::with_cap(self.settings.max_warnings);
        warnings.extend(std::mem::take(&mut classification.warnings));
        warnings.merge(sampled.warnings);
        let preview = Preview { warnings, ..sampled };
        log::info!(
            "analyze: upload={upload_id} file={:?} kind={} columns={} rows={:?}",
            upload.file_name,
            classification.kind,
            preview.columns.len(),
            preview.row_count_bound
        );
        Ok(Analysis {
            upload_id,
            file_name: upload.file_name,
            file_size: upload.size,
            classification,
            options,
            preview,
        })
    }

    /// Runs a full import of a registered upload.
    ///
    /// Without `opts.target` a new dataset is created; with it, the named `Failed` dataset
    /// is cleared and re-imported in place.
    ///
    /// # Errors
    /// `Validation` before anything is written; `Conflict` when the upload is already being
    /// imported; `Structural` (with the dataset id once one exists), `Storage`, `Cancelled`.
    pub fn commit(&self, upload_id: UploadId, config: &ImportConfig, opts: CommitOptions) -> Result<ImportOutcome, ImportError> {
        config.validate()?;
        let upload = self.upload(upload_id)?;
        let _claim = self.uploads.claim(upload_id)?;
        let mut classification = self.classify(&upload)?;
        let kind = classification.kind;
        let job = ImportJob::new(upload_id, config.clone(), &opts);
        log::info!(
            "import: job={} upload={upload_id} file={:?} kind={kind} size={} target={:?}",
            job.id,
            upload.file_name,
            upload.size,
            opts.target
        );

        let reader = RowReader::open(kind, &ParseOptions::from(config), upload.open()?).inspect_err(|e| {
            log::error!("import: job={} rejected before any row was stored: {e}", job.id);
        })?;
        let draft = NewDataset {
            name: config.dataset_name.trim().to_string(),
            description: config.dataset_description.clone(),
            file_name: upload.file_name.clone(),
            file_type: kind,
            file_size: upload.size,
            delimiter: config.delimiter,
            encoding: config.encoding,
            has_header: config.has_header,
        };
        let dataset = match opts.target {
            Some(id) => self.store.claim_for_retry(id, draft, job.id)?,
            None => self.store.create_dataset(draft, job.id)?,
        };

        let mut warnings = Warnings::with_cap(self.settings.max_warnings);
        warnings.extend(std::mem::take(&mut classification.warnings));
        self.run(&job, dataset.id, kind, reader, warnings)
    }

    fn run<R: Read>(
        &self,
        job: &ImportJob,
        id: DatasetId,
        kind: FileKind,
        mut reader: RowReader<R>,
        mut warnings: Warnings,
    ) -> Result<ImportOutcome, ImportError> {
        let batch_size = self.settings.batch_size.max(1);
        let progress_every = self.settings.progress_every.max(1);
        let mut batch: Vec<RowRecord> = Vec::with_capacity(batch_size);
        let mut written = 0u64;
        self.collect_warnings(job, &mut reader, &mut warnings);

        if job.cancel.is_cancelled() {
            return Err(self.cancel(job, id, written));
        }
        while let Some(next) = reader.next() {
            let row = match next {
                Ok(row) => row,
                Err(e) => {
                    if !batch.is_empty()
                        && let Err(flush_err) = self.flush(job, id, &mut batch, &mut written)
                    {
                        log::error!("import: job={} could not keep rows read before the error: {flush_err}", job.id);
                    }
                    self.mark_failed(job, id, &e.to_string());
                    log::error!("import: job={} dataset={id} {kind} parse failed after {written} rows: {e}", job.id);
                    return Err(ImportError::from(e).with_dataset(id));
                }
            };
            self.collect_warnings(job, &mut reader, &mut warnings);
            batch.push(RowRecord::new(row.index, reader.columns(), row.values));
            let processed = job.progress.row_processed();
            if processed % progress_every == 0 {
                log::info!("import: job={} dataset={id} processed {processed} rows", job.id);
            }
            if batch.len() >= batch_size {
                self.flush(job, id, &mut batch, &mut written)?;
                if job.cancel.is_cancelled() {
                    return Err(self.cancel(job, id, written));
                }
            }
        }
        self.flush(job, id, &mut batch, &mut written)?;

        let columns = reader.columns().to_vec();
        self.store
            .complete_import(id, job.id, columns.clone(), written)
            .map_err(|e| self.storage_failure(job, id, written, e))?;
        log::info!(
            "import: job={} dataset={id} complete: {written} rows, {} columns, {} warnings",
            job.id,
            columns.len(),
            warnings.len()
        );
        Ok(ImportOutcome { job_id: job.id, dataset_id: id, rows_imported: written, columns, warnings })
    }

    fn collect_warnings<R: Read>(&self, job: &ImportJob, reader: &mut RowReader<R>, warnings: &mut Warnings) {
        for w in reader.take_warnings() {
            if warnings.items.len() < self.settings.max_warnings {
                log::warn!("import: job={} {:?}: {}", job.id, w.kind, w.message);
            }
            warnings.push(w);
        }
    }

    fn flush(&self, job: &ImportJob, id: DatasetId, batch: &mut Vec<RowRecord>, written: &mut u64) -> Result<(), ImportError> {
        if batch.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(batch);
        let n = rows.len() as u64;
        match self.store.append_rows(id, job.id, rows) {
            Ok(stored) => {
                *written = stored;
                job.progress.batch_flushed(n);
                log::debug!("import: job={} dataset={id} flushed {n} rows ({stored} stored)", job.id);
                Ok(())
            }
            Err(e) => Err(self.storage_failure(job, id, *written, e)),
        }
    }

    fn storage_failure(&self, job: &ImportJob, id: DatasetId, written: u64, e: StoreError) -> ImportError {
        log::error!("import: job={} dataset={id} storage failure after {written} rows: {e}", job.id);
        let err = match ImportError::from(e) {
            ImportError::Storage { message, .. } => {
                ImportError::Storage { message, dataset_id: Some(id), last_row_index: written.checked_sub(1) }
            }
            other => other,
        };
        self.mark_failed(job, id, &err.to_string());
        err
    }

    fn cancel(&self, job: &ImportJob, id: DatasetId, written: u64) -> ImportError {
        log::warn!("import: job={} dataset={id} cancelled after {written} rows", job.id);
        self.mark_failed(job, id, "cancelled");
        ImportError::Cancelled { dataset_id: id, rows_written: written }
    }

    /// Best effort: the lease may already be gone if the store itself failed.
    fn mark_failed(&self, job: &ImportJob, id: DatasetId, reason: &str) {
        if let Err(e) = self.store.fail_import(id, job.id, reason) {
            log::error!("import: job={} could not mark dataset {id} failed: {e}", job.id);
        }
    }
}
