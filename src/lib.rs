pub mod api;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod encoding;
pub mod errors;
pub mod import;
pub mod logger;
pub mod parse;
pub mod schema;
pub mod sniff;
pub mod store;
pub mod types;
pub mod warnings;

mod test_support;

use crate::config::{ImportConfig, ParseOverrides, Settings};
use crate::errors::ImportError;
use crate::import::{Analysis, CommitOptions, ImportOutcome, Importer, Upload, UploadRegistry, UploadSource};
use crate::store::{DatasetStore, Engine};
use crate::types::UploadId;
use std::io::Read;
use std::sync::Arc;

/// The main entry point: settings, the dataset store, and the upload registry it imports from.
///
/// The store is passed in explicitly; nothing here is process-global.
pub struct Visualizer {
    settings: Settings,
    store: Arc<dyn DatasetStore>,
    uploads: Arc<UploadRegistry>,
    importer: Importer,
}

impl std::fmt::Debug for Visualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visualizer")
            .field("settings", &self.settings)
            .field("uploads", &self.uploads.len())
            .finish()
    }
}

impl Visualizer {
    /// Builds a visualizer over an existing store.
    pub fn new(settings: Settings, store: Arc<dyn DatasetStore>) -> Self {
        let uploads = Arc::new(UploadRegistry::new());
        let importer = Importer::new(store.clone(), uploads.clone(), settings.import.clone());
        Self { settings, store, uploads, importer }
    }

    /// Opens the store named by `settings.storage` (memory-only when no path is set).
    ///
    /// # Errors
    /// `Storage` when the log cannot be opened or replayed.
    pub fn open(settings: Settings) -> Result<Self, ImportError> {
        let engine = Engine::from_settings(&settings.storage)?;
        log::info!(
            "crockdata opened: store={}",
            engine.path().map_or_else(|| "memory".to_string(), |p| p.display().to_string())
        );
        Ok(Self::new(settings, Arc::new(engine)))
    }

    pub fn in_memory() -> Self {
        Self::new(Settings::default(), Arc::new(Engine::in_memory()))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn DatasetStore> {
        &self.store
    }

    pub fn uploads(&self) -> &UploadRegistry {
        &self.uploads
    }

    /// # Errors
    /// I/O errors reading metadata of a path source.
    pub fn register_upload(&self, file_name: &str, mime: Option<&str>, source: UploadSource) -> Result<Upload, ImportError> {
        Ok(self.uploads.register(file_name, mime, source)?)
    }

    /// Spools a streamed payload; copying stops one byte past `max_file_size`.
    ///
    /// # Errors
    /// I/O errors while spooling.
    pub fn register_reader<R: Read>(&self, file_name: &str, mime: Option<&str>, reader: R) -> Result<Upload, ImportError> {
        Ok(self.uploads.register_reader(file_name, mime, reader, Some(self.settings.import.max_file_size))?)
    }

    pub fn release_upload(&self, id: UploadId) -> bool {
        self.uploads.release(id)
    }

    /// # Errors
    /// See [`Importer::analyze`].
    pub fn analyze(&self, upload: UploadId, overrides: &ParseOverrides) -> Result<Analysis, ImportError> {
        self.importer.analyze(upload, overrides)
    }

    /// # Errors
    /// See [`Importer::commit`].
    pub fn commit(&self, upload: UploadId, config: &ImportConfig, opts: CommitOptions) -> Result<ImportOutcome, ImportError> {
        self.importer.commit(upload, config, opts)
    }
}
