//! Registered uploads and the per-upload import claim.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;

use crate::errors::ImportError;
use crate::types::UploadId;

/// Where an upload's bytes come from when it is registered.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// A file the host already wrote to disk.
    Path(PathBuf),
    /// A payload held in memory.
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
enum Stored {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
    Spooled(Arc<NamedTempFile>),
}

/// A registered upload. Cloning shares the underlying bytes; every [`Upload::open`]
/// starts again from byte 0.
#[derive(Debug, Clone)]
pub struct Upload {
    pub id: UploadId,
    pub file_name: String,
    pub mime: Option<String>,
    pub size: u64,
    stored: Stored,
}

impl Upload {
    /// Extension of the declared file name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.file_name).extension().and_then(|e| e.to_str())
    }

    /// Opens a fresh reader positioned at the start of the upload.
    ///
    /// # Errors
    /// I/O errors opening the backing file.
    pub fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(match &self.stored {
            Stored::Path(p) => Box::new(BufReader::new(File::open(p)?)),
            Stored::Bytes(b) => Box::new(Cursor::new(Arc::clone(b))),
            Stored::Spooled(t) => {
                let mut f = t.reopen()?;
                f.seek(SeekFrom::Start(0))?;
                Box::new(BufReader::new(f))
            }
        })
    }
}

/// Uploads known to this process, plus the set currently claimed by an import.
#[derive(Debug, Default)]
pub struct UploadRegistry {
    uploads: RwLock<HashMap<UploadId, Upload>>,
    claims: Mutex<HashSet<UploadId>>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// I/O errors reading the metadata of a path source.
    pub fn register(&self, file_name: &str, mime: Option<&str>, source: UploadSource) -> io::Result<Upload> {
        let (size, stored) = match source {
            UploadSource::Path(p) => (std::fs::metadata(&p)?.len(), Stored::Path(p)),
            UploadSource::Bytes(b) => (b.len() as u64, Stored::Bytes(Arc::from(b))),
        };
        Ok(self.insert(file_name, mime, size, stored))
    }

    /// Spools `reader` into a temporary file. At most `limit + 1` bytes are copied so an
    /// oversized stream is still detected without being stored whole.
    ///
    /// # Errors
    /// I/O errors while reading or spooling.
    pub fn register_reader<R: Read>(
        &self,
        file_name: &str,
        mime: Option<&str>,
        reader: R,
        limit: Option<u64>,
    ) -> io::Result<Upload> {
        let mut spool = NamedTempFile::new()?;
        let size = match limit {
            Some(max) => io::copy(&mut reader.take(max.saturating_add(1)), spool.as_file_mut())?,
            None => {
                let mut reader = reader;
                io::copy(&mut reader, spool.as_file_mut())?
            }
        };
        Ok(self.insert(file_name, mime, size, Stored::Spooled(Arc::new(spool))))
    }

    fn insert(&self, file_name: &str, mime: Option<&str>, size: u64, stored: Stored) -> Upload {
        let upload = Upload {
            id: UploadId::new(),
            file_name: file_name.to_string(),
            mime: mime.map(str::to_string),
            size,
            stored,
        };
        log::debug!("upload {} registered: {:?} ({} bytes)", upload.id, upload.file_name, upload.size);
        self.uploads.write().insert(upload.id, upload.clone());
        upload
    }

    pub fn get(&self, id: UploadId) -> Option<Upload> {
        self.uploads.read().get(&id).cloned()
    }

    /// Forgets an upload. An import already running keeps its own handle to the bytes.
    pub fn release(&self, id: UploadId) -> bool {
        self.uploads.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.uploads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.read().is_empty()
    }

    /// Claims `id` for one import; the claim ends when the guard drops.
    ///
    /// # Errors
    /// `Conflict` while another import holds the claim.
    pub fn claim(&self, id: UploadId) -> Result<UploadClaim<'_>, ImportError> {
        if !self.claims.lock().insert(id) {
            return Err(ImportError::Conflict(format!("upload {id} is already being imported")));
        }
        Ok(UploadClaim { registry: self, id })
    }

    pub fn is_claimed(&self, id: UploadId) -> bool {
        self.claims.lock().contains(&id)
    }
}

/// RAII claim over an upload.
#[derive(Debug)]
pub struct UploadClaim<'a> {
    registry: &'a UploadRegistry,
    id: UploadId,
}

impl Drop for UploadClaim<'_> {
    fn drop(&mut self) {
        self.registry.claims.lock().remove(&self.id);
    }
}
