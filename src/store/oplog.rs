//! Append-only operation log.
//!
//! Frame layout: `len: u32 LE | crc32(payload): u32 LE | payload`, where the payload is
//! a bincode (serde, standard config) encoded [`StoreOp`].

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use crc32fast::Hasher as Crc32Hasher;
use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, RowRecord, Visualization};
use crate::errors::StoreError;
use crate::types::DatasetId;

const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum StoreOp {
    CreateDataset(Dataset),
    /// Full metadata snapshot after any change.
    UpdateDataset(Dataset),
    AppendRows { dataset_id: DatasetId, rows: Vec<RowRecord> },
    ClearRows { dataset_id: DatasetId },
    PurgeDataset { dataset_id: DatasetId },
    CreateVisualization(Visualization),
    /// Identifier counters, written first by compaction so purged ids stay retired.
    ReserveIds { next_dataset: u64, next_visualization: u64 },
}

fn checksum(payload: &[u8]) -> u32 {
    let mut h = Crc32Hasher::new();
    h.update(payload);
    h.finalize()
}

pub(crate) fn encode_frame(op: &StoreOp) -> Result<Vec<u8>, StoreError> {
    let payload = encode_to_vec(op, standard())?;
    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::Codec(format!("record of {} bytes is too large", payload.len())))?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&checksum(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes consecutive frames and returns them with the length of the valid prefix.
/// A short or checksum-failing frame ends the scan (torn tail).
pub(crate) fn decode_frames(buf: &[u8]) -> Result<(Vec<StoreOp>, usize), StoreError> {
    let mut ops = Vec::new();
    let mut offset = 0usize;
    while offset + HEADER_LEN <= buf.len() {
        let mut len_bytes = [0u8; 4];
        let mut crc_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&buf[offset..offset + 4]);
        crc_bytes.copy_from_slice(&buf[offset + 4..offset + HEADER_LEN]);
        let len = u32::from_le_bytes(len_bytes) as usize;
        let start = offset + HEADER_LEN;
        if start + len > buf.len() {
            break;
        }
        let payload = &buf[start..start + len];
        if checksum(payload) != u32::from_le_bytes(crc_bytes) {
            log::warn!("oplog: checksum mismatch at byte {offset}; ignoring the rest");
            break;
        }
        let (op, _) = decode_from_slice::<StoreOp, _>(payload, standard())?;
        ops.push(op);
        offset = start + len;
    }
    Ok((ops, offset))
}

pub(crate) struct OpLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl std::fmt::Debug for OpLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpLog").field("path", &self.path).finish()
    }
}

impl OpLog {
    /// Opens (or creates) the log and returns every intact record. A torn tail is
    /// truncated so later appends start on a frame boundary.
    pub(crate) fn open(path: &Path) -> Result<(Self, Vec<StoreOp>), StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let (ops, valid) = decode_frames(&buf)?;
        if valid < buf.len() {
            log::warn!("oplog: dropping {} trailing bytes of {}", buf.len() - valid, path.display());
            file.set_len(valid as u64)?;
        }
        let file = OpenOptions::new().append(true).open(path)?;
        Ok((Self { path: path.to_path_buf(), writer: BufWriter::new(file) }, ops))
    }

    pub(crate) fn append(&mut self, op: &StoreOp) -> Result<(), StoreError> {
        let frame = encode_frame(op)?;
        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        Ok(())
    }

    pub(crate) fn sync(&mut self) -> Result<(), StoreError> {
        self.writer.flush()?;
        self.writer.get_mut().sync_data()?;
        Ok(())
    }

    /// Replaces the log with `ops`, written to a sibling file and renamed into place.
    pub(crate) fn rewrite(&mut self, ops: &[StoreOp]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("compacting");
        {
            let mut w = BufWriter::new(File::create(&tmp)?);
            for op in ops {
                w.write_all(&encode_frame(op)?)?;
            }
            w.flush()?;
            w.get_mut().sync_all()?;
        }
        self.writer.flush()?;
        fs::rename(&tmp, &self.path)?;
        self.writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        Ok(())
    }
}
