//! Bounded-sample preview of a parse: column names, first rows and a row-count bound.

use std::io::Read;

use serde::Serialize;

use crate::config::ImportSettings;
use crate::errors::ParseError;
use crate::parse::RowReader;
use crate::types::FileKind;
use crate::warnings::Warnings;

/// Number of data rows, exact when the whole source was scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum RowCountBound {
    Exact(u64),
    AtLeast(u64),
}

impl RowCountBound {
    pub fn rows(self) -> u64 {
        match self {
            Self::Exact(n) | Self::AtLeast(n) => n,
        }
    }

    pub fn is_exact(self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub kind: FileKind,
    /// Header (or first-row) names; the width rows are expected to have.
    pub columns: Vec<String>,
    /// Synthetic names given to values past the header width within the sample.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count_bound: RowCountBound,
    pub warnings: Warnings,
}

#[derive(Debug, Clone)]
pub struct Inferencer {
    sample_rows: usize,
    full_scan_bytes: u64,
    max_warnings: usize,
}

impl Default for Inferencer {
    fn default() -> Self {
        Self::from_settings(&ImportSettings::default())
    }
}

impl Inferencer {
    pub fn from_settings(settings: &ImportSettings) -> Self {
        Self {
            sample_rows: settings.preview_rows,
            full_scan_bytes: settings.full_scan_bytes,
            max_warnings: settings.max_warnings,
        }
    }

    #[must_use]
    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows;
        self
    }

    /// Reads up to the sample size (or the whole source when it is at most
    /// `full_scan_bytes` long) and builds the preview. Values stay text.
    ///
    /// # Errors
    /// Structural errors met within the scanned part of the source.
    pub fn infer<R: Read>(&self, kind: FileKind, mut reader: RowReader<R>, source_len: u64) -> Result<Preview, ParseError> {
        let full_scan = source_len <= self.full_scan_bytes;
        let mut warnings = Warnings::with_cap(self.max_warnings);
        warnings.extend(reader.take_warnings());
        let header_width = reader.header_width();
        let columns: Vec<String> = reader.columns().iter().take(header_width).cloned().collect();

        let mut rows = Vec::with_capacity(self.sample_rows);
        let mut seen = 0u64;
        let mut exhausted = true;
        while let Some(row) = reader.next() {
            let row = row?;
            seen += 1;
            warnings.extend(reader.take_warnings());
            if rows.len() < self.sample_rows {
                rows.push(row.values);
            } else if !full_scan {
                exhausted = false;
                break;
            }
        }
        let extra_columns = reader.columns().iter().skip(header_width).cloned().collect();
        let row_count_bound = if exhausted { RowCountBound::Exact(seen) } else { RowCountBound::AtLeast(seen) };
        log::debug!("preview: kind={kind} columns={} bound={row_count_bound:?}", columns.len());
        Ok(Preview { kind, columns, extra_columns, rows, row_count_bound, warnings })
    }
}
