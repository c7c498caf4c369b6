//! Streaming parser: bytes of a classified file in, positional rows out.
//!
//! CSV is read incrementally through the `csv` crate. JSON and XML documents are
//! decoded whole (uploads are size-capped) and then handed out row by row through
//! the same [`RowReader`] surface.

mod csv;
mod json;
mod quote;
mod xml;

use std::collections::{HashMap, HashSet};
use std::io::Read;

use crate::config::ImportConfig;
use crate::encoding::{decode, skip_bom};
use crate::errors::{Location, ParseError};
use crate::types::{Delimiter, FileKind, TextEncoding};
use crate::warnings::{ImportWarning, WarningKind};

pub use self::csv::CsvRows;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ParseOptions {
    pub delimiter: Delimiter,
    pub encoding: TextEncoding,
    pub has_header: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { delimiter: Delimiter::Comma, encoding: TextEncoding::Utf8, has_header: true }
    }
}

impl From<&ImportConfig> for ParseOptions {
    fn from(cfg: &ImportConfig) -> Self {
        Self { delimiter: cfg.delimiter, encoding: cfg.encoding, has_header: cfg.has_header }
    }
}

/// One data row. `values` lines up with the reader's columns at the time it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub index: u64,
    pub values: Vec<String>,
}

/// Single-pass, forward-only row sequence over one opened source.
pub struct RowReader<R: Read> {
    inner: Inner<R>,
    failed: bool,
}

enum Inner<R: Read> {
    Csv(CsvRows<R>),
    Table(TableRows),
}

impl<R: Read> RowReader<R> {
    /// Opens a parser over `source`. For CSV the header (or first row) is read here.
    ///
    /// # Errors
    /// `MalformedStructure` for an unknown kind or a document that cannot be parsed,
    /// `Io` for read failures.
    pub fn open(kind: FileKind, opts: &ParseOptions, source: R) -> Result<Self, ParseError> {
        let inner = match kind {
            FileKind::Csv => Inner::Csv(CsvRows::new(source, opts)?),
            FileKind::Json => Inner::Table(TableRows::load(source, opts.encoding, json::read_table)?),
            FileKind::Xml => Inner::Table(TableRows::load(source, opts.encoding, xml::read_table)?),
            FileKind::Unknown => {
                return Err(ParseError::malformed("unrecognized file structure", Location::default()));
            }
        };
        Ok(Self { inner, failed: false })
    }

    /// Column names known so far. Only ever grows, by appending synthetic names.
    pub fn columns(&self) -> &[String] {
        match &self.inner {
            Inner::Csv(c) => c.columns(),
            Inner::Table(t) => &t.columns,
        }
    }

    /// Width of the header (or first row) the column set was fixed at.
    pub fn header_width(&self) -> usize {
        match &self.inner {
            Inner::Csv(c) => c.header_width(),
            Inner::Table(t) => t.columns.len(),
        }
    }

    /// Drains warnings accumulated since the last call.
    pub fn take_warnings(&mut self) -> Vec<ImportWarning> {
        match &mut self.inner {
            Inner::Csv(c) => c.take_warnings(),
            Inner::Table(t) => std::mem::take(&mut t.warnings),
        }
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = Result<Row, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = match &mut self.inner {
            Inner::Csv(c) => c.next_row().transpose(),
            Inner::Table(t) => t.next_row().map(Ok),
        };
        if matches!(next, Some(Err(_))) {
            self.failed = true;
        }
        next
    }
}

/// A fully parsed document: union of columns in first-seen order and padded rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Accumulates keyed records into a [`Table`].
#[derive(Debug, Default)]
pub(crate) struct TableBuilder {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl TableBuilder {
    pub(crate) fn with_columns(columns: Vec<String>) -> Self {
        let index = columns.iter().enumerate().map(|(i, c)| (c.clone(), i)).collect();
        Self { columns, index, rows: Vec::new() }
    }

    /// Adds one record. A key repeated within the same record has its values joined with `"; "`.
    pub(crate) fn push<I: IntoIterator<Item = (String, String)>>(&mut self, fields: I) {
        let mut row = vec![String::new(); self.columns.len()];
        let mut filled = vec![false; self.columns.len()];
        for (key, value) in fields {
            let i = match self.index.get(&key) {
                Some(&i) => i,
                None => {
                    self.index.insert(key.clone(), self.columns.len());
                    self.columns.push(key);
                    self.columns.len() - 1
                }
            };
            if row.len() <= i {
                row.resize(i + 1, String::new());
                filled.resize(i + 1, false);
            }
            if filled[i] {
                row[i].push_str("; ");
                row[i].push_str(&value);
            } else {
                row[i] = value;
                filled[i] = true;
            }
        }
        self.rows.push(row);
    }

    pub(crate) fn finish(mut self) -> Table {
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        Table { columns: self.columns, rows: self.rows }
    }
}

pub(crate) struct TableRows {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<String>>,
    next_index: u64,
    warnings: Vec<ImportWarning>,
}

impl TableRows {
    fn load<R: Read>(
        mut source: R,
        encoding: TextEncoding,
        parse: fn(&str) -> Result<Table, ParseError>,
    ) -> Result<Self, ParseError> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        let (text, had_errors) = decode(encoding, skip_bom(&bytes));
        let mut warnings = Vec::new();
        if had_errors {
            warnings.push(ImportWarning::new(
                WarningKind::Encoding,
                None,
                format!("document contains bytes invalid in {encoding}; replaced with U+FFFD"),
            ));
        }
        let table = parse(&text)?;
        Ok(Self { columns: table.columns, rows: table.rows.into_iter(), next_index: 0, warnings })
    }

    fn next_row(&mut self) -> Option<Row> {
        let values = self.rows.next()?;
        let index = self.next_index;
        self.next_index += 1;
        Some(Row { index, values })
    }
}

/// Positional name used when a header is absent, empty or shorter than a row.
pub fn synthetic_name(position: usize) -> String {
    format!("column_{}", position + 1)
}

fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_default()
}

/// Trims header cells, names empty ones positionally and suffixes repeats.
pub(crate) fn normalize_headers(raw: Vec<String>, warnings: &mut Vec<ImportWarning>) -> Vec<String> {
    let mut taken = HashSet::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());
    for (i, cell) in raw.into_iter().enumerate() {
        let trimmed = cell.trim();
        let base = if trimmed.is_empty() { synthetic_name(i) } else { trimmed.to_string() };
        let name = unique_name(&base, &taken);
        if name != trimmed {
            warnings.push(ImportWarning::new(
                WarningKind::DuplicateHeader,
                None,
                format!("header {} {trimmed:?} renamed to {name:?}", i + 1),
            ));
        }
        taken.insert(name.clone());
        out.push(name);
    }
    out
}

/// Appends synthetic names until `columns` is `width` wide; returns the added names.
pub(crate) fn extend_columns(columns: &mut Vec<String>, width: usize) -> Vec<String> {
    let mut taken: HashSet<String> = columns.iter().cloned().collect();
    let mut added = Vec::new();
    for i in columns.len()..width {
        let name = unique_name(&synthetic_name(i), &taken);
        taken.insert(name.clone());
        added.push(name.clone());
        columns.push(name);
    }
    added
}
