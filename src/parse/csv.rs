use std::io::{BufRead, BufReader, Read};

use super::quote::QuoteTracker;
use super::{ParseOptions, Row, extend_columns, normalize_headers, synthetic_name};
use crate::encoding::{decode, has_utf8_bom};
use crate::errors::{Location, ParseError};
use crate::types::TextEncoding;
use crate::warnings::{ImportWarning, WarningKind};

/// Incremental RFC 4180 reader with header management.
///
/// Rows narrower than the columns are padded with empty strings; wider rows grow the
/// column set with synthetic names and raise an `ExtraFields` warning.
pub struct CsvRows<R: Read> {
    reader: csv::Reader<QuoteTracker<BufReader<R>>>,
    record: csv::ByteRecord,
    encoding: TextEncoding,
    bom_len: u64,
    columns: Vec<String>,
    header_width: usize,
    pending: Option<Vec<String>>,
    next_index: u64,
    warnings: Vec<ImportWarning>,
}

impl<R: Read> CsvRows<R> {
    /// Wraps `source` and consumes the header line (or peeks the first row).
    ///
    /// # Errors
    /// Propagates read failures and structural errors in the first record.
    pub fn new(source: R, opts: &ParseOptions) -> Result<Self, ParseError> {
        let mut buffered = BufReader::new(source);
        let bom_len = if has_utf8_bom(buffered.fill_buf()?) {
            buffered.consume(3);
            3
        } else {
            0
        };
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(opts.delimiter.byte())
            .from_reader(QuoteTracker::new(buffered, opts.delimiter.byte()));
        let mut this = Self {
            reader,
            record: csv::ByteRecord::new(),
            encoding: opts.encoding,
            bom_len,
            columns: Vec::new(),
            header_width: 0,
            pending: None,
            next_index: 0,
            warnings: Vec::new(),
        };
        if let Some(first) = this.read_fields(None)? {
            if opts.has_header {
                this.columns = normalize_headers(first, &mut this.warnings);
            } else {
                this.columns = (0..first.len()).map(synthetic_name).collect();
                this.pending = Some(first);
            }
            this.header_width = this.columns.len();
        }
        Ok(this)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn header_width(&self) -> usize {
        self.header_width
    }

    pub fn take_warnings(&mut self) -> Vec<ImportWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Next data row, `Ok(None)` at end of input.
    ///
    /// # Errors
    /// `MalformedStructure` for an unterminated quoted field or a CSV syntax error.
    pub fn next_row(&mut self) -> Result<Option<Row>, ParseError> {
        let index = self.next_index;
        let mut values = match self.pending.take() {
            Some(v) => v,
            None => match self.read_fields(Some(index))? {
                Some(v) => v,
                None => return Ok(None),
            },
        };
        if values.len() > self.columns.len() {
            let added = extend_columns(&mut self.columns, values.len());
            self.warnings.push(ImportWarning::new(
                WarningKind::ExtraFields,
                Some(index),
                format!(
                    "row {index} has {} fields but the header has {}; extra values kept as {}",
                    values.len(),
                    self.header_width,
                    added.join(", ")
                ),
            ));
        }
        values.resize(self.columns.len(), String::new());
        self.next_index += 1;
        Ok(Some(Row { index, values }))
    }

    fn read_fields(&mut self, row: Option<u64>) -> Result<Option<Vec<String>>, ParseError> {
        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(e) => return Err(self.csv_error(e)),
        }
        let end = self.reader.position().byte();
        if let Some((open, line)) = self.reader.get_ref().unterminated()
            && end > open
        {
            return Err(ParseError::malformed(
                "unterminated quoted field",
                Location { byte_offset: Some(open + self.bom_len), line: Some(line), column: None },
            ));
        }
        let mut lossy = false;
        let fields = self
            .record
            .iter()
            .map(|raw| {
                let (text, had_errors) = decode(self.encoding, raw);
                lossy |= had_errors;
                text.into_owned()
            })
            .collect();
        if lossy {
            let what = row.map_or_else(|| "header".to_string(), |i| format!("row {i}"));
            self.warnings.push(ImportWarning::new(
                WarningKind::Encoding,
                row,
                format!("{what} contains bytes invalid in {}; replaced with U+FFFD", self.encoding),
            ));
        }
        Ok(Some(fields))
    }

    fn csv_error(&self, e: csv::Error) -> ParseError {
        let location = e
            .position()
            .map(|p| Location {
                byte_offset: Some(p.byte() + self.bom_len),
                line: Some(p.line()),
                column: None,
            })
            .unwrap_or_default();
        match e.into_kind() {
            csv::ErrorKind::Io(io) => ParseError::Io(io),
            other => ParseError::malformed(format!("invalid CSV: {other:?}"), location),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Delimiter;

    fn rows(data: &[u8], opts: &ParseOptions) -> (Vec<String>, Vec<Vec<String>>, Vec<ImportWarning>) {
        let mut r = CsvRows::new(data, opts).unwrap();
        let mut out = Vec::new();
        while let Some(row) = r.next_row().unwrap() {
            assert_eq!(row.index, out.len() as u64);
            out.push(row.values);
        }
        let w = r.take_warnings();
        (r.columns().to_vec(), out, w)
    }

    #[test]
    fn header_and_rows() {
        let (cols, data, w) = rows(b"id,name\n1,Ann\n2,Bob\n", &ParseOptions::default());
        assert_eq!(cols, vec!["id", "name"]);
        assert_eq!(data, vec![vec!["1", "Ann"], vec!["2", "Bob"]]);
        assert!(w.is_empty());
    }

    #[test]
    fn quoted_fields_keep_delimiters_quotes_and_newlines() {
        let (_, data, _) = rows(b"a,b\n\"x,y\",\"say \"\"hi\"\"\nthere\"\n", &ParseOptions::default());
        assert_eq!(data, vec![vec!["x,y", "say \"hi\"\nthere"]]);
    }

    #[test]
    fn crlf_and_missing_final_newline() {
        let (_, data, _) = rows(b"a,b\r\n1,2\r\n3,4", &ParseOptions::default());
        assert_eq!(data, vec![vec!["1", "2"], vec!["3", "4"]]);
    }

    #[test]
    fn short_rows_pad_and_long_rows_extend() {
        let (cols, data, w) = rows(b"a,b\n1\n1,2,3\n", &ParseOptions::default());
        assert_eq!(cols, vec!["a", "b", "column_3"]);
        assert_eq!(data[0], vec!["1", ""]);
        assert_eq!(data[1], vec!["1", "2", "3"]);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].kind, WarningKind::ExtraFields);
        assert_eq!(w[0].row, Some(1));
    }

    #[test]
    fn no_header_synthesizes_names_and_keeps_first_row() {
        let opts = ParseOptions { delimiter: Delimiter::Semicolon, has_header: false, ..Default::default() };
        let (cols, data, _) = rows(b"1;2\n3;4\n", &opts);
        assert_eq!(cols, vec!["column_1", "column_2"]);
        assert_eq!(data, vec![vec!["1", "2"], vec!["3", "4"]]);
    }

    #[test]
    fn bom_is_not_part_of_first_header() {
        let (cols, _, _) = rows(b"\xEF\xBB\xBFid,name\n1,x\n", &ParseOptions::default());
        assert_eq!(cols[0], "id");
    }

    #[test]
    fn unterminated_quote_reports_offset() {
        let mut r = CsvRows::new(&b"a,b\n1,\"open\n2,3\n"[..], &ParseOptions::default()).unwrap();
        match r.next_row() {
            Err(ParseError::MalformedStructure { location, .. }) => {
                assert_eq!(location.byte_offset, Some(6));
                assert_eq!(location.line, Some(2));
            }
            other => panic!("expected structural error, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_has_no_columns() {
        let (cols, data, _) = rows(b"", &ParseOptions::default());
        assert!(cols.is_empty());
        assert!(data.is_empty());
    }

    #[test]
    fn latin1_fields_decode() {
        let opts = ParseOptions { encoding: TextEncoding::Iso88591, ..Default::default() };
        let (_, data, w) = rows(b"name\ncaf\xe9\n", &opts);
        assert_eq!(data, vec![vec!["caf\u{e9}"]]);
        assert!(w.is_empty());
    }

    #[test]
    fn invalid_utf8_warns_per_row() {
        let (_, data, w) = rows(b"name\nok\nba\xffd\n", &ParseOptions::default());
        assert_eq!(data[1], vec!["ba\u{fffd}d"]);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].row, Some(1));
    }
}
