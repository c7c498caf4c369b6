//! Format detection heuristics for uploads.
//!
//! Classification looks at the leading bytes first. A leading `{`, `[` or `<` only
//! counts once the sample reads as JSON or XML, or when the declared extension agrees.
//! The extension alone decides only for an empty file.

use std::io::{self, Read};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::config::ImportSettings;
use crate::encoding::{guess_encoding, skip_bom};
use crate::types::{Delimiter, FileKind, TextEncoding};
use crate::warnings::{ImportWarning, WarningKind};

/// Result of sniffing one upload. `Unknown` is a reportable outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Classification {
    pub kind: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<Delimiter>,
    pub encoding: TextEncoding,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ImportWarning>,
}

#[derive(Debug, Clone)]
pub struct Sniffer {
    sample_bytes: usize,
    sample_lines: usize,
}

impl Default for Sniffer {
    fn default() -> Self {
        Self::from_settings(&ImportSettings::default())
    }
}

impl Sniffer {
    pub fn from_settings(settings: &ImportSettings) -> Self {
        Self {
            sample_bytes: settings.sniff_sample_bytes.max(1),
            sample_lines: settings.sniff_lines.max(1),
        }
    }

    /// Reads the bounded leading sample and classifies it.
    ///
    /// # Errors
    /// Propagates read failures of the source.
    pub fn sniff_reader<R: Read>(
        &self,
        reader: R,
        total_len: u64,
        extension: Option<&str>,
        mime: Option<&str>,
    ) -> io::Result<Classification> {
        let mut sample = Vec::with_capacity(self.sample_bytes.min(total_len as usize));
        reader.take(self.sample_bytes as u64).read_to_end(&mut sample)?;
        let truncated = total_len > sample.len() as u64;
        Ok(self.sniff(extension, mime, &sample, truncated))
    }

    /// Classifies a leading byte sample given the declared extension and MIME type.
    pub fn sniff(
        &self,
        extension: Option<&str>,
        mime: Option<&str>,
        sample: &[u8],
        truncated: bool,
    ) -> Classification {
        let declared = extension.map(FileKind::from_extension);
        let encoding = guess_encoding(sample, truncated);
        let kind = match structural_kind(sample, truncated, declared) {
            Some(k) => k,
            None => match declared {
                Some(k) if k != FileKind::Unknown && is_blank(sample) => k,
                _ => FileKind::Unknown,
            },
        };
        let mut warnings = Vec::new();
        if kind != FileKind::Unknown {
            if let (Some(ext), Some(d)) = (extension, declared)
                && d != kind
            {
                warnings.push(ImportWarning::new(
                    WarningKind::ExtensionMismatch,
                    None,
                    format!("declared extension .{ext} but content looks like {kind}"),
                ));
            }
            if let Some(m) = mime.map(normalize_mime)
                && !m.is_empty()
                && m != "application/octet-stream"
                && !kind.mime_types().contains(&m.as_str())
            {
                warnings.push(ImportWarning::new(
                    WarningKind::MimeMismatch,
                    None,
                    format!("declared MIME type {m} does not match {kind}"),
                ));
            }
        }
        let delimiter = (kind == FileKind::Csv).then(|| guess_delimiter(sample, self.sample_lines));
        log::debug!("sniff: kind={kind} delimiter={delimiter:?} encoding={encoding} truncated={truncated}");
        Classification { kind, delimiter, encoding, warnings }
    }
}

fn normalize_mime(m: &str) -> String {
    m.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn is_blank(sample: &[u8]) -> bool {
    skip_bom(sample).iter().all(u8::is_ascii_whitespace)
}

/// Structural markers: `{`/`[` open JSON, `<` opens XML, printable text is CSV.
fn structural_kind(sample: &[u8], truncated: bool, declared: Option<FileKind>) -> Option<FileKind> {
    let body = skip_bom(sample);
    let start = body.iter().position(|b| !b.is_ascii_whitespace())?;
    let body = &body[start..];
    if body.contains(&0) {
        return Some(FileKind::Unknown);
    }
    let candidate = match body[0] {
        b'{' | b'[' => Some((FileKind::Json, reads_as_json(body, truncated))),
        b'<' => Some((FileKind::Xml, reads_as_xml(body, truncated))),
        _ => None,
    };
    if let Some((kind, parsed)) = candidate {
        if parsed || declared == Some(kind) {
            return Some(kind);
        }
        log::debug!("sniff: leading {:?} but sample is not {kind}", char::from(body[0]));
    }
    Some(if looks_textual(body) { FileKind::Csv } else { FileKind::Unknown })
}

/// One complete JSON value, or a value cut off by the end of a truncated sample.
fn reads_as_json(body: &[u8], truncated: bool) -> bool {
    let text = String::from_utf8_lossy(body);
    match serde_json::from_str::<serde::de::IgnoredAny>(&text) {
        Ok(_) => true,
        Err(e) => truncated && e.is_eof(),
    }
}

/// Well-formed markup with at least one element and no text outside the root.
/// A truncated sample is cut after its last `>` and may leave elements open.
fn reads_as_xml(body: &[u8], truncated: bool) -> bool {
    let body = match body.iter().rposition(|&b| b == b'>') {
        Some(end) if truncated => &body[..=end],
        _ => body,
    };
    let text = String::from_utf8_lossy(body);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);
    let mut depth = 0usize;
    let mut elements = 0usize;
    loop {
        match reader.read_event() {
            Err(_) => return false,
            Ok(Event::Start(_)) => {
                depth += 1;
                elements += 1;
            }
            Ok(Event::Empty(_)) => elements += 1,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Text(t)) if depth == 0 && !t.iter().all(u8::is_ascii_whitespace) => return false,
            Ok(Event::Eof) => return elements > 0 && (depth == 0 || truncated),
            Ok(_) => {}
        }
    }
}

fn looks_textual(body: &[u8]) -> bool {
    let control = body
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B))
        .count();
    control * 100 <= body.len()
}

/// Counts each candidate outside quoted spans over the first `max_lines` lines and
/// picks the most frequent; comma wins ties and empty samples.
pub fn guess_delimiter(sample: &[u8], max_lines: usize) -> Delimiter {
    let mut counts = [0usize; 4];
    let mut in_quotes = false;
    let mut lines = 0usize;
    for &b in skip_bom(sample) {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => {
                lines += 1;
                if lines >= max_lines {
                    break;
                }
            }
            _ if !in_quotes => {
                if let Some(i) = Delimiter::CANDIDATES.iter().position(|d| d.byte() == b) {
                    counts[i] += 1;
                }
            }
            _ => {}
        }
    }
    let mut best = 0;
    for i in 1..counts.len() {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    Delimiter::CANDIDATES[best]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff(ext: Option<&str>, data: &[u8]) -> Classification {
        Sniffer::default().sniff(ext, None, data, false)
    }

    #[test]
    fn csv_delimiters() {
        assert_eq!(sniff(Some("csv"), b"a;b;c\n1;2;3\n").delimiter, Some(Delimiter::Semicolon));
        assert_eq!(sniff(Some("csv"), b"a\tb\n1\t2\n").delimiter, Some(Delimiter::Tab));
        assert_eq!(sniff(Some("csv"), b"a|b\n1|2\n").delimiter, Some(Delimiter::Pipe));
        assert_eq!(sniff(Some("csv"), b"a,b\n1,2\n").delimiter, Some(Delimiter::Comma));
    }

    #[test]
    fn ties_and_quoted_spans_favor_comma() {
        assert_eq!(guess_delimiter(b"a,b;c\n", 10), Delimiter::Comma);
        assert_eq!(guess_delimiter(b"single\n", 10), Delimiter::Comma);
        // semicolons inside quotes do not count
        assert_eq!(guess_delimiter(b"\"x;y;z\",1\n\"p;q\",2\n", 10), Delimiter::Comma);
    }

    #[test]
    fn structure_wins_over_extension() {
        let c = sniff(Some("csv"), b"[{\"a\":1}]");
        assert_eq!(c.kind, FileKind::Json);
        assert!(c.delimiter.is_none());
        assert_eq!(c.warnings.len(), 1);
        assert_eq!(c.warnings[0].kind, WarningKind::ExtensionMismatch);
        assert_eq!(sniff(Some("json"), b"  <rows><r/></rows>").kind, FileKind::Xml);
    }

    #[test]
    fn bracketed_csv_headers_stay_csv() {
        let c = sniff(Some("csv"), b"[Date],Value\n2024-01-01,5\n");
        assert_eq!(c.kind, FileKind::Csv);
        assert_eq!(c.delimiter, Some(Delimiter::Comma));
        assert!(c.warnings.is_empty());
        assert_eq!(sniff(Some("csv"), b"{id},name\n1,a\n").kind, FileKind::Csv);
        assert_eq!(sniff(Some("csv"), b"<b>,x\n1,2\n").kind, FileKind::Csv);
        assert_eq!(sniff(Some("csv"), b"<a>1</a>,2\n").kind, FileKind::Csv);
    }

    #[test]
    fn declared_format_keeps_malformed_documents() {
        assert_eq!(sniff(Some("json"), b"[{\"a\":1},").kind, FileKind::Json);
        assert_eq!(sniff(Some("xml"), b"<rows><r></rows>").kind, FileKind::Xml);
        assert_eq!(sniff(Some("txt"), b"[{\"a\":1},").kind, FileKind::Csv);
    }

    #[test]
    fn truncated_samples_still_confirm() {
        let sn = Sniffer::default();
        assert_eq!(sn.sniff(Some("csv"), None, b"[{\"a\":1},{\"a\":", true).kind, FileKind::Json);
        assert_eq!(sn.sniff(None, None, b"<rows><r><a>1</a></r><r><a>", true).kind, FileKind::Xml);
    }

    #[test]
    fn empty_file_uses_declared_extension() {
        assert_eq!(sniff(Some("csv"), b"").kind, FileKind::Csv);
        assert_eq!(sniff(Some("json"), b"\n  ").kind, FileKind::Json);
        assert_eq!(sniff(None, b"").kind, FileKind::Unknown);
        assert_eq!(sniff(Some("exe"), b"").kind, FileKind::Unknown);
    }

    #[test]
    fn binary_content_is_unknown() {
        assert_eq!(sniff(Some("csv"), b"PK\x03\x04\x00\x00binary").kind, FileKind::Unknown);
    }

    #[test]
    fn mime_mismatch_is_a_warning() {
        let c = Sniffer::default().sniff(Some("csv"), Some("application/json; charset=utf-8"), b"a,b\n", false);
        assert_eq!(c.kind, FileKind::Csv);
        assert!(c.warnings.iter().any(|w| w.kind == WarningKind::MimeMismatch));
        let ok = Sniffer::default().sniff(Some("csv"), Some("text/csv"), b"a,b\n", false);
        assert!(ok.warnings.is_empty());
    }

    #[test]
    fn encoding_guess() {
        assert_eq!(sniff(Some("csv"), b"n\ncaf\xe9\n").encoding, TextEncoding::Iso88591);
        assert_eq!(sniff(Some("csv"), "n\ncaf\u{e9}\n".as_bytes()).encoding, TextEncoding::Utf8);
    }

    #[test]
    fn sniff_reader_marks_truncation() {
        let data = "h\n".repeat(10);
        let sn = Sniffer::from_settings(&ImportSettings { sniff_sample_bytes: 4, ..Default::default() });
        let c = sn.sniff_reader(data.as_bytes(), data.len() as u64, Some("csv"), None).unwrap();
        assert_eq!(c.kind, FileKind::Csv);
    }
}
