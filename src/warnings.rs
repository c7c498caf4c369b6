//! Non-fatal findings collected alongside successful results.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Bytes not decodable under the configured encoding; replaced with U+FFFD.
    Encoding,
    /// Row wider than the header; extras kept under synthetic names.
    ExtraFields,
    /// Empty or repeated header names that were renamed.
    DuplicateHeader,
    /// Declared extension disagrees with the sniffed structure.
    ExtensionMismatch,
    /// Declared MIME type disagrees with the sniffed structure.
    MimeMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportWarning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<u64>,
    pub message: String,
}

impl ImportWarning {
    pub fn new(kind: WarningKind, row: Option<u64>, message: impl Into<String>) -> Self {
        Self { kind, row, message: message.into() }
    }
}

/// Bounded warning list; anything past `cap` is only counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Warnings {
    pub items: Vec<ImportWarning>,
    pub suppressed: u64,
    #[serde(skip)]
    cap: usize,
}

impl Warnings {
    pub fn with_cap(cap: usize) -> Self {
        Self { items: Vec::new(), suppressed: 0, cap }
    }

    pub fn push(&mut self, w: ImportWarning) {
        if self.items.len() < self.cap {
            self.items.push(w);
        } else {
            self.suppressed += 1;
        }
    }

    pub fn extend<I: IntoIterator<Item = ImportWarning>>(&mut self, iter: I) {
        for w in iter {
            self.push(w);
        }
    }

    /// Appends another collector's items and suppressed count, respecting this cap.
    pub fn merge(&mut self, other: Warnings) {
        self.extend(other.items);
        self.suppressed += other.suppressed;
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.suppressed == 0
    }

    pub fn len(&self) -> u64 {
        self.items.len() as u64 + self.suppressed
    }

    pub fn has(&self, kind: WarningKind) -> bool {
        self.items.iter().any(|w| w.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_counts_overflow() {
        let mut w = Warnings::with_cap(2);
        for i in 0..5 {
            w.push(ImportWarning::new(WarningKind::Encoding, Some(i), "bad byte"));
        }
        assert_eq!(w.items.len(), 2);
        assert_eq!(w.suppressed, 3);
        assert_eq!(w.len(), 5);
        assert!(w.has(WarningKind::Encoding));
    }
}
