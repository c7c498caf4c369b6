use std::io::{self, Read};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StartField,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Pass-through reader that follows RFC 4180 quoting over the raw bytes.
///
/// The `csv` reader silently closes a quoted field left open at end of input; this
/// tracker remembers where such a field was opened so the caller can reject it.
#[derive(Debug)]
pub(crate) struct QuoteTracker<R> {
    inner: R,
    delimiter: u8,
    state: State,
    offset: u64,
    line: u64,
    open_at: Option<(u64, u64)>,
    eof: bool,
}

impl<R: Read> QuoteTracker<R> {
    pub(crate) fn new(inner: R, delimiter: u8) -> Self {
        Self { inner, delimiter, state: State::StartField, offset: 0, line: 1, open_at: None, eof: false }
    }

    /// Offset and line of the opening quote when input ended inside a quoted field.
    pub(crate) fn unterminated(&self) -> Option<(u64, u64)> {
        if self.eof && self.state == State::Quoted { self.open_at } else { None }
    }

    fn step(&mut self, b: u8) {
        let d = self.delimiter;
        self.state = match (self.state, b) {
            (State::StartField, b'"') => {
                self.open_at = Some((self.offset, self.line));
                State::Quoted
            }
            (State::StartField | State::Unquoted | State::QuoteInQuoted, b'\n' | b'\r') => State::StartField,
            (State::StartField | State::Unquoted | State::QuoteInQuoted, x) if x == d => State::StartField,
            (State::StartField | State::Unquoted, _) => State::Unquoted,
            (State::Quoted, b'"') => State::QuoteInQuoted,
            (State::Quoted, _) => State::Quoted,
            (State::QuoteInQuoted, b'"') => State::Quoted,
            (State::QuoteInQuoted, _) => State::Unquoted,
        };
        if b == b'\n' {
            self.line += 1;
        }
        self.offset += 1;
    }
}

impl<R: Read> Read for QuoteTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        for &b in &buf[..n] {
            self.step(b);
        }
        Ok(n)
    }
}
