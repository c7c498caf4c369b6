//! Character encoding guessing and decoding using simdutf8 and `encoding_rs`.

use crate::types::TextEncoding;
use std::borrow::Cow;

/// Check if the data starts with a UTF-8 BOM (EF BB BF).
pub fn has_utf8_bom(data: &[u8]) -> bool {
    data.starts_with(&[0xEF, 0xBB, 0xBF])
}

/// Skip the UTF-8 BOM if present and return the remaining data.
pub fn skip_bom(data: &[u8]) -> &[u8] {
    if has_utf8_bom(data) { &data[3..] } else { data }
}

/// Strict UTF-8 check of a leading sample.
///
/// When `truncated` is set the sample was cut from a longer file, so a multi-byte
/// sequence left incomplete at the very end is still accepted.
pub fn is_utf8_sample(data: &[u8], truncated: bool) -> bool {
    match simdutf8::compat::from_utf8(data) {
        Ok(_) => true,
        Err(e) => truncated && e.error_len().is_none(),
    }
}

/// Strict UTF-8 first; anything else falls back to ISO-8859-1, which decodes every byte.
pub fn guess_encoding(sample: &[u8], truncated: bool) -> TextEncoding {
    if is_utf8_sample(skip_bom(sample), truncated) {
        TextEncoding::Utf8
    } else {
        TextEncoding::Iso88591
    }
}

/// Decode bytes under `encoding`. The flag reports whether replacement characters
/// had to be substituted for undecodable input.
pub fn decode(encoding: TextEncoding, bytes: &[u8]) -> (Cow<'_, str>, bool) {
    match encoding {
        TextEncoding::Utf8 => encoding_rs::UTF_8.decode_without_bom_handling(bytes),
        TextEncoding::Iso88591 => (encoding_rs::mem::decode_latin1(bytes), false),
        TextEncoding::Windows1252 => encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes),
    }
}
