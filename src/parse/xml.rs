use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Table, TableBuilder};
use crate::errors::{Location, ParseError};

/// Field name for text placed directly inside a record element.
const TEXT_FIELD: &str = "value";

/// Each child of the root element is one record. Its attributes and its child
/// elements' text become fields; deeper nesting is flattened into the text.
pub(crate) fn read_table(text: &str) -> Result<Table, ParseError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut builder = TableBuilder::default();
    let mut depth = 0usize;
    let mut roots = 0usize;
    let mut record: Option<Vec<(String, String)>> = None;
    let mut field: Option<(String, String)> = None;

    loop {
        let event = match reader.read_event() {
            Ok(ev) => ev,
            Err(e) => {
                return Err(ParseError::malformed(
                    format!("invalid XML: {e}"),
                    Location::at_byte(reader.buffer_position() as u64),
                ));
            }
        };
        match event {
            Event::Start(e) => {
                depth += 1;
                match depth {
                    1 => roots += 1,
                    2 => record = Some(attributes(&e, &reader)?),
                    3 => field = Some((local_name(&e), String::new())),
                    _ => {}
                }
            }
            Event::Empty(e) => match depth + 1 {
                1 => roots += 1,
                2 => builder.push(attributes(&e, &reader)?),
                3 => {
                    if let Some(rec) = record.as_mut() {
                        rec.push((local_name(&e), String::new()));
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                let s = t.unescape().map_err(|e| {
                    ParseError::malformed(format!("invalid XML text: {e}"), Location::at_byte(reader.buffer_position() as u64))
                })?;
                append_text(depth, &mut record, &mut field, &s);
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                append_text(depth, &mut record, &mut field, &String::from_utf8_lossy(&raw));
            }
            Event::End(_) => {
                match depth {
                    3 => {
                        if let (Some(rec), Some(f)) = (record.as_mut(), field.take()) {
                            rec.push(f);
                        }
                    }
                    2 => {
                        if let Some(rec) = record.take() {
                            builder.push(rec);
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        if roots > 1 {
            return Err(ParseError::malformed(
                "more than one root element",
                Location::at_byte(reader.buffer_position() as u64),
            ));
        }
    }
    if depth > 0 {
        return Err(ParseError::malformed("unclosed element at end of document", Location::at_byte(text.len() as u64)));
    }
    Ok(builder.finish())
}

fn append_text(
    depth: usize,
    record: &mut Option<Vec<(String, String)>>,
    field: &mut Option<(String, String)>,
    s: &str,
) {
    match depth {
        2 => {
            if let Some(rec) = record.as_mut() {
                rec.push((TEXT_FIELD.to_string(), s.to_string()));
            }
        }
        d if d >= 3 => {
            if let Some((_, value)) = field.as_mut() {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(s);
            }
        }
        _ => {}
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attributes(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Vec<(String, String)>, ParseError> {
    let at = || Location::at_byte(reader.buffer_position() as u64);
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::malformed(format!("invalid attribute: {err}"), at()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| ParseError::malformed(format!("invalid attribute value: {err}"), at()))?;
        out.push((key, value.into_owned()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_elements_and_attributes_become_fields() {
        let t = read_table(
            r#"<?xml version="1.0"?>
            <rows>
              <row id="1"><name>Ann</name><city>Oslo</city></row>
              <row id="2"><name>Bob &amp; Co</name><zip/></row>
            </rows>"#,
        )
        .unwrap();
        assert_eq!(t.columns, vec!["id", "name", "city", "zip"]);
        assert_eq!(t.rows[0], vec!["1", "Ann", "Oslo", ""]);
        assert_eq!(t.rows[1], vec!["2", "Bob & Co", "", ""]);
    }

    #[test]
    fn empty_records_and_cdata() {
        let t = read_table("<r><item a=\"x\"/><item><v><![CDATA[<b>]]></v></item></r>").unwrap();
        assert_eq!(t.columns, vec!["a", "v"]);
        assert_eq!(t.rows, vec![vec!["x", ""], vec!["", "<b>"]]);
    }

    #[test]
    fn empty_documents_have_no_rows() {
        assert!(read_table("<rows/>").unwrap().rows.is_empty());
        assert!(read_table("<rows></rows>").unwrap().rows.is_empty());
        assert!(read_table("").unwrap().rows.is_empty());
    }

    #[test]
    fn truncated_document_is_structural() {
        assert!(matches!(
            read_table("<rows><row><a>1</a>"),
            Err(ParseError::MalformedStructure { .. })
        ));
    }

    #[test]
    fn mismatched_tags_are_structural() {
        assert!(read_table("<rows><row></rows>").is_err());
    }
}
