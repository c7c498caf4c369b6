use serde_json::{Map, Value};

use super::{Table, TableBuilder};
use crate::errors::{Location, ParseError};

/// Accepts an array of objects or an object of equal-length arrays (columnar).
pub(crate) fn read_table(text: &str) -> Result<Table, ParseError> {
    if text.trim().is_empty() {
        return Ok(Table::default());
    }
    let value: Value = serde_json::from_str(text).map_err(|e| {
        ParseError::malformed(format!("invalid JSON: {e}"), Location::at_line(e.line() as u64, e.column() as u64))
    })?;
    match value {
        Value::Array(items) => from_records(items),
        Value::Object(map) => from_columns(map),
        other => Err(ParseError::malformed(
            format!("top-level JSON {} is neither an array of objects nor an object of arrays", type_name(&other)),
            Location::default(),
        )),
    }
}

fn from_records(items: Vec<Value>) -> Result<Table, ParseError> {
    let mut builder = TableBuilder::default();
    for (i, item) in items.into_iter().enumerate() {
        let obj = match item {
            Value::Object(obj) => obj,
            other => {
                return Err(ParseError::malformed(
                    format!("array element {i} is {}, expected an object", type_name(&other)),
                    Location::default(),
                ));
            }
        };
        builder.push(obj.into_iter().map(|(k, v)| (k, cell_text(v))));
    }
    Ok(builder.finish())
}

fn from_columns(map: Map<String, Value>) -> Result<Table, ParseError> {
    let mut expected: Option<usize> = None;
    let mut columns = Vec::with_capacity(map.len());
    let mut cells = Vec::with_capacity(map.len());
    for (key, value) in map {
        let values = match value {
            Value::Array(values) => values,
            other => {
                return Err(ParseError::malformed(
                    format!("column {key:?} is {}, expected an array", type_name(&other)),
                    Location::default(),
                ));
            }
        };
        match expected {
            None => expected = Some(values.len()),
            Some(n) if n != values.len() => {
                return Err(ParseError::malformed(
                    format!("column {key:?} has {} values, expected {n}", values.len()),
                    Location::default(),
                ));
            }
            Some(_) => {}
        }
        columns.push(key);
        cells.push(values.into_iter().map(cell_text).collect::<Vec<_>>().into_iter());
    }
    let height = expected.unwrap_or(0);
    let mut builder = TableBuilder::with_columns(columns.clone());
    for _ in 0..height {
        let row = columns.iter().cloned().zip(cells.iter_mut().map(|c| c.next().unwrap_or_default()));
        builder.push(row);
    }
    Ok(builder.finish())
}

/// Scalars as their text, null as empty, nested values as compact JSON.
fn cell_text(v: Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
