use std::io::Write;

use serde_json::Value;

use crate::Visualizer;
use crate::api::{self, params};
use crate::dataset::DatasetPatch;
use crate::errors::ImportError;
use crate::import::UploadSource;
use crate::types::DatasetId;

use super::command::Command;
use super::util::{file_name_of, request};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    /// Pretty-printed JSON.
    Json,
    /// One JSON document per line.
    Plain,
}

pub fn run(v: &Visualizer, cmd: Command) -> Result<(), Box<dyn std::error::Error>> {
    run_with_format(v, cmd, OutputMode::Json, &mut std::io::stdout().lock())
}

pub fn run_with_format(
    v: &Visualizer,
    cmd: Command,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let value = execute(v, cmd)?;
    let text = match mode {
        OutputMode::Json => serde_json::to_string_pretty(&value)?,
        OutputMode::Plain => serde_json::to_string(&value)?,
    };
    writeln!(out, "{text}")?;
    Ok(())
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ImportError> {
    Ok(serde_json::to_value(value).map_err(std::io::Error::from)?)
}

fn flag(b: Option<bool>) -> Option<String> {
    b.map(|b| b.to_string())
}

/// Runs one command through the same entry points the host framework uses.
pub fn execute(v: &Visualizer, cmd: Command) -> Result<Value, ImportError> {
    match cmd {
        Command::Analyze { file, delimiter, encoding, has_header } => {
            let upload = v.register_upload(&file_name_of(&file), None, UploadSource::Path(file))?;
            let req = request(&[("delimiter", delimiter), ("encoding", encoding), ("has_header", flag(has_header))]);
            let result = api::analyze_file(v, upload.id, &req);
            v.release_upload(upload.id);
            to_value(&result?)
        }
        Command::Import { file, name, description, delimiter, encoding, has_header, retry } => {
            let upload = v.register_upload(&file_name_of(&file), None, UploadSource::Path(file))?;
            let req = request(&[
                ("dataset_name", Some(name)),
                ("dataset_description", description),
                ("delimiter", delimiter),
                ("encoding", encoding),
                ("has_header", flag(has_header)),
                ("dataset_id", retry.map(|id| id.to_string())),
            ]);
            let result = api::import_file(v, upload.id, &req);
            v.release_upload(upload.id);
            to_value(&result?)
        }
        Command::List { page, per_page, search, status } => {
            let req = request(&[("status", status)]);
            let page = api::get_datasets(v, page, per_page, search.as_deref(), params::status_filter(&req)?)?;
            to_value(&page)
        }
        Command::Preview { dataset_id, limit } => to_value(&api::get_dataset_preview(v, DatasetId(dataset_id), limit)?),
        Command::Delete { dataset_id } => to_value(&api::delete_dataset(v, DatasetId(dataset_id))?),
        Command::Restore { dataset_id } => to_value(&api::restore_dataset(v, DatasetId(dataset_id))?),
        Command::Purge { dataset_id } => to_value(&api::purge_dataset(v, DatasetId(dataset_id))?),
        Command::Rename { dataset_id, name, description } => {
            let patch = DatasetPatch { name, description };
            to_value(&api::update_dataset(v, DatasetId(dataset_id), patch)?)
        }
    }
}
