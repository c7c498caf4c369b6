//! Route name to handler table, built once on first use and read-only afterwards.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;
use serde_json::{Value, json};

use crate::Visualizer;
use crate::dataset::DatasetPatch;
use crate::errors::ImportError;

use super::params::{self, Request};
use super::{datasets, imports};

pub type Handler = fn(&Visualizer, &Request) -> Result<Value, ImportError>;

static ROUTES: LazyLock<HashMap<&'static str, Handler>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Handler> = HashMap::new();
    m.insert("analyze_file", analyze_file);
    m.insert("import_file", import_file);
    m.insert("get_datasets", get_datasets);
    m.insert("get_dataset_preview", get_dataset_preview);
    m.insert("delete_dataset", delete_dataset);
    m.insert("restore_dataset", restore_dataset);
    m.insert("purge_dataset", purge_dataset);
    m.insert("bulk_action", bulk_action);
    m.insert("update_dataset", update_dataset);
    m
});

/// Registered route names, sorted.
pub fn routes() -> Vec<&'static str> {
    let mut names: Vec<_> = ROUTES.keys().copied().collect();
    names.sort_unstable();
    names
}

pub fn handler(route: &str) -> Option<Handler> {
    ROUTES.get(route).copied()
}

/// Runs `route` and wraps the outcome as `{success: true, data}` or
/// `{success: false, error}`.
pub fn dispatch(v: &Visualizer, route: &str, req: &Request) -> Value {
    let result = match handler(route) {
        Some(h) => h(v, req),
        None => Err(ImportError::NotFound(format!("route {route}"))),
    };
    match result {
        Ok(data) => json!({ "success": true, "data": data }),
        Err(e) => {
            log::debug!("route {route} failed: {e}");
            json!({ "success": false, "error": e.report() })
        }
    }
}

fn to_data<T: Serialize>(value: &T) -> Result<Value, ImportError> {
    Ok(serde_json::to_value(value).map_err(std::io::Error::from)?)
}

fn analyze_file(v: &Visualizer, req: &Request) -> Result<Value, ImportError> {
    to_data(&imports::analyze_file(v, params::upload_id(req)?, req)?)
}

fn import_file(v: &Visualizer, req: &Request) -> Result<Value, ImportError> {
    to_data(&imports::import_file(v, params::upload_id(req)?, req)?)
}

fn get_datasets(v: &Visualizer, req: &Request) -> Result<Value, ImportError> {
    let page = datasets::get_datasets(
        v,
        params::opt_u64(req, "page")?,
        params::opt_u64(req, "per_page")?,
        params::opt_str(req, "search"),
        params::status_filter(req)?,
    )?;
    to_data(&page)
}

fn get_dataset_preview(v: &Visualizer, req: &Request) -> Result<Value, ImportError> {
    let id = params::dataset_id(req, "dataset_id")?;
    to_data(&datasets::get_dataset_preview(v, id, params::opt_u64(req, "limit")?)?)
}

fn delete_dataset(v: &Visualizer, req: &Request) -> Result<Value, ImportError> {
    to_data(&datasets::delete_dataset(v, params::dataset_id(req, "dataset_id")?)?)
}

fn restore_dataset(v: &Visualizer, req: &Request) -> Result<Value, ImportError> {
    to_data(&datasets::restore_dataset(v, params::dataset_id(req, "dataset_id")?)?)
}

fn purge_dataset(v: &Visualizer, req: &Request) -> Result<Value, ImportError> {
    to_data(&datasets::purge_dataset(v, params::dataset_id(req, "dataset_id")?)?)
}

fn bulk_action(v: &Visualizer, req: &Request) -> Result<Value, ImportError> {
    let action = params::opt_str(req, "action_type").ok_or_else(|| ImportError::validation("action_type is required"))?;
    let ids = params::dataset_ids(req, "dataset_ids")?;
    to_data(&datasets::bulk_action(v, action, &ids)?)
}

fn update_dataset(v: &Visualizer, req: &Request) -> Result<Value, ImportError> {
    let id = params::dataset_id(req, "dataset_id")?;
    let patch = DatasetPatch {
        name: req.get("dataset_name").map(|s| s.to_string()),
        description: req.get("dataset_description").map(|s| s.trim().to_string()),
    };
    to_data(&datasets::update_dataset(v, id, patch)?)
}
