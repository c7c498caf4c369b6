use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use super::oplog::{OpLog, StoreOp};
use super::{DatasetStore, PurgeSummary};
use crate::config::StorageSettings;
use crate::dataset::{Dataset, DatasetPatch, ListQuery, NewDataset, NewVisualization, Page, RowRecord, Visualization};
use crate::errors::StoreError;
use crate::logger::AUDIT_TARGET;
use crate::types::{DatasetId, DatasetStatus, JobId, VisualizationId};

/// Failure reason given to imports found unfinished when the log is replayed.
pub const INTERRUPTED: &str = "interrupted";

#[derive(Debug)]
struct DatasetEntry {
    meta: Dataset,
    rows: BTreeMap<u64, RowRecord>,
    owner: Option<JobId>,
}

impl DatasetEntry {
    fn check_lease(&self, owner: JobId) -> Result<(), StoreError> {
        if self.meta.status != DatasetStatus::Importing || self.owner != Some(owner) {
            return Err(StoreError::Conflict(format!(
                "dataset {} ({}) is not leased to job {owner}",
                self.meta.id, self.meta.status
            )));
        }
        Ok(())
    }
}

/// In-memory dataset store with an optional append-only log for durability.
///
/// Every mutation is logged before it is applied. Each dataset sits behind its own
/// mutex, so metadata updates for one id are serialized.
///
/// Lock order: dataset map, dataset entry, visualizations, log. A record and the
/// map insert it describes happen under one map guard, so compaction never
/// snapshots between them.
pub struct Engine {
    datasets: RwLock<BTreeMap<DatasetId, Arc<Mutex<DatasetEntry>>>>,
    visualizations: RwLock<BTreeMap<VisualizationId, Visualization>>,
    next_dataset: AtomicU64,
    next_visualization: AtomicU64,
    oplog: Option<Mutex<OpLog>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.path)
            .field("datasets", &self.datasets.read().len())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Engine {
    pub fn in_memory() -> Self {
        Self {
            datasets: RwLock::new(BTreeMap::new()),
            visualizations: RwLock::new(BTreeMap::new()),
            next_dataset: AtomicU64::new(1),
            next_visualization: AtomicU64::new(1),
            oplog: None,
            path: None,
        }
    }

    /// Opens (or creates) a log-backed store and replays it.
    ///
    /// Datasets still `Importing` in the log lost their job with the previous process
    /// and are marked `Failed` with reason [`INTERRUPTED`].
    ///
    /// # Errors
    /// I/O failures and undecodable records that passed their checksum.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let (oplog, ops) = OpLog::open(path)?;
        let replayed = ops.len();
        let mut engine = Self::in_memory();
        engine.apply_replay(ops);
        engine.oplog = Some(Mutex::new(oplog));
        engine.path = Some(path.to_path_buf());

        let stale: Vec<Arc<Mutex<DatasetEntry>>> = engine.datasets.read().values().cloned().collect();
        for entry in stale {
            let mut e = entry.lock();
            if e.meta.status == DatasetStatus::Importing {
                let mut meta = e.meta.clone();
                meta.status = DatasetStatus::Failed;
                meta.failure_reason = Some(INTERRUPTED.to_string());
                meta.updated_at = Utc::now();
                engine.record(&StoreOp::UpdateDataset(meta.clone()))?;
                log::warn!(target: AUDIT_TARGET, "dataset {} marked failed: import interrupted", meta.id);
                e.meta = meta;
            }
        }
        log::info!(
            "store: opened {} ({replayed} records, {} datasets)",
            path.display(),
            engine.datasets.read().len()
        );
        Ok(engine)
    }

    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StoreError> {
        match &settings.path {
            Some(p) => Self::open(p),
            None => Ok(Self::in_memory()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn apply_replay(&mut self, ops: Vec<StoreOp>) {
        let mut datasets: BTreeMap<DatasetId, DatasetEntry> = BTreeMap::new();
        let mut visualizations = BTreeMap::new();
        let mut next_dataset = 1u64;
        let mut next_visualization = 1u64;
        for op in ops {
            match op {
                StoreOp::CreateDataset(meta) => {
                    next_dataset = next_dataset.max(meta.id.0 + 1);
                    datasets.insert(meta.id, DatasetEntry { meta, rows: BTreeMap::new(), owner: None });
                }
                StoreOp::UpdateDataset(meta) => {
                    if let Some(e) = datasets.get_mut(&meta.id) {
                        e.meta = meta;
                    }
                }
                StoreOp::AppendRows { dataset_id, rows } => {
                    if let Some(e) = datasets.get_mut(&dataset_id) {
                        e.rows.extend(rows.into_iter().map(|r| (r.row_index, r)));
                    }
                }
                StoreOp::ClearRows { dataset_id } => {
                    if let Some(e) = datasets.get_mut(&dataset_id) {
                        e.rows.clear();
                    }
                }
                StoreOp::PurgeDataset { dataset_id } => {
                    datasets.remove(&dataset_id);
                    visualizations.retain(|_, v: &mut Visualization| v.dataset_id != dataset_id);
                }
                StoreOp::CreateVisualization(v) => {
                    next_visualization = next_visualization.max(v.id.0 + 1);
                    visualizations.insert(v.id, v);
                }
                StoreOp::ReserveIds { next_dataset: d, next_visualization: v } => {
                    next_dataset = next_dataset.max(d);
                    next_visualization = next_visualization.max(v);
                }
            }
        }
        *self.datasets.get_mut() = datasets.into_iter().map(|(id, e)| (id, Arc::new(Mutex::new(e)))).collect();
        *self.visualizations.get_mut() = visualizations;
        *self.next_dataset.get_mut() = next_dataset;
        *self.next_visualization.get_mut() = next_visualization;
    }

    fn record(&self, op: &StoreOp) -> Result<(), StoreError> {
        if let Some(log) = &self.oplog {
            log.lock().append(op)?;
        }
        Ok(())
    }

    fn entry(&self, id: DatasetId) -> Result<Arc<Mutex<DatasetEntry>>, StoreError> {
        self.datasets.read().get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    /// Forces buffered log records to stable storage.
    ///
    /// # Errors
    /// I/O failures from the log file.
    pub fn flush(&self) -> Result<(), StoreError> {
        if let Some(log) = &self.oplog {
            log.lock().sync()?;
        }
        Ok(())
    }

    /// Rewrites the log as a snapshot of live state, dropping purged data and
    /// superseded metadata records.
    ///
    /// # Errors
    /// I/O and encoding failures; the previous log stays in place on error.
    pub fn compact(&self) -> Result<(), StoreError> {
        let Some(log) = &self.oplog else {
            return Ok(());
        };
        let map = self.datasets.write();
        let guards: Vec<_> = map.values().map(|e| e.lock()).collect();
        let vis = self.visualizations.read();
        let mut ops = vec![StoreOp::ReserveIds {
            next_dataset: self.next_dataset.load(Ordering::SeqCst),
            next_visualization: self.next_visualization.load(Ordering::SeqCst),
        }];
        for e in &guards {
            ops.push(StoreOp::CreateDataset(e.meta.clone()));
            if !e.rows.is_empty() {
                ops.push(StoreOp::AppendRows { dataset_id: e.meta.id, rows: e.rows.values().cloned().collect() });
            }
        }
        ops.extend(vis.values().cloned().map(StoreOp::CreateVisualization));
        log.lock().rewrite(&ops)?;
        log::info!("store: compacted log to {} records", ops.len());
        Ok(())
    }

    /// Applies `change` to a copy of the metadata, logs it, then commits it.
    fn update_meta<F>(&self, entry: &mut DatasetEntry, change: F) -> Result<Dataset, StoreError>
    where
        F: FnOnce(&mut Dataset),
    {
        let mut meta = entry.meta.clone();
        change(&mut meta);
        meta.updated_at = Utc::now();
        self.record(&StoreOp::UpdateDataset(meta.clone()))?;
        entry.meta = meta.clone();
        Ok(meta)
    }
}

fn apply_draft(meta: &mut Dataset, draft: NewDataset) {
    meta.name = draft.name;
    meta.description = draft.description;
    meta.file_name = draft.file_name;
    meta.file_type = draft.file_type;
    meta.file_size = draft.file_size;
    meta.delimiter = draft.delimiter;
    meta.encoding = draft.encoding;
    meta.has_header = draft.has_header;
}

impl DatasetStore for Engine {
    fn create_dataset(&self, draft: NewDataset, owner: JobId) -> Result<Dataset, StoreError> {
        let id = DatasetId(self.next_dataset.fetch_add(1, Ordering::SeqCst));
        let meta = Dataset::from_draft(id, draft, Utc::now());
        let mut map = self.datasets.write();
        self.record(&StoreOp::CreateDataset(meta.clone()))?;
        let entry = DatasetEntry { meta: meta.clone(), rows: BTreeMap::new(), owner: Some(owner) };
        map.insert(id, Arc::new(Mutex::new(entry)));
        drop(map);
        log::info!(target: AUDIT_TARGET, "dataset {id} created name={:?} file={:?} job={owner}", meta.name, meta.file_name);
        Ok(meta)
    }

    fn claim_for_retry(&self, id: DatasetId, draft: NewDataset, owner: JobId) -> Result<Dataset, StoreError> {
        let entry = self.entry(id)?;
        let mut e = entry.lock();
        if e.meta.status != DatasetStatus::Failed || e.owner.is_some() {
            return Err(StoreError::Conflict(format!(
                "dataset {id} is {}; only failed datasets can be retried",
                e.meta.status
            )));
        }
        self.record(&StoreOp::ClearRows { dataset_id: id })?;
        e.rows.clear();
        let meta = self.update_meta(&mut e, |m| {
            apply_draft(m, draft);
            m.columns.clear();
            m.total_rows = 0;
            m.total_columns = 0;
            m.status = DatasetStatus::Importing;
            m.failure_reason = None;
        })?;
        e.owner = Some(owner);
        log::info!(target: AUDIT_TARGET, "dataset {id} re-leased for retry job={owner}");
        Ok(meta)
    }

    fn append_rows(&self, id: DatasetId, owner: JobId, rows: Vec<RowRecord>) -> Result<u64, StoreError> {
        let entry = self.entry(id)?;
        let mut e = entry.lock();
        e.check_lease(owner)?;
        let mut expected = e.rows.len() as u64;
        for r in &rows {
            if r.row_index != expected {
                return Err(StoreError::Conflict(format!(
                    "dataset {id}: row index {} out of sequence, expected {expected}",
                    r.row_index
                )));
            }
            expected += 1;
        }
        if rows.is_empty() {
            return Ok(expected);
        }
        let op = StoreOp::AppendRows { dataset_id: id, rows };
        self.record(&op)?;
        if let StoreOp::AppendRows { rows, .. } = op {
            e.rows.extend(rows.into_iter().map(|r| (r.row_index, r)));
        }
        Ok(e.rows.len() as u64)
    }

    fn complete_import(
        &self,
        id: DatasetId,
        owner: JobId,
        columns: Vec<String>,
        total_rows: u64,
    ) -> Result<Dataset, StoreError> {
        let entry = self.entry(id)?;
        let mut e = entry.lock();
        e.check_lease(owner)?;
        let stored = e.rows.len() as u64;
        if stored != total_rows {
            return Err(StoreError::Conflict(format!(
                "dataset {id}: {stored} rows stored but completion reports {total_rows}"
            )));
        }
        let meta = self.update_meta(&mut e, |m| {
            m.total_columns = columns.len() as u64;
            m.columns = columns;
            m.total_rows = total_rows;
            m.status = DatasetStatus::Active;
            m.failure_reason = None;
        })?;
        e.owner = None;
        drop(e);
        self.flush()?;
        log::info!(target: AUDIT_TARGET, "dataset {id} active rows={total_rows} columns={} job={owner}", meta.total_columns);
        Ok(meta)
    }

    fn fail_import(&self, id: DatasetId, owner: JobId, reason: &str) -> Result<Dataset, StoreError> {
        let entry = self.entry(id)?;
        let mut e = entry.lock();
        e.check_lease(owner)?;
        let rows = e.rows.len();
        let meta = self.update_meta(&mut e, |m| {
            m.status = DatasetStatus::Failed;
            m.failure_reason = Some(reason.to_string());
        })?;
        e.owner = None;
        log::warn!(target: AUDIT_TARGET, "dataset {id} failed after {rows} rows: {reason} job={owner}");
        Ok(meta)
    }

    fn get_dataset(&self, id: DatasetId) -> Result<Dataset, StoreError> {
        Ok(self.entry(id)?.lock().meta.clone())
    }

    fn update_dataset(&self, id: DatasetId, patch: DatasetPatch) -> Result<Dataset, StoreError> {
        let name = match patch.name {
            Some(n) if n.trim().is_empty() => {
                return Err(StoreError::Invalid("dataset name must not be empty".into()));
            }
            Some(n) => Some(n.trim().to_string()),
            None => None,
        };
        let entry = self.entry(id)?;
        let mut e = entry.lock();
        let meta = self.update_meta(&mut e, |m| {
            if let Some(n) = name {
                m.name = n;
            }
            if let Some(d) = patch.description {
                let d = d.trim().to_string();
                m.description = (!d.is_empty()).then_some(d);
            }
        })?;
        log::info!(target: AUDIT_TARGET, "dataset {id} updated name={:?}", meta.name);
        Ok(meta)
    }

    fn list_datasets(&self, query: &ListQuery) -> Result<Page<Dataset>, StoreError> {
        if query.page == 0 || query.per_page == 0 {
            return Err(StoreError::Invalid("page and per_page must be positive".into()));
        }
        let needle = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase);
        let entries: Vec<Arc<Mutex<DatasetEntry>>> = self.datasets.read().values().cloned().collect();
        let mut matched: Vec<Dataset> = entries
            .iter()
            .map(|e| e.lock().meta.clone())
            .filter(|d| query.status.is_none_or(|s| d.status == s))
            .filter(|d| needle.as_deref().is_none_or(|n| d.name.to_lowercase().contains(n)))
            .collect();
        matched.sort_by(|a, b| b.imported_at.cmp(&a.imported_at).then(b.id.cmp(&a.id)));
        let total = matched.len() as u64;
        let skip = (query.page - 1).saturating_mul(query.per_page);
        let items = matched
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(query.per_page).unwrap_or(usize::MAX))
            .collect();
        Ok(Page { items, total, page: query.page, per_page: query.per_page, total_pages: total.div_ceil(query.per_page) })
    }

    fn delete_dataset(&self, id: DatasetId) -> Result<Dataset, StoreError> {
        let entry = self.entry(id)?;
        let mut e = entry.lock();
        match e.meta.status {
            DatasetStatus::Deleted => return Ok(e.meta.clone()),
            DatasetStatus::Importing => {
                return Err(StoreError::Conflict(format!("dataset {id} has an import in progress")));
            }
            DatasetStatus::Active | DatasetStatus::Failed => {}
        }
        let meta = self.update_meta(&mut e, |m| m.status = DatasetStatus::Deleted)?;
        log::info!(target: AUDIT_TARGET, "dataset {id} deleted (soft)");
        Ok(meta)
    }

    fn restore_dataset(&self, id: DatasetId) -> Result<Dataset, StoreError> {
        let entry = self.entry(id)?;
        let mut e = entry.lock();
        if e.meta.status != DatasetStatus::Deleted {
            return Err(StoreError::Conflict(format!("dataset {id} is {}, not deleted", e.meta.status)));
        }
        let meta = self.update_meta(&mut e, |m| {
            m.status = if m.failure_reason.is_some() { DatasetStatus::Failed } else { DatasetStatus::Active };
        })?;
        log::info!(target: AUDIT_TARGET, "dataset {id} restored as {}", meta.status);
        Ok(meta)
    }

    fn hard_delete_dataset(&self, id: DatasetId) -> Result<PurgeSummary, StoreError> {
        let mut map = self.datasets.write();
        let entry = map.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        let e = entry.lock();
        if e.owner.is_some() {
            return Err(StoreError::Conflict(format!("dataset {id} has an import in progress")));
        }
        self.record(&StoreOp::PurgeDataset { dataset_id: id })?;
        map.remove(&id);
        let visualizations_removed = {
            let mut vis = self.visualizations.write();
            let before = vis.len();
            vis.retain(|_, v| v.dataset_id != id);
            (before - vis.len()) as u64
        };
        let summary = PurgeSummary { dataset_id: id, rows_removed: e.rows.len() as u64, visualizations_removed };
        drop(e);
        drop(map);
        log::info!(
            target: AUDIT_TARGET,
            "dataset {id} purged rows={} visualizations={visualizations_removed}",
            summary.rows_removed
        );
        Ok(summary)
    }

    fn rows(&self, id: DatasetId, offset: u64, limit: u64) -> Result<Vec<RowRecord>, StoreError> {
        let entry = self.entry(id)?;
        let e = entry.lock();
        Ok(e.rows
            .range(offset..)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn row_count(&self, id: DatasetId) -> Result<u64, StoreError> {
        Ok(self.entry(id)?.lock().rows.len() as u64)
    }

    fn create_visualization(&self, new: NewVisualization) -> Result<Visualization, StoreError> {
        if new.name.trim().is_empty() {
            return Err(StoreError::Invalid("visualization name must not be empty".into()));
        }
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&new.config_json) {
            return Err(StoreError::Invalid(format!("visualization config is not valid JSON: {e}")));
        }
        let map = self.datasets.read();
        if !map.contains_key(&new.dataset_id) {
            return Err(StoreError::NotFound(new.dataset_id));
        }
        let mut all = self.visualizations.write();
        let vis = Visualization {
            id: VisualizationId(self.next_visualization.fetch_add(1, Ordering::SeqCst)),
            dataset_id: new.dataset_id,
            name: new.name.trim().to_string(),
            kind: new.kind,
            config_json: new.config_json,
            shortcode: new.shortcode,
            display_order: new.display_order,
            created_at: Utc::now(),
        };
        self.record(&StoreOp::CreateVisualization(vis.clone()))?;
        all.insert(vis.id, vis.clone());
        Ok(vis)
    }

    fn visualizations(&self, dataset_id: DatasetId) -> Result<Vec<Visualization>, StoreError> {
        self.entry(dataset_id)?;
        let mut out: Vec<Visualization> =
            self.visualizations.read().values().filter(|v| v.dataset_id == dataset_id).cloned().collect();
        out.sort_by_key(|v| (v.display_order, v.id));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Delimiter, FileKind, TextEncoding};

    fn draft(name: &str) -> NewDataset {
        NewDataset {
            name: name.into(),
            description: None,
            file_name: format!("{name}.csv"),
            file_type: FileKind::Csv,
            file_size: 10,
            delimiter: Delimiter::Comma,
            encoding: TextEncoding::Utf8,
            has_header: true,
        }
    }

    fn rows(start: u64, n: u64) -> Vec<RowRecord> {
        let cols = vec!["a".to_string()];
        (start..start + n).map(|i| RowRecord::new(i, &cols, vec![i.to_string()])).collect()
    }

    fn imported(store: &Engine, name: &str, n: u64) -> Dataset {
        let job = JobId::new();
        let d = store.create_dataset(draft(name), job).unwrap();
        store.append_rows(d.id, job, rows(0, n)).unwrap();
        store.complete_import(d.id, job, vec!["a".into()], n).unwrap()
    }

    #[test]
    fn import_lifecycle() {
        let store = Engine::in_memory();
        let job = JobId::new();
        let d = store.create_dataset(draft("sales"), job).unwrap();
        assert_eq!(d.status, DatasetStatus::Importing);
        assert_eq!(store.append_rows(d.id, job, rows(0, 3)).unwrap(), 3);
        assert_eq!(store.append_rows(d.id, job, rows(3, 2)).unwrap(), 5);
        let done = store.complete_import(d.id, job, vec!["a".into()], 5).unwrap();
        assert_eq!(done.status, DatasetStatus::Active);
        assert_eq!((done.total_rows, done.total_columns), (5, 1));
        assert_eq!(store.rows(d.id, 3, 10).unwrap().len(), 2);
        assert_eq!(store.row_count(d.id).unwrap(), 5);
    }

    #[test]
    fn only_the_lease_holder_may_write() {
        let store = Engine::in_memory();
        let job = JobId::new();
        let d = store.create_dataset(draft("x"), job).unwrap();
        let intruder = JobId::new();
        assert!(matches!(store.append_rows(d.id, intruder, rows(0, 1)), Err(StoreError::Conflict(_))));
        assert!(matches!(store.complete_import(d.id, intruder, vec![], 0), Err(StoreError::Conflict(_))));
        assert!(matches!(store.fail_import(d.id, intruder, "x"), Err(StoreError::Conflict(_))));
        store.complete_import(d.id, job, vec![], 0).unwrap();
        assert!(store.append_rows(d.id, job, rows(0, 1)).is_err());
    }

    #[test]
    fn out_of_sequence_rows_rejected() {
        let store = Engine::in_memory();
        let job = JobId::new();
        let d = store.create_dataset(draft("x"), job).unwrap();
        assert!(store.append_rows(d.id, job, rows(1, 1)).is_err());
        assert!(store.complete_import(d.id, job, vec![], 4).is_err());
    }

    #[test]
    fn failed_import_keeps_rows_and_can_be_retried() {
        let store = Engine::in_memory();
        let job = JobId::new();
        let d = store.create_dataset(draft("x"), job).unwrap();
        store.append_rows(d.id, job, rows(0, 2)).unwrap();
        let failed = store.fail_import(d.id, job, "bad quote").unwrap();
        assert_eq!(failed.status, DatasetStatus::Failed);
        assert_eq!(store.row_count(d.id).unwrap(), 2);

        let retry = JobId::new();
        let again = store.claim_for_retry(d.id, draft("x2"), retry).unwrap();
        assert_eq!(again.id, d.id);
        assert_eq!(again.name, "x2");
        assert_eq!(again.status, DatasetStatus::Importing);
        assert_eq!(store.row_count(d.id).unwrap(), 0);
        assert!(store.claim_for_retry(d.id, draft("x3"), JobId::new()).is_err());
    }

    #[test]
    fn listing_filters_searches_and_paginates() {
        let store = Engine::in_memory();
        for name in ["Sales 2023", "sales 2024", "Inventory"] {
            imported(&store, name, 1);
        }
        let hidden = imported(&store, "Old sales", 1);
        store.delete_dataset(hidden.id).unwrap();

        let page = store.list_datasets(&ListQuery { search: Some("SALES".into()), ..Default::default() }).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "sales 2024");

        let q = ListQuery { page: 2, per_page: 2, ..Default::default() };
        let p2 = store.list_datasets(&q).unwrap();
        assert_eq!(p2.items.len(), 1);
        assert_eq!(p2.total_pages, 2);
        let beyond = store.list_datasets(&ListQuery { page: 9, ..q.clone() }).unwrap();
        assert!(beyond.items.is_empty());
        assert!(matches!(store.list_datasets(&ListQuery { page: 0, ..q }), Err(StoreError::Invalid(_))));

        let all = store.list_datasets(&ListQuery { status: None, ..Default::default() }).unwrap();
        assert_eq!(all.total, 4);
    }

    #[test]
    fn soft_delete_and_restore() {
        let store = Engine::in_memory();
        let d = imported(&store, "x", 2);
        assert_eq!(store.delete_dataset(d.id).unwrap().status, DatasetStatus::Deleted);
        assert_eq!(store.row_count(d.id).unwrap(), 2);
        assert_eq!(store.restore_dataset(d.id).unwrap().status, DatasetStatus::Active);
        assert!(store.restore_dataset(d.id).is_err());
    }

    #[test]
    fn hard_delete_cascades() {
        let store = Engine::in_memory();
        let d = imported(&store, "x", 3);
        let keep = imported(&store, "y", 1);
        for (ds, order) in [(d.id, 2), (d.id, 1), (keep.id, 1)] {
            store
                .create_visualization(NewVisualization {
                    dataset_id: ds,
                    name: "chart".into(),
                    kind: "bar".into(),
                    config_json: "{}".into(),
                    shortcode: None,
                    display_order: order,
                })
                .unwrap();
        }
        assert_eq!(store.visualizations(d.id).unwrap()[0].display_order, 1);
        let summary = store.hard_delete_dataset(d.id).unwrap();
        assert_eq!((summary.rows_removed, summary.visualizations_removed), (3, 2));
        assert!(matches!(store.get_dataset(d.id), Err(StoreError::NotFound(_))));
        assert_eq!(store.visualizations(keep.id).unwrap().len(), 1);
    }

    #[test]
    fn visualization_requires_dataset_and_json_config() {
        let store = Engine::in_memory();
        let mut v = NewVisualization {
            dataset_id: DatasetId(42),
            name: "t".into(),
            kind: "table".into(),
            config_json: "{}".into(),
            shortcode: None,
            display_order: 0,
        };
        assert!(matches!(store.create_visualization(v.clone()), Err(StoreError::NotFound(_))));
        v.dataset_id = imported(&store, "x", 0).id;
        v.config_json = "{not json".into();
        assert!(matches!(store.create_visualization(v), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn update_validates_name() {
        let store = Engine::in_memory();
        let d = imported(&store, "x", 0);
        let patch = DatasetPatch { name: Some("  ".into()), description: None };
        assert!(matches!(store.update_dataset(d.id, patch), Err(StoreError::Invalid(_))));
        let patch = DatasetPatch { name: Some(" New ".into()), description: Some("about".into()) };
        let u = store.update_dataset(d.id, patch).unwrap();
        assert_eq!(u.name, "New");
        assert_eq!(u.description.as_deref(), Some("about"));
    }

    #[test]
    fn reopen_replays_and_fails_interrupted_imports() {
        let (_dir, path) = crate::test_support::temp_log("data/store.log");
        let (done, pending) = {
            let store = Engine::open(&path).unwrap();
            let done = imported(&store, "done", 4);
            let job = JobId::new();
            let pending = store.create_dataset(draft("pending"), job).unwrap();
            store.append_rows(pending.id, job, rows(0, 2)).unwrap();
            (done, pending)
        };
        let store = Engine::open(&path).unwrap();
        let d = store.get_dataset(done.id).unwrap();
        assert_eq!(d.status, DatasetStatus::Active);
        assert_eq!(store.rows(done.id, 0, 10).unwrap(), rows(0, 4));
        let p = store.get_dataset(pending.id).unwrap();
        assert_eq!(p.status, DatasetStatus::Failed);
        assert_eq!(p.failure_reason.as_deref(), Some(INTERRUPTED));
        assert_eq!(store.row_count(pending.id).unwrap(), 2);
    }

    #[test]
    fn purged_ids_are_not_reused_after_compaction() {
        let (_dir, path) = crate::test_support::temp_log("store.log");
        {
            let store = Engine::open(&path).unwrap();
            imported(&store, "a", 1);
            let b = imported(&store, "b", 1);
            store.hard_delete_dataset(b.id).unwrap();
            store.compact().unwrap();
        }
        let store = Engine::open(&path).unwrap();
        let c = imported(&store, "c", 1);
        assert_eq!(c.id, DatasetId(3));
        assert_eq!(store.list_datasets(&ListQuery::default()).unwrap().total, 2);
    }
}
