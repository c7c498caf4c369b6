use crockdata::Visualizer;
use crockdata::config::{ImportConfig, ParseOverrides, Settings};
use crockdata::dataset::ListQuery;
use crockdata::errors::ErrorKind;
use crockdata::import::{CancelToken, CommitOptions, Progress, UploadSource};
use crockdata::schema::RowCountBound;
use crockdata::store::Engine;
use crockdata::types::{DatasetStatus, FileKind, TextEncoding, UploadId};
use crockdata::warnings::WarningKind;
use std::sync::Arc;

fn upload(v: &Visualizer, name: &str, data: &[u8]) -> UploadId {
    v.register_upload(name, None, UploadSource::Bytes(data.to_vec())).unwrap().id
}

fn all_statuses() -> ListQuery {
    ListQuery { status: None, per_page: 200, ..ListQuery::default() }
}

#[test]
fn csv_preview_scenario() {
    let v = Visualizer::in_memory();
    let id = upload(&v, "people.csv", b"id,name\n1,Alice\n2,Bob\n");
    let a = v.analyze(id, &ParseOverrides::default()).unwrap();
    assert_eq!(a.classification.kind, FileKind::Csv);
    assert_eq!(a.preview.columns, vec!["id", "name"]);
    assert_eq!(a.preview.rows, vec![vec!["1", "Alice"], vec!["2", "Bob"]]);
    assert_eq!(a.preview.row_count_bound, RowCountBound::Exact(2));
    assert!(a.preview.warnings.is_empty());
}

#[test]
fn header_width_fixes_column_count() {
    let v = Visualizer::in_memory();
    let id = upload(&v, "w.csv", b"a,b,c\n1,2,3\n4,5,6\n7,8,9\n");
    let a = v.analyze(id, &ParseOverrides::default()).unwrap();
    assert_eq!(a.preview.columns.len(), 3);
    assert_eq!(a.preview.row_count_bound.rows(), 3);
    let out = v.commit(id, &ImportConfig::new("w"), CommitOptions::default()).unwrap();
    assert_eq!(out.rows_imported, 3);
    let d = v.store().get_dataset(out.dataset_id).unwrap();
    assert_eq!(d.total_columns, 3);
}

#[test]
fn unterminated_quote_never_activates_a_dataset() {
    let v = Visualizer::in_memory();
    let id = upload(&v, "bad.csv", b"id,name\n1,\"Alice\n2,Bob\n");
    let err = v.commit(id, &ImportConfig::new("bad"), CommitOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    let report = err.report();
    assert_eq!(report.location.and_then(|l| l.byte_offset), Some(10));

    let all = v.store().list_datasets(&all_statuses()).unwrap();
    assert!(all.items.iter().all(|d| d.status != DatasetStatus::Active));
    assert!(all.items.iter().all(|d| d.status == DatasetStatus::Failed));
}

#[test]
fn bracketed_header_imports_as_csv() {
    let v = Visualizer::in_memory();
    let id = upload(&v, "t.csv", b"[Date],Value\n2024-01-01,5\n");
    let out = v.commit(id, &ImportConfig::new("t"), CommitOptions::default()).unwrap();
    assert_eq!(out.rows_imported, 1);
    let d = v.store().get_dataset(out.dataset_id).unwrap();
    assert_eq!(d.file_type, FileKind::Csv);
    assert_eq!(d.columns, vec!["[Date]", "Value"]);
    let rows = v.store().rows(out.dataset_id, 0, 1).unwrap();
    assert_eq!(rows[0].get("[Date]"), Some("2024-01-01"));
}

#[test]
fn json_key_union_scenario() {
    let v = Visualizer::in_memory();
    let id = upload(&v, "u.json", br#"[{"a":1},{"a":2,"b":3}]"#);
    let a = v.analyze(id, &ParseOverrides::default()).unwrap();
    assert_eq!(a.preview.columns, vec!["a", "b"]);
    assert_eq!(a.preview.rows, vec![vec!["1", ""], vec!["2", "3"]]);

    let out = v.commit(id, &ImportConfig::new("u"), CommitOptions::default()).unwrap();
    let rows = v.store().rows(out.dataset_id, 0, 10).unwrap();
    assert_eq!(rows[0].get("a"), Some("1"));
    assert_eq!(rows[0].get("b"), Some(""));
    assert_eq!(rows[1].get("b"), Some("3"));
}

#[test]
fn analyze_is_idempotent() {
    let v = Visualizer::in_memory();
    let id = upload(&v, "s.csv", b"x;y\n1;2\n3;4\n");
    let first = v.analyze(id, &ParseOverrides::default()).unwrap();
    let second = v.analyze(id, &ParseOverrides::default()).unwrap();
    assert_eq!(first.classification, second.classification);
    assert_eq!(first.preview, second.preview);
    assert_eq!(first.options, second.options);
    let stored = v.store().list_datasets(&all_statuses()).unwrap();
    assert_eq!(stored.total, 0);
}

#[test]
fn empty_files_preview_zero_rows() {
    let v = Visualizer::in_memory();
    for (name, data) in [("e.csv", &b""[..]), ("e.json", b"[]"), ("e.xml", b"")] {
        let id = upload(&v, name, data);
        let a = v.analyze(id, &ParseOverrides::default()).unwrap();
        assert!(a.preview.rows.is_empty(), "{name}");
        assert_eq!(a.preview.row_count_bound, RowCountBound::Exact(0), "{name}");
    }
}

#[test]
fn oversized_file_rejected_before_parsing() {
    let mut settings = Settings::default();
    settings.import.max_file_size = 8;
    let v = Visualizer::new(settings, Arc::new(Engine::in_memory()));
    // would be a structural error if it were ever parsed
    let id = upload(&v, "big.csv", b"\"never closed, never closed");
    assert_eq!(v.analyze(id, &ParseOverrides::default()).unwrap_err().kind(), ErrorKind::Validation);
    let err = v.commit(id, &ImportConfig::new("big"), CommitOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(v.store().list_datasets(&all_statuses()).unwrap().total, 0);
}

#[test]
fn disallowed_type_is_validation() {
    let v = Visualizer::in_memory();
    let id = upload(&v, "notes.txt", b"a,b\n1,2\n");
    assert_eq!(v.analyze(id, &ParseOverrides::default()).unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn xml_records_become_rows() {
    let v = Visualizer::in_memory();
    let doc = br#"<rows><row id="1"><name>Ann</name></row><row id="2"><city>Oslo</city></row></rows>"#;
    let id = upload(&v, "r.xml", doc);
    let out = v.commit(id, &ImportConfig::new("xml"), CommitOptions::default()).unwrap();
    assert_eq!(out.columns, vec!["id", "name", "city"]);
    let rows = v.store().rows(out.dataset_id, 0, 10).unwrap();
    assert_eq!(rows[1].get("id"), Some("2"));
    assert_eq!(rows[1].get("name"), Some(""));
    assert_eq!(rows[1].get("city"), Some("Oslo"));
}

#[test]
fn latin1_decodes_and_bad_utf8_warns() {
    let v = Visualizer::in_memory();
    let bytes = b"name\ncaf\xe9\n";

    let id = upload(&v, "l.csv", bytes);
    let mut cfg = ImportConfig::new("latin");
    cfg.encoding = TextEncoding::Iso88591;
    let out = v.commit(id, &cfg, CommitOptions::default()).unwrap();
    assert_eq!(v.store().rows(out.dataset_id, 0, 1).unwrap()[0].get("name"), Some("café"));
    assert!(out.warnings.is_empty());

    let id = upload(&v, "u.csv", bytes);
    let out = v.commit(id, &ImportConfig::new("utf8"), CommitOptions::default()).unwrap();
    assert!(out.warnings.has(WarningKind::Encoding));
    let value = v.store().rows(out.dataset_id, 0, 1).unwrap()[0].get("name").map(str::to_string);
    assert_eq!(value.as_deref(), Some("caf\u{FFFD}"));
}

#[test]
fn wide_rows_keep_extra_values() {
    let v = Visualizer::in_memory();
    let id = upload(&v, "x.csv", b"a,b\n1,2\n3,4,5\n");
    let out = v.commit(id, &ImportConfig::new("x"), CommitOptions::default()).unwrap();
    assert_eq!(out.columns, vec!["a", "b", "column_3"]);
    assert!(out.warnings.has(WarningKind::ExtraFields));
    let rows = v.store().rows(out.dataset_id, 0, 2).unwrap();
    assert_eq!(rows[1].get("column_3"), Some("5"));
}

#[test]
fn concurrent_imports_get_distinct_datasets() {
    let v = Arc::new(Visualizer::in_memory());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let v = Arc::clone(&v);
            std::thread::spawn(move || {
                let data: String = std::iter::once("n\n".to_string()).chain((0..250).map(|r| format!("{r}\n"))).collect();
                let id = upload(&v, &format!("t{i}.csv"), data.as_bytes());
                v.commit(id, &ImportConfig::new(format!("t{i}")), CommitOptions::default()).unwrap()
            })
        })
        .collect();
    let mut ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).map(|o| (o.dataset_id, o.rows_imported)).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
    assert!(ids.iter().all(|(_, rows)| *rows == 250));
}

#[test]
fn cancel_and_progress_handles() {
    let mut settings = Settings::default();
    settings.import.batch_size = 10;
    let v = Visualizer::new(settings, Arc::new(Engine::in_memory()));
    let data: String = std::iter::once("n\n".to_string()).chain((0..100).map(|r| format!("{r}\n"))).collect();

    let progress = Arc::new(Progress::default());
    let id = upload(&v, "p.csv", data.as_bytes());
    let opts = CommitOptions { progress: Some(progress.clone()), ..CommitOptions::default() };
    v.commit(id, &ImportConfig::new("p"), opts).unwrap();
    let snap = progress.snapshot();
    assert_eq!((snap.rows_processed, snap.batches_flushed, snap.rows_written), (100, 10, 100));

    let token = CancelToken::new();
    token.cancel();
    let id = upload(&v, "c.csv", data.as_bytes());
    let opts = CommitOptions { cancel: Some(token), ..CommitOptions::default() };
    let err = v.commit(id, &ImportConfig::new("c"), opts).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    let d = v.store().get_dataset(err.dataset_id().unwrap()).unwrap();
    assert_eq!(d.status, DatasetStatus::Failed);
}
