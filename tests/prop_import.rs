use crockdata::Visualizer;
use crockdata::config::ImportConfig;
use crockdata::import::{CommitOptions, UploadSource};
use crockdata::parse::{ParseOptions, RowReader};
use crockdata::types::FileKind;
use proptest::prelude::*;
use serde_json::{Map, Value};

fn grid() -> impl Strategy<Value = (usize, Vec<Vec<String>>)> {
    (1usize..5).prop_flat_map(|cols| {
        let cell = "[a-zA-Z0-9 ,;\"\n]{0,8}";
        (Just(cols), prop::collection::vec(prop::collection::vec(cell, cols), 0..20))
    })
}

fn write_csv(cols: usize, rows: &[Vec<String>]) -> Vec<u8> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record((0..cols).map(|i| format!("c{i}"))).unwrap();
    for r in rows {
        w.write_record(r).unwrap();
    }
    w.into_inner().unwrap()
}

proptest! {
    #[test]
    fn prop_csv_grid_round_trips_through_store((cols, rows) in grid()) {
        let data = write_csv(cols, &rows);
        let v = Visualizer::in_memory();
        let up = v.register_upload("grid.csv", None, UploadSource::Bytes(data)).unwrap();
        let out = v.commit(up.id, &ImportConfig::new("grid"), CommitOptions::default()).unwrap();
        prop_assert_eq!(out.rows_imported, rows.len() as u64);
        prop_assert_eq!(out.columns.len(), cols);

        let stored = v.store().rows(out.dataset_id, 0, rows.len() as u64).unwrap();
        let back: Vec<Vec<String>> = stored
            .iter()
            .map(|r| r.values.iter().map(|(_, value)| value.clone()).collect())
            .collect();
        prop_assert_eq!(back, rows);
    }

    #[test]
    fn prop_json_columns_are_key_union_in_first_seen_order(
        objects in prop::collection::vec(prop::collection::vec((0usize..6, any::<i32>()), 0..6), 0..10)
    ) {
        let mut expected: Vec<String> = Vec::new();
        let docs: Vec<Value> = objects
            .iter()
            .map(|pairs| {
                let mut m = Map::new();
                for (k, n) in pairs {
                    let key = format!("k{k}");
                    if !m.contains_key(&key) {
                        if !expected.contains(&key) {
                            expected.push(key.clone());
                        }
                        m.insert(key, Value::from(*n));
                    }
                }
                Value::Object(m)
            })
            .collect();
        let text = serde_json::to_vec(&Value::Array(docs.clone())).unwrap();
        let reader = RowReader::open(FileKind::Json, &ParseOptions::default(), &text[..]).unwrap();
        let columns = reader.columns().to_vec();
        let rows: Vec<_> = reader.map(|r| r.unwrap()).collect();
        prop_assert_eq!(&columns, &expected);
        prop_assert_eq!(rows.len(), docs.len());
        for (row, doc) in rows.iter().zip(&docs) {
            for (col, value) in columns.iter().zip(&row.values) {
                let want = doc.get(col).map(|v| v.to_string()).unwrap_or_default();
                prop_assert_eq!(value, &want);
            }
        }
    }
}
