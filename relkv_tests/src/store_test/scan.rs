use super::*;
use relkv_core::{Order, OrderBy, ScanOptions, StoreError, Value};

fn keys(store: &mut Store, table: &str, options: ScanOptions) -> Vec<String> {
    store
        .scan(table, None, options)
        .unwrap()
        .map(|entry| entry.key)
        .collect()
}

#[test]
fn test_scan_ascending_is_lexicographic() {
    let (mut store, _) = test_store();
    for key in ["key_3", "key_1", "key_5", "key_2", "key_4"] {
        store.put("t1", key, "v", None).unwrap();
    }
    let options = ScanOptions::new().from_key("key_1").to_key("key_5");
    assert_eq!(keys(&mut store, "t1", options), vec!["key_1", "key_2", "key_3", "key_4", "key_5"]);
}

#[test]
fn test_scan_descending_reverses_order() {
    let (mut store, _) = test_store();
    for key in ["key_3", "key_1", "key_5", "key_2", "key_4"] {
        store.put("t1", key, "v", None).unwrap();
    }
    let options = ScanOptions::new().from_key("key_1").to_key("key_5").order(Order::Descending);
    assert_eq!(keys(&mut store, "t1", options), vec!["key_5", "key_4", "key_3", "key_2", "key_1"]);
}

#[test]
fn test_scan_bounds_are_inclusive() {
    let (mut store, _) = test_store();
    for key in ["a", "b", "c", "d"] {
        store.put("t1", key, "v", None).unwrap();
    }
    assert_eq!(keys(&mut store, "t1", ScanOptions::new().from_key("b").to_key("c")), vec!["b", "c"]);
}

#[test]
fn test_scan_start_only_and_stop_only() {
    let (mut store, _) = test_store();
    for key in ["a", "b", "c", "d"] {
        store.put("t1", key, "v", None).unwrap();
    }
    assert_eq!(keys(&mut store, "t1", ScanOptions::new().from_key("c")), vec!["c", "d"]);
    assert_eq!(keys(&mut store, "t1", ScanOptions::new().to_key("b")), vec!["a", "b"]);
}

#[test]
fn test_scan_limit_caps_results() {
    let (mut store, _) = test_store();
    for key in ["a", "b", "c", "d"] {
        store.put("t1", key, "v", None).unwrap();
    }
    assert_eq!(keys(&mut store, "t1", ScanOptions::new().from_key("a").limit(2)), vec!["a", "b"]);
}

#[test]
fn test_scan_by_created_at_follows_insertion_order() {
    let (mut store, _) = test_store();
    for key in ["b", "c", "a"] {
        store.put("t1", key, "v", None).unwrap();
    }
    let asc = ScanOptions::new().from_key("a").to_key("z").order_by(OrderBy::CreatedAt);
    assert_eq!(keys(&mut store, "t1", asc), vec!["b", "c", "a"]);

    let desc = ScanOptions::new()
        .from_key("a")
        .to_key("z")
        .order_by(OrderBy::CreatedAt)
        .order(Order::Descending);
    assert_eq!(keys(&mut store, "t1", desc), vec!["a", "c", "b"]);
}

#[test]
fn test_scan_unknown_table_is_empty() {
    let (mut store, _) = test_store();
    let options = ScanOptions::new().from_key("a").to_key("z");
    let entries: Vec<_> = store.scan("never_created", None, options).unwrap().collect();
    assert!(entries.is_empty());
}

#[test]
fn test_scan_without_bounds_is_a_usage_error() {
    let (mut store, engine) = test_store();
    store.put("t1", "k1", "v1", None).unwrap();
    let err = store.scan("t1", None, ScanOptions::new()).unwrap_err();
    assert!(matches!(err, StoreError::EmptyScanBounds));
    // Rejected before anything reaches the engine.
    assert_eq!(engine.statement_count("scan"), 0);
}

#[test]
fn test_scan_yields_null_for_rows_missing_the_group() {
    let (mut store, _) = test_store();
    store.put("t1", "k1", "v1", Some("g1")).unwrap();
    store.put("t1", "k2", "v2", Some("g2")).unwrap();

    let options = ScanOptions::new().from_key("k1").to_key("k2");
    let entries: Vec<_> = store.scan("t1", Some("g1"), options).unwrap().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].value, Some(Value::from("v1")));
    assert_eq!(entries[1].value, None);
}

#[test]
fn test_scan_values_come_back_with_keys() {
    let (mut store, _) = test_store();
    store
        .put_batch("t1", &[("k1", "v1".into()), ("k3", "v3".into())], None)
        .unwrap();
    store.put("t1", "k2", "v2", None).unwrap();

    let options = ScanOptions::new().from_key("k1").to_key("k3");
    let entries: Vec<_> = store
        .scan("t1", None, options)
        .unwrap()
        .map(|entry| (entry.key, entry.value))
        .collect();
    assert_eq!(
        entries,
        vec![
            ("k1".to_string(), Some(Value::from("v1"))),
            ("k2".to_string(), Some(Value::from("v2"))),
            ("k3".to_string(), Some(Value::from("v3"))),
        ]
    );
}
