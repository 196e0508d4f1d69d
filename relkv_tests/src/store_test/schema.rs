use super::*;
use relkv_core::Value;

#[test]
fn test_schema_created_once_per_table_and_group() {
    let (mut store, engine) = test_store();
    store.put("t1", "k1", "v1", None).unwrap();
    store.put("t1", "k2", "v2", None).unwrap();
    store.put("t1", "k3", "v3", None).unwrap();

    assert_eq!(engine.statement_count("create_table"), 1);
    assert_eq!(engine.statement_count("create_key_index"), 1);
    assert_eq!(engine.statement_count("create_timestamp_index"), 1);
    assert_eq!(engine.statement_count("probe_column"), 1);
    assert_eq!(engine.statement_count("add_column"), 1);
    assert_eq!(engine.statement_count("upsert"), 3);
}

#[test]
fn test_second_group_adds_second_column_only() {
    let (mut store, engine) = test_store();
    store.put("t1", "k1", "v1", Some("g1")).unwrap();
    store.put("t1", "k1", "v2", Some("g2")).unwrap();

    assert_eq!(engine.statement_count("create_table"), 1);
    assert_eq!(engine.statement_count("add_column"), 2);
}

#[test]
fn test_batch_put_shares_one_schema_check() {
    let (mut store, engine) = test_store();
    store
        .put_batch("t1", &[("k1", "v1".into()), ("k2", "v2".into()), ("k3", "v3".into())], None)
        .unwrap();

    assert_eq!(engine.statement_count("create_table"), 1);
    assert_eq!(engine.statement_count("probe_column"), 1);
    assert_eq!(engine.statement_count("upsert"), 3);
}

#[test]
fn test_column_type_fixed_by_first_write() {
    let (mut store, _) = test_store();
    store.put("t1", "k1", "text value", None).unwrap();
    // Same group, incompatible shape: the engine reports the mismatch.
    let err = store.put("t1", "k2", 42i64, None).unwrap_err();
    assert!(err.to_string().contains("type"));
}

#[test]
fn test_probe_finds_column_created_by_other_instance() {
    let (mut store1, engine) = test_store();
    store1.put("t1", "k1", "v1", None).unwrap();

    // Fresh registry, existing schema: the probe sees the column and no
    // second ADD COLUMN is attempted.
    let mut store2 = attach(&engine);
    store2.put("t1", "k2", "v2", None).unwrap();

    assert_eq!(engine.statement_count("add_column"), 1);
    assert_eq!(store2.get("t1", "k1", None).unwrap(), Some(Value::from("v1")));
}

#[test]
fn test_inconclusive_probe_assumes_column_exists() {
    let (mut store1, engine) = test_store();
    store1.put("t1", "k1", "v1", None).unwrap();

    // A probe failing for any reason other than "column missing" must not
    // trigger an add and must not be retried.
    let mut store2 = attach(&engine);
    engine.fail_next("probe_column", "deadlock detected");
    store2.put("t1", "k2", "v2", None).unwrap();

    assert_eq!(engine.statement_count("add_column"), 1);
    assert_eq!(store2.get("t1", "k2", None).unwrap(), Some(Value::from("v2")));
}

#[test]
fn test_registry_goes_stale_after_external_drop() {
    use relkv_core::StoreError;
    use relkv_core::engine::EngineErrorKind;

    let (mut store, engine) = test_store();
    store.put("t1", "k1", "v1", None).unwrap();

    // Dropping the table outside the store is never observed by the
    // registry; the next write fails at the engine instead of recreating.
    engine.drop_table("t1");
    let err = store.put("t1", "k2", "v2", None).unwrap_err();
    match err {
        StoreError::Engine(err) => assert_eq!(err.kind, EngineErrorKind::UndefinedTable),
        other => panic!("expected engine error, got {other:?}"),
    }
    assert_eq!(engine.statement_count("create_table"), 1);
}
