use super::*;
use relkv_core::{StoreError, Value};

#[test]
fn test_explicit_commit_persists_writes() {
    let (mut store, _) = test_store();
    store.begin_transaction().unwrap();
    store.put("t1", "k1", "v1", None).unwrap();
    store.put("t1", "k2", "v2", None).unwrap();
    store.commit_transaction().unwrap();

    assert_eq!(store.get("t1", "k1", None).unwrap(), Some(Value::from("v1")));
    assert_eq!(store.get("t1", "k2", None).unwrap(), Some(Value::from("v2")));
}

#[test]
fn test_explicit_rollback_discards_writes() {
    let (mut store, _) = test_store();
    store.begin_transaction().unwrap();
    store.put("t1", "k1", "v1", None).unwrap();
    store.rollback_transaction().unwrap();

    assert_eq!(store.get("t1", "k1", None).unwrap(), None);
}

#[test]
fn test_writes_visible_inside_open_transaction() {
    let (mut store, _) = test_store();
    store.begin_transaction().unwrap();
    store.put("t1", "k1", "v1", None).unwrap();
    assert_eq!(store.get("t1", "k1", None).unwrap(), Some(Value::from("v1")));
    store.rollback_transaction().unwrap();
}

#[test]
fn test_uncommitted_writes_invisible_to_other_instance() {
    let (mut store, engine) = test_store();
    let mut other = attach(&engine);

    store.begin_transaction().unwrap();
    store.put("t1", "k1", "v1", None).unwrap();
    assert_eq!(other.get("t1", "k1", None).unwrap(), None);

    store.commit_transaction().unwrap();
    assert_eq!(other.get("t1", "k1", None).unwrap(), Some(Value::from("v1")));
}

#[test]
fn test_autocommit_visible_immediately() {
    let (mut store, engine) = test_store();
    let mut other = attach(&engine);

    store.put("t1", "k1", "v1", None).unwrap();
    assert_eq!(other.get("t1", "k1", None).unwrap(), Some(Value::from("v1")));
}

#[test]
fn test_commit_without_transaction_errors() {
    let (mut store, _) = test_store();
    let err = store.commit_transaction().unwrap_err();
    assert!(matches!(err, StoreError::NoActiveTransaction));
}

#[test]
fn test_rollback_without_transaction_errors() {
    let (mut store, _) = test_store();
    let err = store.rollback_transaction().unwrap_err();
    assert!(matches!(err, StoreError::NoActiveTransaction));
}

#[test]
fn test_new_transaction_allowed_after_commit_and_rollback() {
    let (mut store, _) = test_store();
    store.begin_transaction().unwrap();
    store.commit_transaction().unwrap();
    store.begin_transaction().unwrap();
    store.rollback_transaction().unwrap();
    store.begin_transaction().unwrap();
    store.commit_transaction().unwrap();
}

#[test]
fn test_batch_put_joins_explicit_transaction() {
    let (mut store, _) = test_store();
    store.begin_transaction().unwrap();
    store
        .put_batch("t1", &[("k1", "v1".into()), ("k2", "v2".into())], None)
        .unwrap();
    store.rollback_transaction().unwrap();

    assert_eq!(store.get("t1", "k1", None).unwrap(), None);
    assert_eq!(store.get("t1", "k2", None).unwrap(), None);
}

#[test]
fn test_delete_joins_explicit_transaction() {
    let (mut store, _) = test_store();
    store.put("t1", "k1", "v1", None).unwrap();

    store.begin_transaction().unwrap();
    store.delete("t1", "k1").unwrap();
    store.rollback_transaction().unwrap();

    assert_eq!(store.get("t1", "k1", None).unwrap(), Some(Value::from("v1")));
}
