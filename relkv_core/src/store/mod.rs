//! The public store surface: put/get/scan/delete/exists over lazily
//! materialized relational schema, with explicit or per-call transactions.

pub mod registry;

use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::engine::pg::PgEngine;
use crate::engine::{Connection, Engine, EngineError, EngineErrorKind};
use crate::error::StoreError;
use crate::query::{self, ScanOptions};
use crate::store::registry::SchemaRegistry;
use crate::types::datatype::ColumnType;
use crate::types::value::Value;

/// Attribute group used when the caller does not name one.
pub const DEFAULT_ATTRIBUTE_GROUP: &str = "cf_1";

/// One scanned row: the key and the value stored under the scanned attribute
/// group, `None` when the row was only ever written under other groups.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEntry {
    pub key: String,
    pub value: Option<Value>,
}

/// Finite scan results in the engine's delivery order. Not restartable;
/// re-invoking `scan` issues a new query.
#[derive(Debug)]
pub struct Scan {
    entries: std::vec::IntoIter<ScanEntry>,
}

impl Iterator for Scan {
    type Item = ScanEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }
}

/// A logical key-value store backed by a relational engine.
///
/// One store instance owns one connection and at most one open transaction;
/// concurrent callers must serialize externally. Independent instances
/// against the same namespace are safe at the engine level.
pub struct Store {
    engine: Box<dyn Engine>,
    conn: Box<dyn Connection>,
    cursor_open: bool,
    registry: SchemaRegistry,
}

impl Store {
    /// Connects to Postgres, creating the namespace on first use.
    pub fn connect(config: StoreConfig) -> Result<Self, StoreError> {
        let engine = Box::new(PgEngine::new(config.clone()));
        Self::with_engine(engine, &config)
    }

    /// Opens a store over any engine implementation.
    pub fn with_engine(engine: Box<dyn Engine>, config: &StoreConfig) -> Result<Self, StoreError> {
        if config.namespace.is_empty() {
            return Err(StoreError::MissingNamespace);
        }

        let mut admin = engine.connect_admin()?;
        match admin.execute(&query::create_database(&config.namespace)) {
            Ok(_) => debug!(namespace = %config.namespace, "created namespace"),
            Err(err) if err.kind == EngineErrorKind::DuplicateDatabase => {}
            Err(err) => return Err(err.into()),
        }
        drop(admin);

        let mut conn = engine.connect()?;
        // Best effort: engines without the sharding extension stay plain.
        if let Err(err) = conn.execute(&query::enable_sharding()) {
            debug!(error = %err, "sharding extension unavailable");
        }

        Ok(Self {
            engine,
            conn,
            cursor_open: false,
            registry: SchemaRegistry::new(),
        })
    }

    /// Opens an explicit transaction. All following operations join it until
    /// `commit_transaction` or `rollback_transaction`. Do not nest: a second
    /// begin joins the first transaction rather than stacking a new one.
    pub fn begin_transaction(&mut self) -> Result<(), StoreError> {
        self.conn.begin()?;
        self.cursor_open = true;
        Ok(())
    }

    pub fn commit_transaction(&mut self) -> Result<(), StoreError> {
        if !self.cursor_open {
            return Err(StoreError::NoActiveTransaction);
        }
        self.conn.commit()?;
        self.cursor_open = false;
        Ok(())
    }

    pub fn rollback_transaction(&mut self) -> Result<(), StoreError> {
        if !self.cursor_open {
            return Err(StoreError::NoActiveTransaction);
        }
        self.conn.rollback()?;
        self.cursor_open = false;
        Ok(())
    }

    /// Writes one value under `(table, key, group)`, overwriting only that
    /// attribute group if the key already exists. Backing table and column
    /// are created on first use.
    pub fn put(
        &mut self,
        table: &str,
        key: &str,
        value: impl Into<Value>,
        group: Option<&str>,
    ) -> Result<(), StoreError> {
        let table = table.to_lowercase();
        let group = group.unwrap_or(DEFAULT_ATTRIBUTE_GROUP).to_lowercase();
        let value = value.into();
        self.with_recovery(|store| {
            store.ensure_table(&table)?;
            store.ensure_attribute_group(&table, &group, &value)?;
            store.autocommit(|store| {
                store.conn.execute(&query::upsert(&table, &group, key, value))?;
                Ok(())
            })
        })
    }

    /// Batch form of `put`: one schema check for the whole batch, all upserts
    /// in a single transaction scope. An empty batch is a no-op.
    pub fn put_batch(
        &mut self,
        table: &str,
        pairs: &[(&str, Value)],
        group: Option<&str>,
    ) -> Result<(), StoreError> {
        let Some((_, sample)) = pairs.first() else {
            return Ok(());
        };
        let table = table.to_lowercase();
        let group = group.unwrap_or(DEFAULT_ATTRIBUTE_GROUP).to_lowercase();
        let sample = sample.clone();
        self.with_recovery(|store| {
            store.ensure_table(&table)?;
            store.ensure_attribute_group(&table, &group, &sample)?;
            store.autocommit(|store| {
                for (key, value) in pairs {
                    store.conn.execute(&query::upsert(&table, &group, key, value.clone()))?;
                }
                Ok(())
            })
        })
    }

    /// Reads the value stored under `(table, key, group)`. A missing key and
    /// a table or group that was never created both read as `None`.
    pub fn get(&mut self, table: &str, key: &str, group: Option<&str>) -> Result<Option<Value>, StoreError> {
        let table = table.to_lowercase();
        let group = group.unwrap_or(DEFAULT_ATTRIBUTE_GROUP).to_lowercase();
        self.with_recovery(|store| {
            let auto = !store.cursor_open;
            if auto {
                store.conn.begin()?;
                store.cursor_open = true;
            }
            let rows = match store.conn.query(&query::select_value(&table, &group, key)) {
                Ok(rows) => rows,
                Err(err) if schema_missing(&err) => {
                    if auto {
                        store.abort_autocommit();
                    }
                    return Ok(None);
                }
                Err(err) => return Err(err.into()),
            };
            let value = rows.into_iter().next().and_then(|row| row.0.into_iter().next().flatten());
            if auto {
                store.conn.commit()?;
                store.cursor_open = false;
            }
            Ok(value)
        })
    }

    /// Ordered, bounded range scan. At least one bound is required. A table
    /// or group that was never created scans as empty.
    pub fn scan(&mut self, table: &str, group: Option<&str>, options: ScanOptions) -> Result<Scan, StoreError> {
        options.validate()?;
        let table = table.to_lowercase();
        let group = group.unwrap_or(DEFAULT_ATTRIBUTE_GROUP).to_lowercase();
        self.with_recovery(|store| {
            let auto = !store.cursor_open;
            if auto {
                store.conn.begin()?;
                store.cursor_open = true;
            }
            let rows = match store.conn.query(&query::scan(&table, &group, &options)) {
                Ok(rows) => rows,
                Err(err) if schema_missing(&err) => {
                    if auto {
                        store.abort_autocommit();
                    }
                    return Ok(Scan { entries: Vec::new().into_iter() });
                }
                Err(err) => return Err(err.into()),
            };
            let mut entries = Vec::with_capacity(rows.len());
            for row in rows {
                let mut columns = row.0.into_iter();
                let key = match columns.next().flatten() {
                    Some(Value::Text(key)) => key,
                    _ => return Err(EngineError::other("scan row is missing its key").into()),
                };
                entries.push(ScanEntry { key, value: columns.next().flatten() });
            }
            if auto {
                store.conn.commit()?;
                store.cursor_open = false;
            }
            Ok(Scan { entries: entries.into_iter() })
        })
    }

    /// Removes the row for `key`, all attribute groups included. Deleting
    /// from a table that was never created is a no-op.
    pub fn delete(&mut self, table: &str, key: &str) -> Result<(), StoreError> {
        let table = table.to_lowercase();
        self.with_recovery(|store| {
            let auto = !store.cursor_open;
            if auto {
                store.conn.begin()?;
                store.cursor_open = true;
            }
            match store.conn.execute(&query::delete_row(&table, key)) {
                Ok(_) => {}
                Err(err) if schema_missing(&err) => {
                    if auto {
                        store.abort_autocommit();
                    }
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
            if auto {
                store.conn.commit()?;
                store.cursor_open = false;
            }
            Ok(())
        })
    }

    /// Whether `get` would return a value.
    pub fn exists(&mut self, table: &str, key: &str, group: Option<&str>) -> Result<bool, StoreError> {
        Ok(self.get(table, key, group)?.is_some())
    }

    /// Recovery envelope: on any failure, roll back, reconnect, and re-raise
    /// the original error. Uncommitted work in the failed transaction is
    /// gone; callers retry from scratch.
    fn with_recovery<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(error = %err, "operation failed, rolling back and reconnecting");
                self.recover();
                Err(err)
            }
        }
    }

    fn recover(&mut self) {
        if let Err(err) = self.conn.rollback() {
            debug!(error = %err, "rollback during recovery failed");
        }
        self.cursor_open = false;
        match self.engine.connect() {
            Ok(conn) => self.conn = conn,
            // The original error still propagates; the next operation will
            // fail on this connection and recover again.
            Err(err) => warn!(error = %err, "reconnect after failure did not succeed"),
        }
    }

    /// Runs `op` in its own transaction when no explicit transaction is
    /// open; otherwise joins the caller's transaction.
    fn autocommit<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let auto = !self.cursor_open;
        if auto {
            self.conn.begin()?;
            self.cursor_open = true;
        }
        let out = op(self)?;
        if auto {
            self.conn.commit()?;
            self.cursor_open = false;
        }
        Ok(out)
    }

    /// Rolls back a single-call transaction after a locally recovered error.
    fn abort_autocommit(&mut self) {
        if let Err(err) = self.conn.rollback() {
            debug!(error = %err, "rollback of implicit transaction failed");
        }
        self.cursor_open = false;
    }

    /// Creates the backing table, its indexes, and the best-effort
    /// distribution hook, exactly once per process per table name.
    fn ensure_table(&mut self, table: &str) -> Result<(), StoreError> {
        if self.registry.table_known(table) {
            return Ok(());
        }
        debug!(table, "creating backing table");
        self.autocommit(|store| {
            store.conn.execute(&query::create_table(table))?;
            store.conn.execute(&query::create_key_index(table))?;
            store.conn.execute(&query::create_timestamp_index(table))?;
            Ok(())
        })?;
        if !self.cursor_open {
            self.try_distribute(table);
        }
        self.registry.mark_table(table);
        Ok(())
    }

    /// Sharding hook: failures are expected on plain engines and swallowed.
    /// Runs in its own transaction so a refusal cannot abort anything else.
    fn try_distribute(&mut self, table: &str) {
        if self.conn.begin().is_err() {
            return;
        }
        self.cursor_open = true;
        match self.conn.execute(&query::distribute_table(table)) {
            Ok(_) => {
                if let Err(err) = self.conn.commit() {
                    debug!(table, error = %err, "distribute commit failed");
                }
            }
            Err(err) => {
                debug!(table, error = %err, "table not distributed");
                if let Err(err) = self.conn.rollback() {
                    debug!(table, error = %err, "distribute rollback failed");
                }
            }
        }
        self.cursor_open = false;
    }

    /// Adds the typed column for an attribute group, exactly once per
    /// process per (table, group).
    ///
    /// The column is probed before the add because ADD COLUMN IF NOT EXISTS
    /// is not reliable when a previous transaction on this connection
    /// aborted. A probe that cleanly reports the column missing leads to the
    /// add; a probe that fails any other way (typically a prior failed
    /// transaction) is treated as "already exists" and never retried.
    fn ensure_attribute_group(&mut self, table: &str, group: &str, sample: &Value) -> Result<(), StoreError> {
        if self.registry.group_known(table, group) {
            return Ok(());
        }
        let column_type = ColumnType::of(sample);
        debug!(table, group, column_type = column_type.sql_name(), "adding attribute group");

        let auto = !self.cursor_open;
        if auto {
            self.conn.begin()?;
            self.cursor_open = true;
        }
        match self.conn.query(&query::probe_column(table, group)) {
            Ok(_) => {
                if auto {
                    self.conn.commit()?;
                    self.cursor_open = false;
                }
            }
            Err(err) if err.kind == EngineErrorKind::UndefinedColumn => {
                // The failed probe aborted its transaction; start clean
                // before the add.
                if auto {
                    self.conn.rollback()?;
                    self.conn.begin()?;
                }
                self.conn.execute(&query::add_column(table, group, column_type))?;
                if auto {
                    self.conn.commit()?;
                    self.cursor_open = false;
                }
            }
            Err(err) => {
                debug!(table, group, error = %err, "column probe inconclusive, assuming present");
                if auto {
                    self.abort_autocommit();
                }
            }
        }
        self.registry.mark_group(table, group);
        Ok(())
    }
}

fn schema_missing(err: &EngineError) -> bool {
    matches!(err.kind, EngineErrorKind::UndefinedTable | EngineErrorKind::UndefinedColumn)
}
