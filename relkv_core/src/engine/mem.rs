use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::{Connection, Engine, EngineError, EngineErrorKind, EngineRow};
use crate::query::{Statement, StatementKind};
use crate::types::datatype::ColumnType;
use crate::types::value::Value;

/// In-memory engine implementing the same boundary contract as the Postgres
/// backend. State is shared between connections, so reconnecting after a
/// failure sees everything that was committed, like against a real server.
///
/// Transactions snapshot the table map on `begin`; an injected fault inside
/// an open transaction poisons it the way an aborted server transaction
/// would. Schema misses (unknown table or column) report their error without
/// poisoning, matching embedded engines rather than Postgres.
#[derive(Debug, Clone, Default)]
pub struct MemEngine {
    state: Arc<Mutex<MemState>>,
}

#[derive(Debug, Default)]
struct MemState {
    namespaces: HashSet<String>,
    tables: HashMap<String, MemTable>,
    /// Kind name of every statement that reached the engine, in order.
    log: Vec<&'static str>,
    /// When set, the next statement of the named kind fails with the message.
    fail_next: Option<(String, String)>,
    /// Insertion counter standing in for `created_at`.
    seq: u64,
}

#[derive(Debug, Clone, Default)]
struct MemTable {
    columns: HashMap<String, ColumnType>,
    rows: BTreeMap<String, MemRow>,
}

#[derive(Debug, Clone)]
struct MemRow {
    values: HashMap<String, Value>,
    seq: u64,
}

impl MemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next statement of the given kind fail, on any connection.
    pub fn fail_next(&self, kind: &str, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next = Some((kind.to_string(), message.to_string()));
        }
    }

    /// Number of statements of the given kind that reached the engine.
    pub fn statement_count(&self, kind: &str) -> usize {
        self.state
            .lock()
            .map(|state| state.log.iter().filter(|name| **name == kind).count())
            .unwrap_or(0)
    }

    /// Drops a committed table behind every connection's back, emulating an
    /// external schema change the registry never observes.
    pub fn drop_table(&self, table: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.tables.remove(table);
        }
    }
}

impl Engine for MemEngine {
    fn connect_admin(&self) -> Result<Box<dyn Connection>, EngineError> {
        self.connect()
    }

    fn connect(&self) -> Result<Box<dyn Connection>, EngineError> {
        Ok(Box::new(MemConnection {
            state: Arc::clone(&self.state),
            staged: None,
            failed: false,
        }))
    }
}

struct MemConnection {
    state: Arc<Mutex<MemState>>,
    /// Snapshot taken at `begin`; replaces the shared tables on `commit`.
    staged: Option<HashMap<String, MemTable>>,
    failed: bool,
}

impl MemConnection {
    fn lock(state: &Mutex<MemState>) -> Result<MutexGuard<'_, MemState>, EngineError> {
        state
            .lock()
            .map_err(|_| EngineError::new(EngineErrorKind::Connection, "engine state poisoned"))
    }

    fn run(&mut self, stmt: &Statement) -> Result<(u64, Vec<EngineRow>), EngineError> {
        let MemConnection { state, staged, failed } = self;
        let mut guard = Self::lock(state)?;
        if *failed && staged.is_some() {
            return Err(EngineError::new(
                EngineErrorKind::FailedTransaction,
                "current transaction is aborted, commands ignored until end of transaction block",
            ));
        }
        guard.log.push(stmt.kind.name());
        if let Some((kind, message)) = guard.fail_next.clone() {
            if kind == stmt.kind.name() {
                guard.fail_next = None;
                if staged.is_some() {
                    *failed = true;
                }
                return Err(EngineError::other(message));
            }
        }
        let MemState { namespaces, tables, seq, .. } = &mut *guard;
        let tables = match staged.as_mut() {
            Some(staged) => staged,
            None => tables,
        };
        dispatch(stmt, namespaces, tables, seq)
    }
}

impl Connection for MemConnection {
    fn execute(&mut self, stmt: &Statement) -> Result<u64, EngineError> {
        self.run(stmt).map(|(affected, _)| affected)
    }

    fn query(&mut self, stmt: &Statement) -> Result<Vec<EngineRow>, EngineError> {
        self.run(stmt).map(|(_, rows)| rows)
    }

    fn begin(&mut self) -> Result<(), EngineError> {
        if self.staged.is_none() {
            let snapshot = Self::lock(&self.state)?.tables.clone();
            self.staged = Some(snapshot);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        // Committing an aborted transaction rolls it back, as Postgres does.
        if self.failed {
            self.staged = None;
            self.failed = false;
            return Ok(());
        }
        if let Some(staged) = self.staged.take() {
            Self::lock(&self.state)?.tables = staged;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), EngineError> {
        self.staged = None;
        self.failed = false;
        Ok(())
    }
}

fn dispatch(
    stmt: &Statement,
    namespaces: &mut HashSet<String>,
    tables: &mut HashMap<String, MemTable>,
    seq: &mut u64,
) -> Result<(u64, Vec<EngineRow>), EngineError> {
    match &stmt.kind {
        StatementKind::CreateDatabase { namespace } => {
            if !namespaces.insert(namespace.clone()) {
                return Err(EngineError::new(
                    EngineErrorKind::DuplicateDatabase,
                    format!("database \"{namespace}\" already exists"),
                ));
            }
            Ok((0, Vec::new()))
        }
        StatementKind::EnableSharding => {
            Err(EngineError::other("extension \"citus\" is not available"))
        }
        StatementKind::DistributeTable { .. } => {
            Err(EngineError::other("function create_distributed_table(regclass, unknown) does not exist"))
        }
        StatementKind::CreateTable { table } => {
            tables.entry(table.clone()).or_default();
            Ok((0, Vec::new()))
        }
        StatementKind::CreateKeyIndex { table } | StatementKind::CreateTimestampIndex { table } => {
            table_ref(tables, table)?;
            Ok((0, Vec::new()))
        }
        StatementKind::ProbeColumn { table, column } => {
            let found = table_ref(tables, table)?;
            column_check(found, table, column)?;
            Ok((0, Vec::new()))
        }
        StatementKind::AddColumn { table, column, column_type } => {
            let found = table_mut(tables, table)?;
            found.columns.entry(column.clone()).or_insert(*column_type);
            Ok((0, Vec::new()))
        }
        StatementKind::Upsert { table, column } => {
            let key = text_param(&stmt.params, 0)?.to_string();
            let value = stmt
                .params
                .get(1)
                .cloned()
                .ok_or_else(|| EngineError::other("missing value parameter"))?;
            let found = table_mut(tables, table)?;
            let declared = *column_check(found, table, column)?;
            if ColumnType::of(&value) != declared {
                return Err(EngineError::other(format!(
                    "column \"{column}\" is of type {} but the bound value is not",
                    declared.sql_name()
                )));
            }
            match found.rows.get_mut(&key) {
                Some(row) => {
                    row.values.insert(column.clone(), value);
                }
                None => {
                    *seq += 1;
                    let mut values = HashMap::new();
                    values.insert(column.clone(), value);
                    found.rows.insert(key, MemRow { values, seq: *seq });
                }
            }
            Ok((1, Vec::new()))
        }
        StatementKind::SelectValue { table, column } => {
            let key = text_param(&stmt.params, 0)?;
            let found = table_ref(tables, table)?;
            column_check(found, table, column)?;
            let rows = match found.rows.get(key) {
                Some(row) => vec![EngineRow(vec![row.values.get(column).cloned()])],
                None => Vec::new(),
            };
            Ok((0, rows))
        }
        StatementKind::Scan { table, column, has_start, has_stop, by_created_at, descending, limit } => {
            let found = table_ref(tables, table)?;
            column_check(found, table, column)?;
            let mut next_param = 0;
            let start = if *has_start {
                let bound = text_param(&stmt.params, next_param)?;
                next_param += 1;
                Some(bound.to_string())
            } else {
                None
            };
            let stop = if *has_stop {
                Some(text_param(&stmt.params, next_param)?.to_string())
            } else {
                None
            };

            let mut matched: Vec<(&String, &MemRow)> = found
                .rows
                .iter()
                .filter(|(key, _)| {
                    start.as_ref().is_none_or(|s| key.as_str() >= s.as_str())
                        && stop.as_ref().is_none_or(|s| key.as_str() <= s.as_str())
                })
                .collect();
            if *by_created_at {
                matched.sort_by_key(|(_, row)| row.seq);
            }
            if *descending {
                matched.reverse();
            }
            if let Some(limit) = limit {
                matched.truncate(*limit);
            }

            let rows = matched
                .into_iter()
                .map(|(key, row)| {
                    EngineRow(vec![Some(Value::Text(key.clone())), row.values.get(column).cloned()])
                })
                .collect();
            Ok((0, rows))
        }
        StatementKind::DeleteRow { table } => {
            let key = text_param(&stmt.params, 0)?.to_string();
            let found = table_mut(tables, table)?;
            let removed = found.rows.remove(&key).is_some();
            Ok((u64::from(removed), Vec::new()))
        }
    }
}

fn table_ref<'a>(tables: &'a HashMap<String, MemTable>, table: &str) -> Result<&'a MemTable, EngineError> {
    tables.get(table).ok_or_else(|| {
        EngineError::new(EngineErrorKind::UndefinedTable, format!("relation \"{table}\" does not exist"))
    })
}

fn table_mut<'a>(tables: &'a mut HashMap<String, MemTable>, table: &str) -> Result<&'a mut MemTable, EngineError> {
    tables.get_mut(table).ok_or_else(|| {
        EngineError::new(EngineErrorKind::UndefinedTable, format!("relation \"{table}\" does not exist"))
    })
}

fn column_check<'a>(found: &'a MemTable, table: &str, column: &str) -> Result<&'a ColumnType, EngineError> {
    found.columns.get(column).ok_or_else(|| {
        EngineError::new(
            EngineErrorKind::UndefinedColumn,
            format!("column \"{column}\" of relation \"{table}\" does not exist"),
        )
    })
}

fn text_param(params: &[Value], index: usize) -> Result<&str, EngineError> {
    match params.get(index) {
        Some(Value::Text(s)) => Ok(s),
        _ => Err(EngineError::other("parameter type mismatch")),
    }
}
