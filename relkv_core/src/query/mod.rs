//! Compiles logical point and range operations into parameterized SQL.
//!
//! Every statement carries both its SQL text (what the Postgres backend
//! sends) and a closed [`StatementKind`] tag (what the in-memory backend
//! dispatches on). Identifiers are always quoted, values are always bound.

use crate::error::StoreError;
use crate::types::datatype::ColumnType;
use crate::types::value::Value;

/// Structured description of a compiled statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    CreateDatabase { namespace: String },
    EnableSharding,
    CreateTable { table: String },
    CreateKeyIndex { table: String },
    CreateTimestampIndex { table: String },
    DistributeTable { table: String },
    ProbeColumn { table: String, column: String },
    AddColumn { table: String, column: String, column_type: ColumnType },
    Upsert { table: String, column: String },
    SelectValue { table: String, column: String },
    Scan { table: String, column: String, has_start: bool, has_stop: bool, by_created_at: bool, descending: bool, limit: Option<usize> },
    DeleteRow { table: String },
}

impl StatementKind {
    /// Stable name used for statement logging.
    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::CreateDatabase { .. } => "create_database",
            StatementKind::EnableSharding => "enable_sharding",
            StatementKind::CreateTable { .. } => "create_table",
            StatementKind::CreateKeyIndex { .. } => "create_key_index",
            StatementKind::CreateTimestampIndex { .. } => "create_timestamp_index",
            StatementKind::DistributeTable { .. } => "distribute_table",
            StatementKind::ProbeColumn { .. } => "probe_column",
            StatementKind::AddColumn { .. } => "add_column",
            StatementKind::Upsert { .. } => "upsert",
            StatementKind::SelectValue { .. } => "select_value",
            StatementKind::Scan { .. } => "scan",
            StatementKind::DeleteRow { .. } => "delete_row",
        }
    }
}

/// A parameterized SQL statement ready for execution.
#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Scan direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// Sort key for range scans. Ties within the chosen key are delivered in
/// undefined relative order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Key,
    CreatedAt,
}

/// Bounds, ordering and pagination for a range scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub(crate) start_key: Option<String>,
    pub(crate) stop_key: Option<String>,
    pub(crate) order_by: OrderBy,
    pub(crate) order: Order,
    pub(crate) limit: Option<usize>,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive lower bound on `key`.
    pub fn from_key(mut self, key: impl Into<String>) -> Self {
        self.start_key = Some(key.into());
        self
    }

    /// Inclusive upper bound on `key`.
    pub fn to_key(mut self, key: impl Into<String>) -> Self {
        self.stop_key = Some(key.into());
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// A scan over the whole keyspace is a usage error, checked before any
    /// engine call.
    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.start_key.is_none() && self.stop_key.is_none() {
            return Err(StoreError::EmptyScanBounds);
        }
        Ok(())
    }
}

/// Quotes an identifier for interpolation into SQL text.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_database(namespace: &str) -> Statement {
    Statement {
        kind: StatementKind::CreateDatabase { namespace: namespace.to_string() },
        sql: format!("CREATE DATABASE {}", quote_ident(namespace)),
        params: Vec::new(),
    }
}

pub fn enable_sharding() -> Statement {
    Statement {
        kind: StatementKind::EnableSharding,
        sql: "CREATE EXTENSION IF NOT EXISTS citus".to_string(),
        params: Vec::new(),
    }
}

pub fn create_table(table: &str) -> Statement {
    Statement {
        kind: StatementKind::CreateTable { table: table.to_string() },
        sql: format!(
            "CREATE TABLE IF NOT EXISTS {} (key TEXT NOT NULL, created_at TIMESTAMPTZ DEFAULT now(), PRIMARY KEY (key))",
            quote_ident(table)
        ),
        params: Vec::new(),
    }
}

pub fn create_key_index(table: &str) -> Statement {
    Statement {
        kind: StatementKind::CreateKeyIndex { table: table.to_string() },
        sql: format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING HASH (key)",
            quote_ident(&format!("{table}_key_hash_idx")),
            quote_ident(table)
        ),
        params: Vec::new(),
    }
}

pub fn create_timestamp_index(table: &str) -> Statement {
    Statement {
        kind: StatementKind::CreateTimestampIndex { table: table.to_string() },
        sql: format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (created_at)",
            quote_ident(&format!("{table}_created_at_idx")),
            quote_ident(table)
        ),
        params: Vec::new(),
    }
}

pub fn distribute_table(table: &str) -> Statement {
    Statement {
        kind: StatementKind::DistributeTable { table: table.to_string() },
        sql: "SELECT create_distributed_table($1::regclass, 'key')".to_string(),
        params: vec![Value::Text(table.to_string())],
    }
}

pub fn probe_column(table: &str, column: &str) -> Statement {
    Statement {
        kind: StatementKind::ProbeColumn { table: table.to_string(), column: column.to_string() },
        sql: format!("SELECT {} FROM {} LIMIT 1", quote_ident(column), quote_ident(table)),
        params: Vec::new(),
    }
}

pub fn add_column(table: &str, column: &str, column_type: ColumnType) -> Statement {
    Statement {
        kind: StatementKind::AddColumn {
            table: table.to_string(),
            column: column.to_string(),
            column_type,
        },
        sql: format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
            quote_ident(table),
            quote_ident(column),
            column_type.sql_name()
        ),
        params: Vec::new(),
    }
}

/// Insert-or-overwrite of a single attribute group. The value is bound twice,
/// once for the insert position and once for the conflict update, leaving
/// `created_at` and every other group untouched on conflict.
pub fn upsert(table: &str, column: &str, key: &str, value: Value) -> Statement {
    Statement {
        kind: StatementKind::Upsert { table: table.to_string(), column: column.to_string() },
        sql: format!(
            "INSERT INTO {table} (key, {column}) VALUES ($1, $2) ON CONFLICT (key) DO UPDATE SET {column} = $3",
            table = quote_ident(table),
            column = quote_ident(column),
        ),
        params: vec![Value::Text(key.to_string()), value.clone(), value],
    }
}

pub fn select_value(table: &str, column: &str, key: &str) -> Statement {
    Statement {
        kind: StatementKind::SelectValue { table: table.to_string(), column: column.to_string() },
        sql: format!(
            "SELECT {} FROM {} WHERE key = $1 LIMIT 1",
            quote_ident(column),
            quote_ident(table)
        ),
        params: vec![Value::Text(key.to_string())],
    }
}

/// Bounded range scan with dynamic WHERE, ORDER BY and LIMIT clauses.
/// Callers validate the options first; an unbounded scan never gets here.
pub fn scan(table: &str, column: &str, options: &ScanOptions) -> Statement {
    let mut sql = format!("SELECT key, {} FROM {}", quote_ident(column), quote_ident(table));
    let mut params: Vec<Value> = Vec::new();
    let mut clauses: Vec<String> = Vec::new();

    if let Some(start) = &options.start_key {
        params.push(Value::Text(start.clone()));
        clauses.push(format!("key >= ${}", params.len()));
    }
    if let Some(stop) = &options.stop_key {
        params.push(Value::Text(stop.clone()));
        clauses.push(format!("key <= ${}", params.len()));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let order_column = match options.order_by {
        OrderBy::Key => "key",
        OrderBy::CreatedAt => "created_at",
    };
    let direction = match options.order {
        Order::Ascending => "ASC",
        Order::Descending => "DESC",
    };
    sql.push_str(&format!(" ORDER BY {order_column} {direction}"));

    if let Some(limit) = options.limit {
        params.push(Value::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" LIMIT ${}", params.len()));
    }

    Statement {
        kind: StatementKind::Scan {
            table: table.to_string(),
            column: column.to_string(),
            has_start: options.start_key.is_some(),
            has_stop: options.stop_key.is_some(),
            by_created_at: options.order_by == OrderBy::CreatedAt,
            descending: options.order == Order::Descending,
            limit: options.limit,
        },
        sql,
        params,
    }
}

pub fn delete_row(table: &str, key: &str) -> Statement {
    Statement {
        kind: StatementKind::DeleteRow { table: table.to_string() },
        sql: format!("DELETE FROM {} WHERE key = $1", quote_ident(table)),
        params: vec![Value::Text(key.to_string())],
    }
}
