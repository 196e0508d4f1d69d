use chrono::{DateTime, NaiveDateTime, Utc};
use postgres::error::SqlState;
use postgres::types::{ToSql, Type};
use postgres::{Client, NoTls};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use crate::config::StoreConfig;
use crate::engine::{Connection, Engine, EngineError, EngineErrorKind, EngineRow};
use crate::query::Statement;
use crate::types::value::Value;

/// Administrative database used for namespace bootstrap.
const ADMIN_NAMESPACE: &str = "postgres";

/// Postgres-backed engine. Holds only connection parameters; each `connect`
/// call opens a fresh blocking client.
#[derive(Debug, Clone)]
pub struct PgEngine {
    config: StoreConfig,
}

impl PgEngine {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

impl Engine for PgEngine {
    fn connect_admin(&self) -> Result<Box<dyn Connection>, EngineError> {
        Ok(Box::new(PgConnection { client: open(&self.config, ADMIN_NAMESPACE)? }))
    }

    fn connect(&self) -> Result<Box<dyn Connection>, EngineError> {
        Ok(Box::new(PgConnection { client: open(&self.config, &self.config.namespace)? }))
    }
}

fn open(config: &StoreConfig, dbname: &str) -> Result<Client, EngineError> {
    let mut pg = postgres::Config::new();
    pg.host(&config.host)
        .port(config.port)
        .dbname(dbname)
        .user(&config.user)
        .password(&config.password);
    pg.connect(NoTls).map_err(map_error)
}

struct PgConnection {
    client: Client,
}

impl Connection for PgConnection {
    fn execute(&mut self, stmt: &Statement) -> Result<u64, EngineError> {
        if stmt.params.is_empty() {
            // Simple protocol: CREATE DATABASE and friends reject the
            // extended protocol's implicit prepared statement.
            self.client.batch_execute(&stmt.sql).map_err(map_error)?;
            Ok(0)
        } else {
            let params = bind_params(&stmt.params);
            self.client.execute(stmt.sql.as_str(), &params).map_err(map_error)
        }
    }

    fn query(&mut self, stmt: &Statement) -> Result<Vec<EngineRow>, EngineError> {
        let params = bind_params(&stmt.params);
        let rows = self.client.query(stmt.sql.as_str(), &params).map_err(map_error)?;
        rows.iter().map(decode_row).collect()
    }

    fn begin(&mut self) -> Result<(), EngineError> {
        self.client.batch_execute("BEGIN").map_err(map_error)
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        self.client.batch_execute("COMMIT").map_err(map_error)
    }

    fn rollback(&mut self) -> Result<(), EngineError> {
        self.client.batch_execute("ROLLBACK").map_err(map_error)
    }
}

fn bind_params(values: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    values
        .iter()
        .map(|value| match value {
            Value::Text(s) => s as &(dyn ToSql + Sync),
            Value::Json(j) => j as &(dyn ToSql + Sync),
            Value::Bool(b) => b as &(dyn ToSql + Sync),
            Value::Int(n) => n as &(dyn ToSql + Sync),
            Value::Decimal(d) => d as &(dyn ToSql + Sync),
            Value::Bytes(b) => b as &(dyn ToSql + Sync),
            Value::Timestamp(ts) => ts as &(dyn ToSql + Sync),
        })
        .collect()
}

fn decode_row(row: &postgres::Row) -> Result<EngineRow, EngineError> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        values.push(decode_column(row, idx, column.type_())?);
    }
    Ok(EngineRow(values))
}

/// Decodes one result column by its declared type. Only the types the store
/// itself creates are understood; anything else is a hard error rather than
/// a silent text fallback.
fn decode_column(row: &postgres::Row, idx: usize, ty: &Type) -> Result<Option<Value>, EngineError> {
    let decoded = if *ty == Type::TEXT || *ty == Type::VARCHAR {
        row.try_get::<_, Option<String>>(idx).map(|v| v.map(Value::Text))
    } else if *ty == Type::JSONB || *ty == Type::JSON {
        row.try_get::<_, Option<JsonValue>>(idx).map(|v| v.map(Value::Json))
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx).map(|v| v.map(Value::Bool))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).map(|v| v.map(Value::Int))
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<Decimal>>(idx).map(|v| v.map(Value::Decimal))
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx).map(|v| v.map(Value::Bytes))
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx).map(|v| v.map(Value::Timestamp))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)
            .map(|v| v.map(|ts| Value::Timestamp(ts.naive_utc())))
    } else {
        return Err(EngineError::other(format!("unsupported column type {ty}")));
    };
    decoded.map_err(map_error)
}

fn map_error(err: postgres::Error) -> EngineError {
    let kind = match err.code() {
        Some(code) if *code == SqlState::UNDEFINED_TABLE => EngineErrorKind::UndefinedTable,
        Some(code) if *code == SqlState::UNDEFINED_COLUMN => EngineErrorKind::UndefinedColumn,
        Some(code) if *code == SqlState::DUPLICATE_DATABASE => EngineErrorKind::DuplicateDatabase,
        Some(code) if *code == SqlState::IN_FAILED_SQL_TRANSACTION => EngineErrorKind::FailedTransaction,
        Some(_) => EngineErrorKind::Other,
        None => EngineErrorKind::Connection,
    };
    EngineError::new(kind, err.to_string())
}
