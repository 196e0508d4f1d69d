//! Boundary to the transactional relational engine.
//!
//! The store talks to the engine through [`Engine`] (a connection factory)
//! and [`Connection`] (one session, at most one open transaction). The
//! production backend is [`pg::PgEngine`]; [`mem::MemEngine`] implements the
//! same contract in memory for tests and embedded use.

pub mod mem;
pub mod pg;

use thiserror::Error;

use crate::query::Statement;
use crate::types::value::Value;

/// Failure classes the store cares about. Everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Query named a table that does not exist.
    UndefinedTable,
    /// Query named a column that does not exist.
    UndefinedColumn,
    /// CREATE DATABASE against an existing namespace.
    DuplicateDatabase,
    /// Statement issued inside an already-aborted transaction.
    FailedTransaction,
    /// Connectivity or protocol failure, no server-side error code.
    Connection,
    /// Any other engine-reported failure (constraint, type mismatch, ...).
    Other,
}

/// An error reported by the engine, classified for local handling.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Other, message)
    }
}

/// One result row; one entry per selected column, `None` for SQL NULL.
#[derive(Debug, Clone)]
pub struct EngineRow(pub Vec<Option<Value>>);

/// An open session against the engine.
///
/// Transaction scoping mirrors the wire protocol: `begin`/`commit`/`rollback`
/// bracket statements executed through the same connection. Dropping the
/// connection closes it.
pub trait Connection {
    fn execute(&mut self, stmt: &Statement) -> Result<u64, EngineError>;
    fn query(&mut self, stmt: &Statement) -> Result<Vec<EngineRow>, EngineError>;
    fn begin(&mut self) -> Result<(), EngineError>;
    fn commit(&mut self) -> Result<(), EngineError>;
    fn rollback(&mut self) -> Result<(), EngineError>;
}

/// Connection factory. `connect_admin` opens a session against the
/// administrative namespace used for bootstrap; `connect` opens a working
/// session against the store's namespace.
pub trait Engine {
    fn connect_admin(&self) -> Result<Box<dyn Connection>, EngineError>;
    fn connect(&self) -> Result<Box<dyn Connection>, EngineError>;
}
