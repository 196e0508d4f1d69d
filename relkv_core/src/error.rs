use thiserror::Error;

use crate::engine::EngineError;

/// Failures surfaced by the store facade.
///
/// Usage errors are raised before any engine call and leave all state
/// untouched. Engine errors pass through the recovery envelope first: by the
/// time the caller sees one, the transaction it happened in is gone and the
/// store is on a fresh connection.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A store cannot be opened without a target namespace.
    #[error("a namespace is required to open a store")]
    MissingNamespace,

    /// A value shape with no corresponding column type.
    #[error("unsupported value shape: {0}")]
    UnsupportedValue(String),

    /// Range scans need at least one bound.
    #[error("scan requires at least one of start_key or stop_key")]
    EmptyScanBounds,

    /// Commit or rollback without an open transaction.
    #[error("no transaction is active")]
    NoActiveTransaction,

    /// Anything the engine reported and the store did not recover locally.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
