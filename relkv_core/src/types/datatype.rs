use crate::types::value::Value;

/// Column type assigned to an attribute group when it is first written.
/// Fixed for the lifetime of the column; later writes must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Jsonb,
    Boolean,
    BigInt,
    Decimal,
    Bytea,
    Timestamp,
}

impl ColumnType {
    /// Infers the column type from a sample value. Total over `Value`, so a
    /// value can never arrive at the engine with an unmappable shape.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Text(_) => ColumnType::Text,
            Value::Json(_) => ColumnType::Jsonb,
            Value::Bool(_) => ColumnType::Boolean,
            Value::Int(_) => ColumnType::BigInt,
            Value::Decimal(_) => ColumnType::Decimal,
            Value::Bytes(_) => ColumnType::Bytea,
            Value::Timestamp(_) => ColumnType::Timestamp,
        }
    }

    /// SQL spelling used in ADD COLUMN statements.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Jsonb => "JSONB",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Bytea => "BYTEA",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}
