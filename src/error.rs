//! Error types for plan parsing and predicate evaluation.

use thiserror::Error;

use crate::value::DataType;

/// Errors that can occur while parsing a wire plan or evaluating a predicate.
///
/// Every variant is terminal for the query it arose from: the caller gets the
/// error, no partial result is produced, and no segment state is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// A wire literal carried no active value.
    #[error("malformed generic value: no value set")]
    MalformedValue,

    /// The wire expression union had no (or an unknown) variant set.
    #[error("unsupported expression node: {0}")]
    UnsupportedNode(String),

    /// An operand's type violates a node's static contract.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An operator enum carried its explicit "unset/invalid" sentinel.
    #[error("invalid operator for {node} node")]
    InvalidOperator { node: &'static str },

    /// A referenced field id is not part of the schema.
    #[error("unknown field id {field_id}")]
    UnknownField { field_id: i64 },

    /// The wire-declared type of a column disagrees with the schema.
    #[error("schema mismatch for field id {field_id}: declared {declared:?}, schema has {actual:?}")]
    SchemaMismatch {
        field_id: i64,
        declared: DataType,
        actual: DataType,
    },

    /// A node's type falls outside the supported scalar kinds.
    #[error("unsupported data type {0:?}")]
    UnsupportedDataType(DataType),

    /// Internal invariant violation: a node or chunk did not have the shape
    /// the dispatcher expected. Indicates a parser bug, not bad user input.
    #[error("dispatch mismatch: {0}")]
    DispatchMismatch(String),

    /// Runtime evaluation failure (e.g. division by zero).
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// The wire plan bytes could not be decoded.
    #[error("wire decode error: {0}")]
    WireDecode(String),
}

/// Result type for plan operations.
pub type PlanResult<T> = Result<T, PlanError>;
