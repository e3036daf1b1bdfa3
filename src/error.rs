#![allow(missing_docs)]

use thiserror::Error;

/// Boundary failures while classifying an input-contract tree.
#[derive(Debug, Error)]
pub enum CriteriaError {
    #[error("criteria payload is not valid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized condition: {0}")]
    UnrecognizedCondition(String),
}

impl CriteriaError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            CriteriaError::Json(_) => "Json",
            CriteriaError::UnrecognizedCondition(_) => "UnrecognizedCondition",
        }
    }
}

/// Failures reported by a value-mapping store. These never leave the
/// resolver; they only trigger fallback to rules and pass-through.
#[derive(Debug, Error)]
pub enum MappingStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("mapping store unavailable: {0}")]
    Unavailable(String),
}

/// Errors emitted while compiling a storage tree into SQL.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Column is not in the field schema catalog; identifiers are never
    /// taken from input verbatim.
    #[error("unknown column '{dataset}.{column}'")]
    UnknownColumn { dataset: String, column: String },
    /// Operator is registered but has no SQL rendering for this type.
    #[error("operator '{operator}' is not supported for {field_type} columns")]
    UnsupportedOperator { operator: String, field_type: String },
    /// Value cannot be bound with the column's type.
    #[error("value '{value}' is not valid for column '{column}'")]
    InvalidValue { column: String, value: String },
}

impl CompileError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnknownColumn { .. } => "UnknownColumn",
            CompileError::UnsupportedOperator { .. } => "UnsupportedOperator",
            CompileError::InvalidValue { .. } => "InvalidValue",
        }
    }
}

/// Technical failure of an external criteria generator. Declining to
/// answer is not an error; see `GeneratorReply::Rejected`.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("criteria generator unavailable: {0}")]
    Unavailable(String),
    #[error("criteria generator reply is malformed: {0}")]
    MalformedReply(#[from] serde_json::Error),
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;
