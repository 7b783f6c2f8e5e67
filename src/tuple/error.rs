use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TupleError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Field name is ambiguous: {0}")]
    AmbiguousName(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

pub type TupleResult<T> = Result<T, TupleError>;
