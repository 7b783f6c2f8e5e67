use std::io;
use thiserror::Error;

use crate::tuple::TupleError;

use super::PageId;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Tuple error: {0}")]
    Tuple(#[from] TupleError),

    #[error("Page full: page_no={0}")]
    PageFull(PageId),

    #[error("Tuple not found: {0}")]
    TupleNotFound(String),

    #[error("Buffer pool is full of dirty pages")]
    BufferPoolFull,

    #[error("Transaction {0} deadlocked and was aborted")]
    Deadlock(u64),

    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Illegal operation: {0}")]
    IllegalOperation(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
