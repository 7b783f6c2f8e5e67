//! heapdb: a teaching-grade relational storage engine.
//!
//! Tables are heap files of fixed-width slotted pages; all transactional
//! page access flows through a bounded [`storage::BufferPool`] that
//! enforces NO-STEAL/FORCE semantics with page-level shared/exclusive
//! locking and wait-for-graph deadlock detection. A
//! [`storage::ColumnFile`] layers a columnar table over the same
//! primitives, and [`ops`] provides the operator pipeline an upstream
//! planner composes into query plans.

pub mod ops;
pub mod storage;
pub mod tuple;

pub use storage::{
    BufferPool, ColumnFile, DbFile, HeapFile, HeapPage, Permission, StorageError, StorageResult,
    TransactionId, PAGE_SIZE,
};
pub use tuple::{DbType, DbValue, FieldType, RecordId, Tuple, TupleDesc, STRING_LENGTH};
