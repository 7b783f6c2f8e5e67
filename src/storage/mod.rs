mod buffer_pool;
mod column_file;
mod dbfile;
mod error;
mod heap_file;
mod heap_page;

pub use buffer_pool::{BufferPool, PageKey, DEFAULT_BACKOFF};
pub use column_file::{ColumnFile, ColumnScan};
pub use dbfile::{DbFile, Permission, TransactionId, TupleIter};
pub use error::{StorageError, StorageResult};
pub use heap_file::{HeapFile, HeapFileScan};
pub use heap_page::HeapPage;

/// Page size in bytes (4KB): the unit of disk IO and of locking
pub const PAGE_SIZE: usize = 4096;

/// Bytes of page header preceding the tuple slots
pub const PAGE_HEADER_SIZE: usize = 8;

/// Page number within a backing file
pub type PageId = usize;
