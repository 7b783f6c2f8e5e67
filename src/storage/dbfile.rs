use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tuple::{Tuple, TupleDesc};

use super::buffer_pool::PageKey;
use super::error::StorageResult;
use super::heap_page::HeapPage;
use super::PageId;

static NEXT_TID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a transaction. The buffer pool first observes a
/// transaction at its first page request and forgets it at commit or
/// abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Mint a process-unique transaction id
    pub fn fresh() -> Self {
        TransactionId(NEXT_TID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tid#{}", self.0)
    }
}

/// Access mode requested when acquiring a page through the buffer pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// Lazy stream of tuples produced by a table scan
pub type TupleIter<'a> = Box<dyn Iterator<Item = StorageResult<Tuple>> + 'a>;

/// The contract consumed by the operator pipeline. Implemented by
/// [`super::HeapFile`] (which also backs the page-level operations) and
/// [`super::ColumnFile`] (which is not page-addressable itself and
/// rejects the page operations).
pub trait DbFile: Send + Sync {
    /// The schema of the stored tuples
    fn descriptor(&self) -> &TupleDesc;

    /// Store `t`, setting its record id
    fn insert_tuple(&self, t: &mut Tuple, tid: TransactionId) -> StorageResult<()>;

    /// Remove the stored tuple `t` points at via its record id
    fn delete_tuple(&self, t: &Tuple, tid: TransactionId) -> StorageResult<()>;

    /// Read the page at `page_no` from the backing file
    fn read_page(&self, page_no: PageId) -> StorageResult<HeapPage>;

    /// Write `page` back to the backing file at its offset
    fn flush_page(&self, page: &HeapPage) -> StorageResult<()>;

    /// Key identifying the page at `page_no` in the buffer pool
    fn page_key(&self, page_no: PageId) -> StorageResult<PageKey>;

    /// Scan all stored tuples under `tid`; yielded tuples carry their
    /// record ids
    fn iterator(&self, tid: TransactionId) -> StorageResult<TupleIter<'_>>;
}
