use std::sync::Arc;

use crate::storage::{DbFile, StorageResult, TransactionId, TupleIter};
use crate::tuple::TupleDesc;

use super::Operator;

/// Leaf operator: a sequential scan over a stored table
pub struct SeqScan {
    file: Arc<dyn DbFile>,
}

impl SeqScan {
    pub fn new(file: Arc<dyn DbFile>) -> Self {
        Self { file }
    }
}

impl Operator for SeqScan {
    fn descriptor(&self) -> &TupleDesc {
        self.file.descriptor()
    }

    fn iter(&self, tid: TransactionId) -> StorageResult<TupleIter<'_>> {
        self.file.iterator(tid)
    }
}
