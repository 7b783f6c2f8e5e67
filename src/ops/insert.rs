use std::sync::Arc;

use crate::storage::{DbFile, StorageResult, TransactionId, TupleIter};
use crate::tuple::{DbType, DbValue, FieldType, Tuple, TupleDesc};

use super::Operator;

/// Inserts every tuple of the child into a target table and yields a
/// single `{count: Int}` tuple with the number inserted
pub struct InsertOp {
    file: Arc<dyn DbFile>,
    child: Box<dyn Operator>,
    out_desc: TupleDesc,
}

impl InsertOp {
    pub fn new(file: Arc<dyn DbFile>, child: Box<dyn Operator>) -> Self {
        Self {
            file,
            child,
            out_desc: TupleDesc::new(vec![FieldType::new("count", DbType::Int)]),
        }
    }
}

impl Operator for InsertOp {
    fn descriptor(&self) -> &TupleDesc {
        &self.out_desc
    }

    fn iter(&self, tid: TransactionId) -> StorageResult<TupleIter<'_>> {
        let mut count = 0i64;
        for tuple in self.child.iter(tid)? {
            let mut tuple = tuple?;
            self.file.insert_tuple(&mut tuple, tid)?;
            count += 1;
        }
        let result = Tuple::new(self.out_desc.clone(), vec![DbValue::Int(count)]);
        Ok(Box::new(std::iter::once(Ok(result))))
    }
}
