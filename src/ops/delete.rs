use std::sync::Arc;

use crate::storage::{DbFile, StorageResult, TransactionId, TupleIter};
use crate::tuple::{DbType, DbValue, FieldType, Tuple, TupleDesc};

use super::Operator;

/// Deletes every tuple of the child from a target table (via the record
/// ids the child's tuples carry) and yields a single `{count: Int}`
/// tuple with the number deleted
pub struct DeleteOp {
    file: Arc<dyn DbFile>,
    child: Box<dyn Operator>,
    out_desc: TupleDesc,
}

impl DeleteOp {
    pub fn new(file: Arc<dyn DbFile>, child: Box<dyn Operator>) -> Self {
        Self {
            file,
            child,
            out_desc: TupleDesc::new(vec![FieldType::new("count", DbType::Int)]),
        }
    }
}

impl Operator for DeleteOp {
    fn descriptor(&self) -> &TupleDesc {
        &self.out_desc
    }

    fn iter(&self, tid: TransactionId) -> StorageResult<TupleIter<'_>> {
        let mut count = 0i64;
        for tuple in self.child.iter(tid)? {
            let tuple = tuple?;
            self.file.delete_tuple(&tuple, tid)?;
            count += 1;
        }
        let result = Tuple::new(self.out_desc.clone(), vec![DbValue::Int(count)]);
        Ok(Box::new(std::iter::once(Ok(result))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::SeqScan;
    use crate::storage::{BufferPool, HeapFile};

    #[test]
    fn test_delete_drains_table() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(BufferPool::new(8));
        let desc = TupleDesc::new(vec![FieldType::new("id", DbType::Int)]);
        let file = HeapFile::new(dir.path().join("del.dat"), desc.clone(), Arc::clone(&pool))
            .unwrap();

        let tid = TransactionId::fresh();
        for i in 0..5 {
            let mut t = Tuple::new(desc.clone(), vec![DbValue::Int(i)]);
            file.insert_tuple(&mut t, tid).unwrap();
        }
        pool.commit_transaction(tid).unwrap();

        let delete = DeleteOp::new(
            Arc::clone(&file) as Arc<dyn DbFile>,
            Box::new(SeqScan::new(Arc::clone(&file) as Arc<dyn DbFile>)),
        );

        let tid2 = TransactionId::fresh();
        let counts: Vec<Tuple> = delete.iter(tid2).unwrap().map(|t| t.unwrap()).collect();
        pool.commit_transaction(tid2).unwrap();

        assert_eq!(counts[0].fields(), &[DbValue::Int(5)]);

        let tid3 = TransactionId::fresh();
        assert_eq!(file.iterator(tid3).unwrap().count(), 0);
    }
}
