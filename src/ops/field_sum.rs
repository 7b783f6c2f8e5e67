use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::storage::{BufferPool, HeapFile, StorageResult, TransactionId};
use crate::tuple::{DbValue, FieldType, TupleDesc, TupleError};

use super::{Expr, Operator, SeqScan};

/// Demo query: load `csv_path` into a fresh heap file at `table_path`
/// and return the sum of the named integer field over all rows. Any
/// stale table file at `table_path` is replaced.
pub fn compute_field_sum(
    csv_path: impl AsRef<Path>,
    table_path: impl AsRef<Path>,
    desc: TupleDesc,
    sum_field: &str,
) -> StorageResult<i64> {
    let table_path = table_path.as_ref();
    if table_path.exists() {
        std::fs::remove_file(table_path)?;
    }

    let field_idx = desc.find_field(&FieldType::new(sum_field, crate::tuple::DbType::Int))?;
    let field = desc.fields()[field_idx].clone();

    let pool = Arc::new(BufferPool::new(3));
    let file = HeapFile::new(table_path, desc, Arc::clone(&pool))?;
    file.load_from_csv(File::open(csv_path)?, true)?;

    let tid = TransactionId::fresh();
    pool.begin_transaction(tid)?;

    let scan = SeqScan::new(file);
    let sum_expr = Expr::Field(field);
    let mut sum = 0i64;
    for tuple in scan.iter(tid)? {
        match sum_expr.eval(&tuple?)? {
            DbValue::Int(v) => sum += v,
            other => {
                return Err(TupleError::TypeMismatch {
                    expected: "int".to_string(),
                    actual: format!("{:?}", other),
                }
                .into())
            }
        }
    }

    pool.commit_transaction(tid)?;
    Ok(sum)
}
