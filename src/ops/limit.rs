use crate::storage::{StorageResult, TransactionId, TupleIter};
use crate::tuple::{DbValue, TupleDesc, TupleError};

use super::{Expr, Operator};

/// Passes through the first `n` tuples of its child, where `n` comes
/// from a constant integer expression
pub struct Limit {
    limit: Expr,
    child: Box<dyn Operator>,
}

impl Limit {
    pub fn new(limit: Expr, child: Box<dyn Operator>) -> Self {
        Self { limit, child }
    }
}

impl Operator for Limit {
    fn descriptor(&self) -> &TupleDesc {
        self.child.descriptor()
    }

    fn iter(&self, tid: TransactionId) -> StorageResult<TupleIter<'_>> {
        let n = match self.limit.eval_const()? {
            DbValue::Int(n) if n >= 0 => n as usize,
            other => {
                return Err(TupleError::TypeMismatch {
                    expected: "non-negative int".to_string(),
                    actual: format!("{:?}", other),
                }
                .into())
            }
        };
        Ok(Box::new(self.child.iter(tid)?.take(n)))
    }
}
