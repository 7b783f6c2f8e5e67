use std::cmp::Ordering;

use crate::storage::{StorageResult, TransactionId, TupleIter};
use crate::tuple::{DbValue, Tuple, TupleDesc};

use super::{Expr, Operator};

/// Blocking sort: drains the child, sorts by the key expressions in
/// order (each ascending or descending), then replays the sorted run
pub struct OrderBy {
    keys: Vec<(Expr, bool)>,
    child: Box<dyn Operator>,
}

impl OrderBy {
    /// Each key pairs an expression with an ascending flag
    pub fn new(keys: Vec<(Expr, bool)>, child: Box<dyn Operator>) -> Self {
        Self { keys, child }
    }
}

/// Ordering of two values of the same type; mixed types compare equal so
/// a bad key degrades to input order instead of panicking
fn compare_values(a: &DbValue, b: &DbValue) -> Ordering {
    match (a, b) {
        (DbValue::Int(x), DbValue::Int(y)) => x.cmp(y),
        (DbValue::String(x), DbValue::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

impl Operator for OrderBy {
    fn descriptor(&self) -> &TupleDesc {
        self.child.descriptor()
    }

    fn iter(&self, tid: TransactionId) -> StorageResult<TupleIter<'_>> {
        // Evaluate the keys once per tuple up front so the comparator
        // stays infallible
        let mut decorated: Vec<(Vec<DbValue>, Tuple)> = Vec::new();
        for tuple in self.child.iter(tid)? {
            let tuple = tuple?;
            let key_values = self
                .keys
                .iter()
                .map(|(expr, _)| expr.eval(&tuple))
                .collect::<StorageResult<Vec<_>>>()?;
            decorated.push((key_values, tuple));
        }

        decorated.sort_by(|(a, _), (b, _)| {
            for (i, (_, ascending)) in self.keys.iter().enumerate() {
                let ord = compare_values(&a[i], &b[i]);
                let ord = if *ascending { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        Ok(Box::new(decorated.into_iter().map(|(_, tuple)| Ok(tuple))))
    }
}
