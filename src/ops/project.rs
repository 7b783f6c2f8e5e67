use crate::storage::{StorageError, StorageResult, TransactionId, TupleIter};
use crate::tuple::{Tuple, TupleDesc};

use super::{Expr, Operator};

/// Evaluates a list of expressions per input tuple and emits the results
/// under caller-chosen output names
pub struct Project {
    select: Vec<Expr>,
    out_desc: TupleDesc,
    child: Box<dyn Operator>,
}

impl Project {
    /// `select` and `output_names` pair up positionally and must have
    /// the same length
    pub fn new(
        select: Vec<Expr>,
        output_names: Vec<String>,
        child: Box<dyn Operator>,
    ) -> StorageResult<Self> {
        if select.len() != output_names.len() {
            return Err(StorageError::IllegalOperation(format!(
                "{} select expressions but {} output names",
                select.len(),
                output_names.len()
            )));
        }

        let fields = select
            .iter()
            .zip(&output_names)
            .map(|(expr, name)| {
                let mut field = expr.out_type();
                field.name = name.clone();
                field
            })
            .collect();
        Ok(Self {
            select,
            out_desc: TupleDesc::new(fields),
            child,
        })
    }
}

impl Operator for Project {
    fn descriptor(&self) -> &TupleDesc {
        &self.out_desc
    }

    fn iter(&self, tid: TransactionId) -> StorageResult<TupleIter<'_>> {
        let child = self.child.iter(tid)?;
        Ok(Box::new(child.map(move |tuple| {
            let tuple = tuple?;
            let fields = self
                .select
                .iter()
                .map(|expr| expr.eval(&tuple))
                .collect::<StorageResult<Vec<_>>>()?;
            Ok(Tuple::new(self.out_desc.clone(), fields))
        })))
    }
}
