use crate::storage::StorageResult;
use crate::tuple::{DbValue, FieldType, Tuple, TupleError};

/// The expression forms the planner hands to operators: a reference to a
/// named field, or a literal
#[derive(Debug, Clone)]
pub enum Expr {
    Field(FieldType),
    Const(DbValue),
}

impl Expr {
    /// The field type of the expression result. Constants report an
    /// empty name; projections rename their outputs anyway.
    pub fn out_type(&self) -> FieldType {
        match self {
            Expr::Field(field) => field.clone(),
            Expr::Const(value) => FieldType::new("", value.db_type()),
        }
    }

    /// Evaluate against a tuple. Field references resolve by name (and
    /// qualifier, when present) against the tuple's descriptor.
    pub fn eval(&self, tuple: &Tuple) -> StorageResult<DbValue> {
        match self {
            Expr::Field(field) => {
                let idx = tuple.desc().find_field(field)?;
                Ok(tuple.fields()[idx].clone())
            }
            Expr::Const(value) => Ok(value.clone()),
        }
    }

    /// Evaluate with no input tuple; only constants qualify
    pub fn eval_const(&self) -> StorageResult<DbValue> {
        match self {
            Expr::Field(field) => Err(TupleError::FieldNotFound(format!(
                "field {} cannot be evaluated without a tuple",
                field.name
            ))
            .into()),
            Expr::Const(value) => Ok(value.clone()),
        }
    }
}
