use super::error::{TupleError, TupleResult};
use super::value::DbType;

/// Name, optional table qualifier, and type of a tuple field. The
/// qualifier participates in field resolution only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldType {
    pub name: String,
    pub table_qualifier: String,
    pub db_type: DbType,
}

impl FieldType {
    /// Create an unqualified field
    pub fn new(name: impl Into<String>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            table_qualifier: String::new(),
            db_type,
        }
    }

    /// Create a field carrying a table qualifier
    pub fn qualified(
        name: impl Into<String>,
        table_qualifier: impl Into<String>,
        db_type: DbType,
    ) -> Self {
        Self {
            name: name.into(),
            table_qualifier: table_qualifier.into(),
            db_type,
        }
    }
}

/// Ordered schema of a tuple. Two descriptors are equal iff they have the
/// same length and componentwise equal fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleDesc {
    fields: Vec<FieldType>,
}

impl TupleDesc {
    pub fn new(fields: Vec<FieldType>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldType] {
        &self.fields
    }

    pub fn field(&self, idx: usize) -> Option<&FieldType> {
        self.fields.get(idx)
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Fixed serialized width of one tuple of this schema
    pub fn bytes_per_tuple(&self) -> usize {
        self.fields.iter().map(|f| f.db_type.size()).sum()
    }

    /// Concatenate the fields of `other` onto the fields of `self`
    pub fn merge(&self, other: &TupleDesc) -> TupleDesc {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        TupleDesc::new(fields)
    }

    /// Rewrite every field's table qualifier to `alias`
    pub fn set_table_alias(&mut self, alias: &str) {
        for field in &mut self.fields {
            field.table_qualifier = alias.to_string();
        }
    }

    /// Resolve `probe` against this descriptor by name. A qualified probe
    /// prefers a field with the same qualifier and falls back to the first
    /// name match; an unqualified probe matching more than one field is an
    /// ambiguity error.
    pub fn find_field(&self, probe: &FieldType) -> TupleResult<usize> {
        let mut best: Option<usize> = None;
        for (i, field) in self.fields.iter().enumerate() {
            if field.name != probe.name {
                continue;
            }
            if probe.table_qualifier.is_empty() {
                if best.is_some() {
                    return Err(TupleError::AmbiguousName(probe.name.clone()));
                }
                best = Some(i);
            } else {
                if field.table_qualifier == probe.table_qualifier {
                    return Ok(i);
                }
                if best.is_none() {
                    best = Some(i);
                }
            }
        }
        best.ok_or_else(|| {
            TupleError::FieldNotFound(if probe.table_qualifier.is_empty() {
                probe.name.clone()
            } else {
                format!("{}.{}", probe.table_qualifier, probe.name)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_field_desc() -> TupleDesc {
        TupleDesc::new(vec![
            FieldType::new("name", DbType::String),
            FieldType::new("age", DbType::Int),
        ])
    }

    #[test]
    fn test_equality() {
        assert_eq!(two_field_desc(), two_field_desc());

        let shorter = TupleDesc::new(vec![FieldType::new("name", DbType::String)]);
        assert_ne!(two_field_desc(), shorter);

        let mut aliased = two_field_desc();
        aliased.set_table_alias("t");
        assert_ne!(two_field_desc(), aliased);
    }

    #[test]
    fn test_bytes_per_tuple() {
        assert_eq!(two_field_desc().bytes_per_tuple(), crate::tuple::STRING_LENGTH + 8);
    }

    #[test]
    fn test_merge() {
        let merged = two_field_desc().merge(&TupleDesc::new(vec![FieldType::new(
            "score",
            DbType::Int,
        )]));
        assert_eq!(merged.num_fields(), 3);
        assert_eq!(merged.field(2).unwrap().name, "score");
        assert_eq!(merged.field(0).unwrap().name, "name");
    }

    #[test]
    fn test_set_table_alias() {
        let mut desc = two_field_desc();
        desc.set_table_alias("emp");
        assert!(desc.fields().iter().all(|f| f.table_qualifier == "emp"));
    }

    #[test]
    fn test_find_field_by_name() {
        let desc = two_field_desc();
        assert_eq!(desc.find_field(&FieldType::new("age", DbType::Int)).unwrap(), 1);
    }

    #[test]
    fn test_find_field_missing() {
        let desc = two_field_desc();
        let err = desc.find_field(&FieldType::new("salary", DbType::Int));
        assert!(matches!(err, Err(TupleError::FieldNotFound(_))));
    }

    #[test]
    fn test_find_field_ambiguous() {
        let mut left = two_field_desc();
        left.set_table_alias("t1");
        let mut right = two_field_desc();
        right.set_table_alias("t2");
        let joined = left.merge(&right);

        let err = joined.find_field(&FieldType::new("age", DbType::Int));
        assert!(matches!(err, Err(TupleError::AmbiguousName(_))));
    }

    #[test]
    fn test_find_field_qualified() {
        let mut left = two_field_desc();
        left.set_table_alias("t1");
        let mut right = two_field_desc();
        right.set_table_alias("t2");
        let joined = left.merge(&right);

        let idx = joined
            .find_field(&FieldType::qualified("age", "t2", DbType::Int))
            .unwrap();
        assert_eq!(idx, 3);
    }
}
