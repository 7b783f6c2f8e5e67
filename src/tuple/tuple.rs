use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::desc::{FieldType, TupleDesc};
use super::error::{TupleError, TupleResult};
use super::value::DbValue;

/// Index of a tuple slot within a page
pub type SlotId = usize;

/// Physical location of a stored tuple (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_no: usize,
    pub slot: SlotId,
}

/// A fixed-width record: its schema, its field values, and, when it was
/// read from storage, the physical location it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tuple {
    desc: TupleDesc,
    fields: Vec<DbValue>,
    rid: Option<RecordId>,
}

impl Tuple {
    /// Create a synthesized tuple (no physical location). The number of
    /// values must match the descriptor.
    pub fn new(desc: TupleDesc, fields: Vec<DbValue>) -> Self {
        debug_assert_eq!(desc.num_fields(), fields.len());
        Self {
            desc,
            fields,
            rid: None,
        }
    }

    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn fields(&self) -> &[DbValue] {
        &self.fields
    }

    pub fn field(&self, idx: usize) -> Option<&DbValue> {
        self.fields.get(idx)
    }

    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    /// Append the wire form of this tuple to `out`: fields in schema
    /// order, each in its fixed width.
    pub fn write_to(&self, out: &mut Vec<u8>) -> TupleResult<()> {
        for (value, field) in self.fields.iter().zip(self.desc.fields()) {
            if value.db_type() != field.db_type {
                return Err(TupleError::TypeMismatch {
                    expected: format!("{:?}", field.db_type),
                    actual: format!("{:?}", value.db_type()),
                });
            }
            value.write_to(out)?;
        }
        Ok(())
    }

    /// Decode one tuple of schema `desc` from `data`, which must be exactly
    /// `desc.bytes_per_tuple()` long.
    pub fn read_from(data: &[u8], desc: &TupleDesc) -> TupleResult<Tuple> {
        if data.len() != desc.bytes_per_tuple() {
            return Err(TupleError::Deserialization(format!(
                "Expected {} bytes for tuple, got {}",
                desc.bytes_per_tuple(),
                data.len()
            )));
        }

        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for field in desc.fields() {
            let width = field.db_type.size();
            fields.push(DbValue::read_from(&data[offset..offset + width], field.db_type)?);
            offset += width;
        }
        Ok(Tuple::new(desc.clone(), fields))
    }

    /// Stable structural hash usable as a map key
    pub fn key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Build a new tuple holding the named fields, resolved against this
    /// tuple's descriptor in the order given.
    pub fn project(&self, fields: &[FieldType]) -> TupleResult<Tuple> {
        let mut out_fields = Vec::with_capacity(fields.len());
        for probe in fields {
            let idx = self.desc.find_field(probe)?;
            out_fields.push(self.fields[idx].clone());
        }
        Ok(Tuple::new(TupleDesc::new(fields.to_vec()), out_fields))
    }

    /// Concatenate `other` onto this tuple, merging the descriptors
    pub fn join(&self, other: &Tuple) -> Tuple {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        Tuple::new(self.desc.merge(&other.desc), fields)
    }
}
