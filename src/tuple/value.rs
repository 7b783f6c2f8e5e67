use super::error::{TupleError, TupleResult};
use super::STRING_LENGTH;

/// Type of a tuple field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Int,    // 8 bytes, signed
    String, // STRING_LENGTH bytes, fixed width
}

impl DbType {
    /// Get the on-disk size in bytes for this type
    pub fn size(&self) -> usize {
        match self {
            DbType::Int => 8,
            DbType::String => STRING_LENGTH,
        }
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DbValue {
    Int(i64),
    String(String),
}

impl DbValue {
    /// Get the type of this value
    pub fn db_type(&self) -> DbType {
        match self {
            DbValue::Int(_) => DbType::Int,
            DbValue::String(_) => DbType::String,
        }
    }

    /// Append the wire form of this value to `out`: 8 bytes little-endian
    /// for Int, exactly STRING_LENGTH zero-padded bytes for String
    pub fn write_to(&self, out: &mut Vec<u8>) -> TupleResult<()> {
        match self {
            DbValue::Int(i) => {
                out.extend_from_slice(&i.to_le_bytes());
            }
            DbValue::String(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > STRING_LENGTH {
                    return Err(TupleError::Serialization(format!(
                        "String length {} exceeds fixed width {}",
                        bytes.len(),
                        STRING_LENGTH
                    )));
                }
                out.extend_from_slice(bytes);
                out.resize(out.len() + (STRING_LENGTH - bytes.len()), 0);
            }
        }
        Ok(())
    }

    /// Decode a value of type `db_type` from `bytes`, which must be exactly
    /// `db_type.size()` long. Trailing zero bytes of a string are trimmed.
    pub fn read_from(bytes: &[u8], db_type: DbType) -> TupleResult<Self> {
        if bytes.len() != db_type.size() {
            return Err(TupleError::Deserialization(format!(
                "Expected {} bytes for {:?}, got {}",
                db_type.size(),
                db_type,
                bytes.len()
            )));
        }

        match db_type {
            DbType::Int => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Ok(DbValue::Int(i64::from_le_bytes(buf)))
            }
            DbType::String => {
                let end = bytes
                    .iter()
                    .rposition(|&b| b != 0)
                    .map_or(0, |last| last + 1);
                let s = String::from_utf8(bytes[..end].to_vec())
                    .map_err(|e| TupleError::Deserialization(format!("Invalid UTF-8: {}", e)))?;
                Ok(DbValue::String(s))
            }
        }
    }
}
