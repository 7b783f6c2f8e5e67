mod desc;
mod error;
mod tuple;
mod value;

pub use desc::{FieldType, TupleDesc};
pub use error::{TupleError, TupleResult};
pub use tuple::{RecordId, SlotId, Tuple};
pub use value::{DbType, DbValue};

/// Fixed on-disk width of a string field, in bytes. Shorter values are
/// zero-padded on the right; trailing zeros are trimmed on read.
pub const STRING_LENGTH: usize = 32;
