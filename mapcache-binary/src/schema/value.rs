//! Values that can be read directly from a field

use super::field::{FieldContext, StringEncoding};
use crate::dependency::DependencyReader;
use crate::error::{BinaryError, Result};
use mapcache_core::ClassCode;

/// Broad shape of a field value, used to validate declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Text,
    Other,
}

/// A value read from the cursor at a field's offset
pub trait FieldValue: Sized + 'static {
    const KIND: ValueKind = ValueKind::Other;

    fn read_value(reader: &mut DependencyReader<'_>, context: FieldContext<'_>) -> Result<Self>;

    /// Integer view of the value, for role fields
    fn as_integer(&self) -> Option<i64> {
        None
    }
}

macro_rules! integer_value {
    ($($ty:ty => $read:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                const KIND: ValueKind = ValueKind::Integer;

                fn read_value(reader: &mut DependencyReader<'_>, _: FieldContext<'_>) -> Result<Self> {
                    reader.$read()
                }

                fn as_integer(&self) -> Option<i64> {
                    i64::try_from(*self).ok()
                }
            }
        )*
    };
}

integer_value!(
    u8 => read_u8,
    i8 => read_i8,
    u16 => read_u16,
    i16 => read_i16,
    u32 => read_u32,
    i32 => read_i32,
    u64 => read_u64,
    i64 => read_i64,
);

impl FieldValue for f32 {
    fn read_value(reader: &mut DependencyReader<'_>, _: FieldContext<'_>) -> Result<Self> {
        reader.read_f32()
    }
}

impl FieldValue for f64 {
    fn read_value(reader: &mut DependencyReader<'_>, _: FieldContext<'_>) -> Result<Self> {
        reader.read_f64()
    }
}

impl FieldValue for bool {
    fn read_value(reader: &mut DependencyReader<'_>, _: FieldContext<'_>) -> Result<Self> {
        reader.read_bool()
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn read_value(reader: &mut DependencyReader<'_>, context: FieldContext<'_>) -> Result<Self> {
        match context.encoding {
            Some(StringEncoding::LengthPrefixed) => reader.read_length_prefixed_string(),
            Some(StringEncoding::FixedLength {
                length,
                padding,
                trim,
            }) => reader.read_fixed_string(*length, *padding, *trim),
            Some(StringEncoding::NullTerminated {
                max_length: Some(max),
            }) => reader.read_cstring_max(*max),
            Some(StringEncoding::NullTerminated { max_length: None }) => reader.read_cstring(),
            None => Err(BinaryError::configuration(
                "String field read without an encoding",
            )),
        }
    }
}

/// Class codes are stored as an integer in the container's byte order, so
/// little-endian containers hold the characters reversed
impl FieldValue for ClassCode {
    fn read_value(reader: &mut DependencyReader<'_>, _: FieldContext<'_>) -> Result<Self> {
        Ok(ClassCode::from_u32(reader.read_u32()?))
    }
}
