//! Schema-driven record reading
//!
//! Reads a [`Structure`] at the cursor following its cached [`TypeSchema`].
//! Fields are visited in ascending offset order for the resolved version;
//! afterwards the cursor is left at the record's end, which is the
//! data-length field if one was read, else the declared fixed size, else
//! the furthest byte any field consumed.

use crate::dependency::DependencyReader;
use crate::error::{BinaryError, Result};
use crate::schema::{schema_of, FieldRole, Structure, TypeSchema};

impl DependencyReader<'_> {
    /// Read a `T` at the cursor.
    ///
    /// The instance is built through the resolver and then populated from
    /// its fields, or produced by the type's manual routine.
    pub fn read_object<T: Structure>(&mut self, version: Option<i32>) -> Result<T> {
        let schema = schema_of::<T>()?;
        let base = self.position();

        if let Some(routine) = schema.manual_routine() {
            let value = routine(self, version)?;
            if let Some(size) = schema.fixed_size(version) {
                self.seek(base + size)?;
            }
            return Ok(value);
        }

        let mut value = self.resolve::<T>()?;
        self.seek(base)?;
        read_fields(self, schema, &mut value, version)?;
        Ok(value)
    }

    /// Populate an existing `T` from the record at the cursor
    pub fn read_object_into<T: Structure>(
        &mut self,
        target: &mut T,
        version: Option<i32>,
    ) -> Result<()> {
        let schema = schema_of::<T>()?;
        if schema.manual_routine().is_some() {
            return Err(BinaryError::invalid_operation(format!(
                "{} is read by a manual routine and cannot be read into",
                schema.name()
            )));
        }
        read_fields(self, schema, target, version)
    }
}

fn read_fields<T>(
    reader: &mut DependencyReader<'_>,
    schema: &TypeSchema<T>,
    target: &mut T,
    mut version: Option<i32>,
) -> Result<()> {
    let base = reader.position();

    if version.is_none() {
        if let Some(field) = schema.version_field() {
            if let Some(offset) = field.offset_for(None) {
                reader.seek(base + offset)?;
                version = field
                    .read_into(target, reader, None)?
                    .and_then(|value| i32::try_from(value).ok());
            }
        }
    }

    let mut plan = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        if !field.applies_to(version) {
            continue;
        }
        match (field.offset_for(version), version) {
            (Some(offset), _) => plan.push((offset, field)),
            (None, None) => continue,
            (None, Some(version)) => {
                return Err(BinaryError::NoApplicableOffset {
                    record: schema.name(),
                    field: field.name(),
                    version,
                });
            }
        }
    }
    plan.sort_by_key(|(offset, _)| *offset);

    let mut end = 0u64;
    let mut data_length = None;
    for (offset, field) in plan {
        reader.seek(base + offset)?;
        let integer = field.read_into(target, reader, version)?;
        if field.role() == FieldRole::DataLength {
            data_length = integer;
        }
        end = end.max(reader.position() - base);
    }

    let end = match data_length {
        Some(length) if length <= 0 => {
            return Err(BinaryError::invalid_data(format!(
                "{}: non-positive data length {}",
                schema.name(),
                length
            )));
        }
        Some(length) => length as u64,
        None => schema.fixed_size(version).unwrap_or(end),
    };
    reader.seek(base + end)
}

#[cfg(test)]
mod tests {
    use crate::dependency::{Constructible, Constructor, DependencyReader, DependencyRegistry};
    use crate::error::{BinaryError, Result};
    use crate::reader::{BinaryReader, ByteOrder};
    use crate::schema::{FieldDescriptor, StringEncoding, Structure, TypeSchema, VersionRange};
    use std::sync::Arc;

    fn reader(data: &[u8]) -> DependencyReader<'_> {
        DependencyReader::new(
            BinaryReader::new(data, ByteOrder::Big),
            Arc::new(DependencyRegistry::new()),
        )
    }

    #[derive(Debug, Default, PartialEq)]
    struct Span {
        first: u16,
        second: u32,
    }

    impl Constructible for Span {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::default_value()]
        }
    }

    impl Structure for Span {
        fn build_schema() -> Result<TypeSchema<Self>> {
            TypeSchema::builder("Span")
                .field(FieldDescriptor::new("second", |s: &mut Self, v: u32| s.second = v).at(6))
                .field(FieldDescriptor::new("first", |s: &mut Self, v: u16| s.first = v).at(0))
                .build()
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Sized16 {
        value: u8,
    }

    impl Constructible for Sized16 {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::default_value()]
        }
    }

    impl Structure for Sized16 {
        fn build_schema() -> Result<TypeSchema<Self>> {
            TypeSchema::builder("Sized16")
                .field(FieldDescriptor::new("value", |s: &mut Self, v: u8| s.value = v).at(2))
                .fixed_size(16)
                .build()
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Versioned {
        version: i16,
        common: i16,
        old: i32,
        new: i32,
        mixed: u8,
    }

    impl Constructible for Versioned {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::default_value()]
        }
    }

    impl Structure for Versioned {
        fn build_schema() -> Result<TypeSchema<Self>> {
            TypeSchema::builder("Versioned")
                .field(
                    FieldDescriptor::new("version", |s: &mut Self, v: i16| s.version = v)
                        .at(0)
                        .version_number(),
                )
                .field(FieldDescriptor::new("common", |s: &mut Self, v: i16| s.common = v).at(2))
                .field(
                    FieldDescriptor::new("old", |s: &mut Self, v: i32| s.old = v)
                        .at(4)
                        .max_version(2),
                )
                .field(
                    FieldDescriptor::new("new", |s: &mut Self, v: i32| s.new = v)
                        .at(8)
                        .min_version(2),
                )
                .field(
                    FieldDescriptor::new("mixed", |s: &mut Self, v: u8| s.mixed = v)
                        .at_versions(VersionRange::until(2), 12)
                        .at_versions(VersionRange::between(2, 5), 13),
                )
                .build()
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Labelled {
        length: i32,
        label: String,
        tail: u16,
    }

    impl Constructible for Labelled {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::default_value()]
        }
    }

    impl Structure for Labelled {
        fn build_schema() -> Result<TypeSchema<Self>> {
            TypeSchema::builder("Labelled")
                .field(
                    FieldDescriptor::new("length", |s: &mut Self, v: i32| s.length = v)
                        .at(0)
                        .data_length(),
                )
                .field(
                    FieldDescriptor::new("label", |s: &mut Self, v: String| s.label = v)
                        .at(4)
                        .encoding(StringEncoding::LengthPrefixed)
                        .byte_order(ByteOrder::Little),
                )
                .field(FieldDescriptor::new("tail", |s: &mut Self, v: u16| s.tail = v).at(10))
                .fixed_size(4)
                .build()
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Outer {
        id: u8,
        inner: Sized16,
        after: u8,
    }

    impl Constructible for Outer {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::default_value()]
        }
    }

    impl Structure for Outer {
        fn build_schema() -> Result<TypeSchema<Self>> {
            TypeSchema::builder("Outer")
                .field(FieldDescriptor::new("id", |s: &mut Self, v: u8| s.id = v).at(0))
                .field(FieldDescriptor::object("inner", |s: &mut Self, v: Sized16| s.inner = v).at(1))
                .field(FieldDescriptor::new("after", |s: &mut Self, v: u8| s.after = v).at(17))
                .build()
        }
    }

    #[test]
    fn test_cursor_ends_after_widest_field() {
        let data = [0, 7, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 9, 0xEE];
        let mut reader = reader(&data);
        let span: Span = reader.read_object(None).unwrap();
        assert_eq!(span, Span { first: 7, second: 9 });
        assert_eq!(reader.position(), 10);
    }

    #[test]
    fn test_fixed_size_moves_cursor() {
        let data = [0u8; 20];
        let mut reader = reader(&data);
        reader.seek(2).unwrap();
        let _: Sized16 = reader.read_object(None).unwrap();
        assert_eq!(reader.position(), 18);
    }

    #[test]
    fn test_version_field_drives_offsets() {
        let mut data = vec![0u8; 16];
        data[0..2].copy_from_slice(&3i16.to_be_bytes());
        data[2..4].copy_from_slice(&(-1i16).to_be_bytes());
        data[4..8].copy_from_slice(&11i32.to_be_bytes());
        data[8..12].copy_from_slice(&22i32.to_be_bytes());
        data[12] = 0xA;
        data[13] = 0xB;

        let mut reader = reader(&data);
        let value: Versioned = reader.read_object(None).unwrap();
        assert_eq!(value.version, 3);
        assert_eq!(value.common, -1);
        assert_eq!(value.old, 0);
        assert_eq!(value.new, 22);
        assert_eq!(value.mixed, 0xB);
        assert_eq!(reader.position(), 14);

        // a supplied version wins over the stored one
        let mut reader = self::reader(&data);
        let value: Versioned = reader.read_object(Some(1)).unwrap();
        assert_eq!(value.old, 11);
        assert_eq!(value.new, 0);
        assert_eq!(value.mixed, 0xA);
    }

    #[test]
    fn test_missing_offset_for_version() {
        let data = [0u8; 16];
        let mut reader = reader(&data);
        let err = reader.read_object::<Versioned>(Some(7)).unwrap_err();
        assert!(matches!(
            err,
            BinaryError::NoApplicableOffset {
                record: "Versioned",
                field: "mixed",
                version: 7
            }
        ));
    }

    #[test]
    fn test_data_length_overrides_fixed_size() {
        let mut data = vec![0u8; 24];
        data[0..4].copy_from_slice(&20i32.to_be_bytes());
        data[4..8].copy_from_slice(&2u32.to_le_bytes());
        data[8..10].copy_from_slice(b"hi");
        data[10..12].copy_from_slice(&0x1234u16.to_be_bytes());

        let mut reader = reader(&data);
        let value: Labelled = reader.read_object(None).unwrap();
        assert_eq!(value.label, "hi");
        assert_eq!(value.tail, 0x1234);
        assert_eq!(reader.position(), 20);
        assert_eq!(reader.byte_order(), ByteOrder::Big);
    }

    #[test]
    fn test_non_positive_data_length() {
        let mut data = vec![0u8; 24];
        data[4..8].copy_from_slice(&0u32.to_le_bytes());
        let mut reader = reader(&data);
        assert!(matches!(
            reader.read_object::<Labelled>(None),
            Err(BinaryError::InvalidData(_))
        ));
    }

    #[test]
    fn test_nested_fixed_size_corrects_cursor() {
        let mut data = vec![0u8; 18];
        data[0] = 1;
        data[3] = 5;
        data[17] = 9;
        let mut reader = reader(&data);
        let outer: Outer = reader.read_object(None).unwrap();
        assert_eq!(outer.id, 1);
        assert_eq!(outer.inner.value, 5);
        assert_eq!(outer.after, 9);
        assert_eq!(reader.position(), 18);
    }

    #[test]
    fn test_read_into_existing() {
        let data = [0, 3, 0, 0, 0, 0, 0, 0, 0, 4];
        let mut span = Span {
            first: 100,
            second: 100,
        };
        reader(&data).read_object_into(&mut span, None).unwrap();
        assert_eq!(span, Span { first: 3, second: 4 });
    }

    #[test]
    fn test_buffer_too_short() {
        let data = [0, 1, 2];
        let mut reader = reader(&data);
        assert!(reader.read_object::<Span>(None).is_err());
    }
}
