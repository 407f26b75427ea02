//! Tag blocks: counted arrays referenced from metadata records

use crate::dependency::{Constructible, DependencyReader};
use crate::error::{BinaryError, Result};
use crate::pointer::Pointer;
use crate::schema::{Structure, TypeSchema, schema_of};

/// Stored size of a block reference (count, pointer, unused)
pub const TAG_BLOCK_SIZE: u64 = 12;

/// A counted array of `T` stored elsewhere in metadata
#[derive(Debug, Clone)]
pub struct TagBlock<T> {
    count: i32,
    pointer: Pointer,
    items: Vec<T>,
}

impl<T> TagBlock<T> {
    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: Structure> Constructible for TagBlock<T> {}

impl<T: Structure> Structure for TagBlock<T> {
    fn build_schema() -> Result<TypeSchema<Self>> {
        TypeSchema::manual("TagBlock", read_block::<T>)
            .fixed_size(TAG_BLOCK_SIZE)
            .build()
    }
}

fn read_block<T: Structure>(
    reader: &mut DependencyReader<'_>,
    version: Option<i32>,
) -> Result<TagBlock<T>> {
    let count = reader.read_i32()?;
    let pointer: Pointer = reader.resolve()?;

    let mut items = Vec::new();
    if count > 0 && !pointer.is_null() {
        reader.seek_absolute(pointer.address()?)?;
        if let Some(size) = schema_of::<T>()?.fixed_size(version) {
            let needed = size
                .checked_mul(count as u64)
                .and_then(|needed| usize::try_from(needed).ok());
            if !needed.is_some_and(|needed| reader.has_bytes(needed)) {
                return Err(BinaryError::invalid_data(format!(
                    "Block of {} elements of {} bytes runs past the end of the data",
                    count, size
                )));
            }
        }
        items.reserve((count as usize).min(reader.remaining()));
        for _ in 0..count {
            items.push(reader.read_object::<T>(version)?);
        }
    }

    Ok(TagBlock {
        count,
        pointer,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{Constructor, DependencyRegistry};
    use crate::reader::{BinaryReader, ByteOrder};
    use crate::schema::FieldDescriptor;
    use crate::translator::{AddressTranslator, MagicTranslator};
    use std::sync::Arc;

    #[derive(Debug, Default, PartialEq)]
    struct Entry {
        value: u16,
    }

    impl Constructible for Entry {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::default_value()]
        }
    }

    impl Structure for Entry {
        fn build_schema() -> Result<TypeSchema<Self>> {
            TypeSchema::builder("Entry")
                .field(FieldDescriptor::new("value", |e: &mut Self, v: u16| e.value = v).at(2))
                .fixed_size(4)
                .build()
        }
    }

    #[derive(Debug, Default)]
    struct Holder {
        before: u32,
        entries: Option<TagBlock<Entry>>,
        after: u32,
    }

    impl Constructible for Holder {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::default_value()]
        }
    }

    impl Structure for Holder {
        fn build_schema() -> Result<TypeSchema<Self>> {
            TypeSchema::builder("Holder")
                .field(FieldDescriptor::new("before", |h: &mut Self, v: u32| h.before = v).at(0))
                .field(
                    FieldDescriptor::object("entries", |h: &mut Self, v: TagBlock<Entry>| {
                        h.entries = Some(v)
                    })
                    .at(4),
                )
                .field(FieldDescriptor::new("after", |h: &mut Self, v: u32| h.after = v).at(16))
                .build()
        }
    }

    fn registry() -> Arc<DependencyRegistry> {
        let mut registry = DependencyRegistry::new();
        let translator: Arc<dyn AddressTranslator> =
            Arc::new(MagicTranslator::with_magic("metadata", 0x1000));
        registry.register_instance(translator).unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_block_items_and_cursor() {
        let mut data = vec![0u8; 32];
        data[0..4].copy_from_slice(&7u32.to_be_bytes());
        data[4..8].copy_from_slice(&2i32.to_be_bytes());
        data[8..12].copy_from_slice(&0x1014u32.to_be_bytes());
        data[16..20].copy_from_slice(&9u32.to_be_bytes());
        data[22..24].copy_from_slice(&0xAAu16.to_be_bytes());
        data[26..28].copy_from_slice(&0xBBu16.to_be_bytes());

        let mut reader = DependencyReader::new(BinaryReader::new(&data, ByteOrder::Big), registry());
        let holder: Holder = reader.read_object(None).unwrap();
        let entries = holder.entries.unwrap();
        assert_eq!(entries.count(), 2);
        assert_eq!(
            entries.items(),
            &[Entry { value: 0xAA }, Entry { value: 0xBB }]
        );
        assert_eq!(holder.before, 7);
        assert_eq!(holder.after, 9);
        assert_eq!(reader.position(), 20);
    }

    #[test]
    fn test_oversized_block_is_rejected() {
        let mut data = vec![0u8; 32];
        data[0..4].copy_from_slice(&i32::MAX.to_be_bytes());
        data[4..8].copy_from_slice(&0x1010u32.to_be_bytes());

        let mut reader = DependencyReader::new(BinaryReader::new(&data, ByteOrder::Big), registry());
        let result = reader.read_object::<TagBlock<Entry>>(None);
        assert!(matches!(result, Err(BinaryError::InvalidData(_))));

        // Exactly filling the buffer is fine
        data[0..4].copy_from_slice(&4i32.to_be_bytes());
        let mut reader = DependencyReader::new(BinaryReader::new(&data, ByteOrder::Big), registry());
        let block: TagBlock<Entry> = reader.read_object(None).unwrap();
        assert_eq!(block.len(), 4);
    }

    #[test]
    fn test_empty_block_reads_nothing() {
        let data = [0u8; 12];
        let mut reader = DependencyReader::new(BinaryReader::new(&data, ByteOrder::Big), registry());
        let block: TagBlock<Entry> = reader.read_object(None).unwrap();
        assert!(block.is_empty());
        assert!(block.pointer().is_null());
        assert_eq!(reader.position(), TAG_BLOCK_SIZE);
    }
}
