//! String id table

use super::header::CacheHeader;
use crate::crypto::read_encrypted;
use crate::dependency::DependencyReader;
use crate::error::{BinaryError, Result};
use crate::reader::BinaryReader;
use crate::schema::{FieldContext, FieldValue};
use mapcache_core::{CacheKind, INVALID_STRING};
use std::fmt;
use tracing::{debug, warn};

/// Reference to an entry of the string table, as stored in records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StringId(pub i32);

impl StringId {
    pub fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FieldValue for StringId {
    fn read_value(reader: &mut DependencyReader<'_>, _: FieldContext<'_>) -> Result<Self> {
        Ok(StringId(reader.read_i32()?))
    }

    fn as_integer(&self) -> Option<i64> {
        Some(i64::from(self.0))
    }
}

/// Read an offset table and the string blob it indexes.
///
/// Negative offsets have no string. Encrypted blobs are read as
/// `blob_size` bytes padded to the cipher block size; plain blobs are read
/// through a sub-cursor that extends to the end of the container.
pub(crate) fn read_string_table(
    reader: &mut BinaryReader<'_>,
    index_address: u64,
    count: i32,
    blob_address: u64,
    blob_size: i32,
    key: Option<&str>,
) -> Result<Vec<Option<String>>> {
    let count = usize::try_from(count)
        .map_err(|_| BinaryError::invalid_data(format!("Negative table count {}", count)))?;
    reader.seek_absolute(index_address)?;
    let offsets = reader.read_i32_array(count)?;

    reader.seek_absolute(blob_address)?;
    match key {
        Some(key) => {
            let size = usize::try_from(blob_size).map_err(|_| {
                BinaryError::invalid_data(format!("Negative table size {}", blob_size))
            })?;
            let plain = read_encrypted(reader, size, key)?;
            let mut blob = BinaryReader::new(&plain, reader.byte_order());
            read_strings(&mut blob, &offsets)
        }
        None => {
            let mut blob = reader.virtual_reader();
            read_strings(&mut blob, &offsets)
        }
    }
}

fn read_strings(blob: &mut BinaryReader<'_>, offsets: &[i32]) -> Result<Vec<Option<String>>> {
    offsets
        .iter()
        .map(|&offset| {
            let Ok(offset) = u64::try_from(offset) else {
                return Ok(None);
            };
            blob.seek(offset)?;
            blob.read_cstring().map(Some)
        })
        .collect()
}

/// Decrypted string table addressed by string id
#[derive(Debug, Clone, Default)]
pub struct StringIndex {
    kind: Option<CacheKind>,
    strings: Vec<Option<String>>,
}

impl StringIndex {
    /// Read the string table described by `header`
    pub fn read(reader: &mut BinaryReader<'_>, header: &CacheHeader, kind: CacheKind) -> Result<Self> {
        let missing = |name: &str| BinaryError::invalid_format(format!("Header has no {}", name));
        let index_pointer = header
            .string_table_index_pointer
            .as_ref()
            .ok_or_else(|| missing("string index pointer"))?;
        let blob_pointer = header
            .string_table_pointer
            .as_ref()
            .ok_or_else(|| missing("string table pointer"))?;

        debug!(
            count = header.string_count,
            size = header.string_table_size,
            "Reading string table"
        );
        let key = kind.uses_encryption().then(|| kind.strings_key());
        let strings = read_string_table(
            reader,
            index_pointer.address()?,
            header.string_count,
            blob_pointer.address()?,
            header.string_table_size,
            key,
        )?;

        Ok(Self::from_strings(kind, strings))
    }

    pub(crate) fn from_strings(kind: CacheKind, strings: Vec<Option<String>>) -> Self {
        Self {
            kind: Some(kind),
            strings,
        }
    }

    /// Number of table slots, absent entries included
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// String at a raw table index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index)?.as_deref()
    }

    /// Table index for a string id after applying the remap windows
    pub fn table_index(&self, id: i32) -> Option<usize> {
        let windows = self.kind.map(CacheKind::remap_windows).unwrap_or_default();
        let index = match windows.iter().find(|window| id > window.threshold) {
            Some(window) => id.checked_add(window.delta)?,
            None => id,
        };
        usize::try_from(index).ok()
    }

    /// Resolve a string id, if it names a present string
    pub fn try_get_string(&self, id: i32) -> Option<&str> {
        self.get(self.table_index(id)?)
    }

    /// Resolve a string id, falling back to the invalid-string sentinel
    pub fn get_string(&self, id: i32) -> &str {
        match self.try_get_string(id) {
            Some(text) => text,
            None => {
                warn!(id, "String id does not resolve");
                INVALID_STRING
            }
        }
    }

    /// Present strings with their table index
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.strings
            .iter()
            .enumerate()
            .filter_map(|(index, text)| Some((index, text.as_deref()?)))
    }
}
