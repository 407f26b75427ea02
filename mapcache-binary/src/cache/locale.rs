//! Localized string tables
//!
//! The globals tag holds one language definition per language. Each
//! definition points into the locale section at an entry table of
//! (string id, offset) pairs and a string blob. The blob is encrypted on
//! the Xbox generations and plain on PC.

use super::string_index::StringId;
use crate::crypto::read_encrypted;
use crate::dependency::{Constructible, Constructor, DependencyReader};
use crate::error::{BinaryError, Result};
use crate::reader::BinaryReader;
use crate::schema::{FieldDescriptor, Structure, TypeSchema, VersionRange};
use crate::translator::AddressTranslator;
use indexmap::IndexMap;
use mapcache_core::CacheKind;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const MCC: i32 = CacheKind::MccHaloReach.version();

/// Languages in definition order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    English,
    Japanese,
    German,
    French,
    Spanish,
    LatinAmericanSpanish,
    Italian,
    Korean,
    ChineseTraditional,
    ChineseSimplified,
    Portuguese,
    Polish,
    Russian,
    Danish,
    Finnish,
    Dutch,
    Norwegian,
}

impl Language {
    pub const ALL: [Language; 17] = [
        Language::English,
        Language::Japanese,
        Language::German,
        Language::French,
        Language::Spanish,
        Language::LatinAmericanSpanish,
        Language::Italian,
        Language::Korean,
        Language::ChineseTraditional,
        Language::ChineseSimplified,
        Language::Portuguese,
        Language::Polish,
        Language::Russian,
        Language::Danish,
        Language::Finnish,
        Language::Dutch,
        Language::Norwegian,
    ];

    /// Language of the definition at `index`
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for Language {
    type Err = BinaryError;

    fn from_str(s: &str) -> Result<Self> {
        Language::ALL
            .into_iter()
            .find(|language| language.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| BinaryError::invalid_data(format!("Unknown language '{}'", s)))
    }
}

/// Per-language table description stored in the globals tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LanguageDefinition {
    pub string_count: i32,
    pub strings_size: i32,
    /// Locale section pointer to the entry table
    pub indices_offset: i32,
    /// Locale section pointer to the string blob
    pub strings_offset: i32,
}

impl Constructible for LanguageDefinition {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for LanguageDefinition {
    fn build_schema() -> Result<TypeSchema<Self>> {
        type L = LanguageDefinition;
        TypeSchema::builder("LanguageDefinition")
            .fixed_size_for(VersionRange::until(MCC), 68)
            .fixed_size_for(VersionRange::from(MCC), 80)
            .field(FieldDescriptor::new("string_count", |l: &mut L, v: i32| l.string_count = v).at(0))
            .field(FieldDescriptor::new("strings_size", |l: &mut L, v: i32| l.strings_size = v).at(4))
            .field(
                FieldDescriptor::new("indices_offset", |l: &mut L, v: i32| l.indices_offset = v)
                    .at(8),
            )
            .field(
                FieldDescriptor::new("strings_offset", |l: &mut L, v: i32| l.strings_offset = v)
                    .at(12),
            )
            .build()
    }
}

/// One row of a language's entry table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocaleEntry {
    pub string_id: StringId,
    /// Offset into the string blob, negative for no string
    pub offset: i32,
}

impl Constructible for LocaleEntry {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for LocaleEntry {
    fn build_schema() -> Result<TypeSchema<Self>> {
        TypeSchema::builder("LocaleEntry")
            .field(
                FieldDescriptor::new("string_id", |e: &mut LocaleEntry, v: StringId| {
                    e.string_id = v
                })
                .at(0),
            )
            .field(FieldDescriptor::new("offset", |e: &mut LocaleEntry, v: i32| e.offset = v).at(4))
            .fixed_size(8)
            .build()
    }
}

/// Strings of one language keyed by string id.
///
/// A string id may appear more than once in a table; every value is kept
/// in table order.
#[derive(Debug, Clone)]
pub struct LocaleTable {
    language: Language,
    definition: LanguageDefinition,
    values: IndexMap<i32, Vec<String>>,
}

impl LocaleTable {
    pub fn language(&self) -> Language {
        self.language
    }

    pub fn definition(&self) -> &LanguageDefinition {
        &self.definition
    }

    /// Number of entries declared by the definition
    pub fn string_count(&self) -> usize {
        usize::try_from(self.definition.string_count).unwrap_or(0)
    }

    /// Number of distinct string ids with a value
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First value of a string id
    pub fn get(&self, id: StringId) -> Option<&str> {
        self.values.get(&id.value())?.first().map(String::as_str)
    }

    /// Every value of a string id
    pub fn get_all(&self, id: StringId) -> &[String] {
        self.values.get(&id.value()).map(Vec::as_slice).unwrap_or_default()
    }

    /// First value of each string id, in table order
    pub fn iter(&self) -> impl Iterator<Item = (StringId, &str)> {
        self.values
            .iter()
            .filter_map(|(id, values)| Some((StringId(*id), values.first()?.as_str())))
    }

    fn read(
        reader: &mut DependencyReader<'_>,
        language: Language,
        definition: LanguageDefinition,
        locale: &dyn AddressTranslator,
        key: Option<&str>,
        version: Option<i32>,
    ) -> Result<Self> {
        let mut values: IndexMap<i32, Vec<String>> = IndexMap::new();
        let count = usize::try_from(definition.string_count).map_err(|_| {
            BinaryError::invalid_data(format!(
                "{} table has negative string count {}",
                language, definition.string_count
            ))
        })?;
        if count == 0 {
            return Ok(Self {
                language,
                definition,
                values,
            });
        }

        reader.seek_absolute(locale.get_address(pointer(definition.indices_offset)?)?)?;
        if !reader.has_bytes(count.saturating_mul(8)) {
            return Err(BinaryError::not_enough_data(count.saturating_mul(8), reader.remaining()));
        }
        let entries = (0..count)
            .map(|_| reader.read_object::<LocaleEntry>(version))
            .collect::<Result<Vec<_>>>()?;

        reader.seek_absolute(locale.get_address(pointer(definition.strings_offset)?)?)?;
        let plain;
        let mut blob = match key {
            Some(key) => {
                let size = usize::try_from(definition.strings_size).map_err(|_| {
                    BinaryError::invalid_data(format!(
                        "{} table has negative size {}",
                        language, definition.strings_size
                    ))
                })?;
                plain = read_encrypted(reader, size, key)?;
                BinaryReader::new(&plain, reader.byte_order())
            }
            None => reader.virtual_reader().into_inner(),
        };

        for entry in entries {
            let Ok(offset) = u64::try_from(entry.offset) else {
                continue;
            };
            blob.seek(offset)?;
            values
                .entry(entry.string_id.value())
                .or_default()
                .push(blob.read_cstring()?);
        }

        debug!(%language, strings = values.len(), "Read locale table");
        Ok(Self {
            language,
            definition,
            values,
        })
    }
}

fn pointer(value: i32) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| BinaryError::invalid_data(format!("Negative locale pointer {}", value)))
}

/// Localized strings of every language in a container
#[derive(Debug, Clone, Default)]
pub struct LocaleIndex {
    tables: Vec<LocaleTable>,
}

impl LocaleIndex {
    /// Read the language definitions at `globals_address` and every table
    /// they describe.
    ///
    /// `locale` maps locale section pointers to file offsets.
    pub fn read(
        reader: &mut DependencyReader<'_>,
        globals_address: u64,
        kind: CacheKind,
        locale: &dyn AddressTranslator,
    ) -> Result<Self> {
        let layout = kind.locale_layout().ok_or_else(|| {
            BinaryError::invalid_operation(format!("{} containers have no locale tables", kind))
        })?;
        let version = Some(kind.version());
        let key = kind.locales_key();

        let mut tables = Vec::with_capacity(layout.count);
        for index in 0..layout.count {
            let language = Language::from_index(index).ok_or_else(|| {
                BinaryError::invalid_data(format!("No language for definition {}", index))
            })?;
            let address = globals_address + layout.offset + index as u64 * layout.stride;
            reader.seek_absolute(address)?;
            let definition = reader.read_object::<LanguageDefinition>(version)?;
            tables.push(LocaleTable::read(reader, language, definition, locale, key, version)?);
        }

        Ok(Self { tables })
    }

    /// Tables in definition order
    pub fn languages(&self) -> &[LocaleTable] {
        &self.tables
    }

    pub fn table(&self, language: Language) -> Option<&LocaleTable> {
        self.tables.get(language.index())
    }

    /// First value of a string id in one language
    pub fn get(&self, language: Language, id: StringId) -> Option<&str> {
        self.table(language)?.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_key, padded_length};
    use crate::dependency::DependencyRegistry;
    use crate::reader::ByteOrder;
    use crate::schema::schema_of;
    use crate::translator::MagicTranslator;
    use aes::Aes128;
    use cbc::Encryptor;
    use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
    use mapcache_core::LOCALES_KEY;
    use std::sync::Arc;

    const GLOBALS: usize = 0x100;
    /// File offset of the locale section
    const SECTION: usize = 0x1000;

    fn encrypt(plain: &[u8], key: &str) -> Vec<u8> {
        let (cipher_key, iv) = derive_key(key).unwrap();
        let mut buffer = plain.to_vec();
        buffer.resize(padded_length(plain.len()), 0);
        let length = buffer.len();
        Encryptor::<Aes128>::new_from_slices(&cipher_key, &iv)
            .unwrap()
            .encrypt_padded_mut::<NoPadding>(&mut buffer, length)
            .unwrap();
        buffer
    }

    struct Writer {
        data: Vec<u8>,
        order: ByteOrder,
    }

    impl Writer {
        fn i32(&mut self, at: usize, value: i32) {
            let bytes = match self.order {
                ByteOrder::Big => value.to_be_bytes(),
                ByteOrder::Little => value.to_le_bytes(),
            };
            self.data[at..at + 4].copy_from_slice(&bytes);
        }

        fn bytes(&mut self, at: usize, bytes: &[u8]) {
            self.data[at..at + bytes.len()].copy_from_slice(bytes);
        }
    }

    /// A container holding one populated language (English); every other
    /// definition is empty. Entries are (string id, blob offset).
    fn container(kind: CacheKind, order: ByteOrder, entries: &[(i32, i32)], blob: &[u8]) -> Vec<u8> {
        let layout = kind.locale_layout().unwrap();
        let mut writer = Writer {
            data: vec![0u8; 0x2000],
            order,
        };

        let stored = match kind.locales_key() {
            Some(key) => encrypt(blob, key),
            None => blob.to_vec(),
        };
        let definition = GLOBALS + layout.offset as usize;
        writer.i32(definition, entries.len() as i32);
        writer.i32(definition + 4, blob.len() as i32);
        writer.i32(definition + 8, 0);
        writer.i32(definition + 12, 0x200);

        for (i, (id, offset)) in entries.iter().enumerate() {
            writer.i32(SECTION + i * 8, *id);
            writer.i32(SECTION + i * 8 + 4, *offset);
        }
        writer.bytes(SECTION + 0x200, &stored);
        writer.data
    }

    fn read(kind: CacheKind, order: ByteOrder, data: &[u8]) -> Result<LocaleIndex> {
        let mut reader =
            DependencyReader::new(BinaryReader::new(data, order), Arc::new(DependencyRegistry::new()));
        let locale = MagicTranslator::with_magic("locale", -(SECTION as i64));
        LocaleIndex::read(&mut reader, GLOBALS as u64, kind, &locale)
    }

    #[test]
    fn test_definition_sizes() {
        let schema = schema_of::<LanguageDefinition>().unwrap();
        let halo4 = CacheKind::Halo4Retail;
        let mcc = CacheKind::MccHaloReach;
        assert_eq!(schema.fixed_size(Some(halo4.version())), Some(halo4.locale_layout().unwrap().stride));
        assert_eq!(schema.fixed_size(Some(mcc.version())), Some(mcc.locale_layout().unwrap().stride));
    }

    #[test]
    fn test_encrypted_tables() {
        let blob = b"Hello\0Goodbye\0";
        let entries = [(0x10, 0), (0x11, 6), (0x12, -1)];
        let data = container(CacheKind::Halo4Retail, ByteOrder::Big, &entries, blob);

        let index = read(CacheKind::Halo4Retail, ByteOrder::Big, &data).unwrap();
        assert_eq!(index.languages().len(), 17);
        assert_eq!(index.get(Language::English, StringId(0x10)), Some("Hello"));
        assert_eq!(index.get(Language::English, StringId(0x11)), Some("Goodbye"));
        // Negative offsets are skipped
        assert_eq!(index.get(Language::English, StringId(0x12)), None);

        let english = index.table(Language::English).unwrap();
        assert_eq!(english.string_count(), 3);
        assert_eq!(english.len(), 2);
        assert!(index.table(Language::Norwegian).unwrap().is_empty());
        assert_eq!(LOCALES_KEY, CacheKind::Halo4Retail.locales_key().unwrap());
    }

    #[test]
    fn test_plain_tables_keep_duplicates() {
        let blob = b"first\0second\0other\0";
        let entries = [(0x20, 0), (0x21, 13), (0x20, 6)];
        let data = container(CacheKind::MccHaloReach, ByteOrder::Little, &entries, blob);

        let index = read(CacheKind::MccHaloReach, ByteOrder::Little, &data).unwrap();
        assert_eq!(index.languages().len(), 12);
        assert!(index.table(Language::Dutch).is_none());

        let english = index.table(Language::English).unwrap();
        assert_eq!(english.get(StringId(0x20)), Some("first"));
        assert_eq!(english.get_all(StringId(0x20)), ["first", "second"]);
        assert!(english.get_all(StringId(0x99)).is_empty());

        let ids: Vec<StringId> = english.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![StringId(0x20), StringId(0x21)]);
    }

    #[test]
    fn test_language_names() {
        assert_eq!("english".parse::<Language>().unwrap(), Language::English);
        assert_eq!(
            "LatinAmericanSpanish".parse::<Language>().unwrap(),
            Language::LatinAmericanSpanish
        );
        assert_eq!(Language::from_index(16), Some(Language::Norwegian));
        assert!(Language::from_index(17).is_none());
        assert!("klingon".parse::<Language>().is_err());
    }

    #[test]
    fn test_unsupported_kind() {
        let data = vec![0u8; 0x2000];
        let result = read(CacheKind::HaloReachRetail, ByteOrder::Big, &data);
        assert!(matches!(result, Err(BinaryError::InvalidOperation(_))));
    }

    #[test]
    fn test_entry_table_past_end() {
        let mut data = container(CacheKind::MccHaloReach, ByteOrder::Little, &[(1, 0)], b"x\0");
        let definition = GLOBALS + 664;
        data[definition..definition + 4].copy_from_slice(&0x0100_0000i32.to_le_bytes());

        let result = read(CacheKind::MccHaloReach, ByteOrder::Little, &data);
        assert!(matches!(result, Err(BinaryError::NotEnoughData { .. })));
    }
}
