//! Container header
//!
//! The header is a fixed-size record at the start of every container. Its
//! layout is shared by the Xbox generations; the PC generation widens the
//! file size, index pointer and virtual base, which shifts most later
//! fields by four bytes.

use crate::dependency::{Constructible, Constructor};
use crate::error::{BinaryError, Result};
use crate::pointer::{Pointer, Pointer64};
use crate::schema::{FieldDescriptor, StringEncoding, Structure, TypeSchema, VersionRange};
use crate::translator::AddressTranslator;
use mapcache_core::{BUILD_STRING_LENGTH, CacheKind, SCENARIO_NAME_LENGTH};
use std::sync::Arc;

const REACH_RETAIL: i32 = CacheKind::HaloReachRetail.version();
const HALO4: i32 = CacheKind::Halo4Retail.version();
const MCC: i32 = CacheKind::MccHaloReach.version();

/// Index of the tag data section in the section tables
const TAG_SECTION: usize = 2;
/// Index of the localized string section in the section tables
const LOCALE_SECTION: usize = 3;

/// Fixed-size container header
#[derive(Debug, Clone, Default)]
pub struct CacheHeader {
    pub file_size: i64,
    pub index_pointer: Option<Pointer>,
    pub index_pointer64: Option<Pointer64>,
    pub build_string: String,
    pub string_count: i32,
    pub string_table_size: i32,
    pub string_table_index_pointer: Option<Pointer>,
    pub string_table_pointer: Option<Pointer>,
    pub scenario_name: String,
    pub file_count: i32,
    pub file_table_pointer: Option<Pointer>,
    pub file_table_size: i32,
    pub file_table_index_pointer: Option<Pointer>,
    pub virtual_base_address: i64,
    pub data_table_address: i32,
    pub data_table_size: i32,
    pub section_offsets: Option<SectionOffsetTable>,
    pub sections: Option<SectionTable>,
}

/// Field at `xbox` in the Xbox layouts and `pc` in the PC layout
fn shifted<T: 'static>(field: FieldDescriptor<T>, xbox: u64, pc: u64) -> FieldDescriptor<T> {
    field
        .at_versions(VersionRange::until(MCC), xbox)
        .at_versions(VersionRange::from(MCC), pc)
}

impl Constructible for CacheHeader {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for CacheHeader {
    fn build_schema() -> Result<TypeSchema<Self>> {
        type H = CacheHeader;
        TypeSchema::builder("CacheHeader")
            .fixed_size_for(VersionRange::until(REACH_RETAIL), 16384)
            .fixed_size_for(VersionRange::between(REACH_RETAIL, HALO4), 40960)
            .fixed_size_for(VersionRange::between(HALO4, MCC), 122880)
            .fixed_size_for(VersionRange::from(MCC), 40960)
            .field(
                FieldDescriptor::new("file_size", |h: &mut H, v: i32| h.file_size = v.into())
                    .at(8)
                    .max_version(MCC),
            )
            .field(
                FieldDescriptor::new("file_size64", |h: &mut H, v: i64| h.file_size = v)
                    .at(8)
                    .min_version(MCC),
            )
            .field(
                FieldDescriptor::new("index_pointer", |h: &mut H, v: Pointer| {
                    h.index_pointer = Some(v)
                })
                .at(16)
                .max_version(MCC),
            )
            .field(
                FieldDescriptor::new("index_pointer64", |h: &mut H, v: Pointer64| {
                    h.index_pointer64 = Some(v)
                })
                .at(16)
                .min_version(MCC),
            )
            .field(shifted(
                FieldDescriptor::new("build_string", |h: &mut H, v: String| h.build_string = v)
                    .encoding(StringEncoding::null_terminated(BUILD_STRING_LENGTH)),
                284,
                288,
            ))
            .field(shifted(
                FieldDescriptor::new("string_count", |h: &mut H, v: i32| h.string_count = v),
                344,
                348,
            ))
            .field(shifted(
                FieldDescriptor::new("string_table_size", |h: &mut H, v: i32| {
                    h.string_table_size = v
                }),
                348,
                352,
            ))
            .field(shifted(
                FieldDescriptor::new("string_table_index_pointer", |h: &mut H, v: Pointer| {
                    h.string_table_index_pointer = Some(v)
                }),
                352,
                356,
            ))
            .field(shifted(
                FieldDescriptor::new("string_table_pointer", |h: &mut H, v: Pointer| {
                    h.string_table_pointer = Some(v)
                }),
                356,
                360,
            ))
            .field(shifted(
                FieldDescriptor::new("scenario_name", |h: &mut H, v: String| h.scenario_name = v)
                    .encoding(StringEncoding::null_terminated(SCENARIO_NAME_LENGTH)),
                432,
                444,
            ))
            .field(shifted(
                FieldDescriptor::new("file_count", |h: &mut H, v: i32| h.file_count = v),
                692,
                704,
            ))
            .field(shifted(
                FieldDescriptor::new("file_table_pointer", |h: &mut H, v: Pointer| {
                    h.file_table_pointer = Some(v)
                }),
                696,
                708,
            ))
            .field(shifted(
                FieldDescriptor::new("file_table_size", |h: &mut H, v: i32| h.file_table_size = v),
                700,
                712,
            ))
            .field(shifted(
                FieldDescriptor::new("file_table_index_pointer", |h: &mut H, v: Pointer| {
                    h.file_table_index_pointer = Some(v)
                }),
                704,
                716,
            ))
            .field(
                FieldDescriptor::new("virtual_base_address", |h: &mut H, v: u32| {
                    h.virtual_base_address = v.into()
                })
                .at_versions(VersionRange::until(HALO4), 744)
                .at_versions(VersionRange::between(HALO4, MCC), 760)
                .max_version(MCC),
            )
            .field(
                FieldDescriptor::new("virtual_base_address64", |h: &mut H, v: i64| {
                    h.virtual_base_address = v
                })
                .at(760)
                .min_version(MCC),
            )
            .field(
                FieldDescriptor::new("data_table_address", |h: &mut H, v: i32| {
                    h.data_table_address = v
                })
                .at(1136)
                .max_version(HALO4),
            )
            .field(
                FieldDescriptor::new("data_table_size", |h: &mut H, v: i32| h.data_table_size = v)
                    .at(1160)
                    .max_version(HALO4),
            )
            .field(
                FieldDescriptor::object("section_offsets", |h: &mut H, v: SectionOffsetTable| {
                    h.section_offsets = Some(v)
                })
                .at_versions(VersionRange::between(HALO4, MCC), 1148)
                .at_versions(VersionRange::from(MCC), 1204)
                .min_version(HALO4),
            )
            .field(
                FieldDescriptor::object("sections", |h: &mut H, v: SectionTable| {
                    h.sections = Some(v)
                })
                .at_versions(VersionRange::between(HALO4, MCC), 1164)
                .at_versions(VersionRange::from(MCC), 1220)
                .min_version(HALO4),
            )
            .build()
    }
}

impl CacheHeader {
    /// Magic of the header address space.
    ///
    /// The Xbox generations place the string index table directly after
    /// the header; the PC generation maps header pointers through the first
    /// section.
    pub fn header_magic(&self, kind: CacheKind) -> Result<i64> {
        if kind.is_64bit() {
            let base = self.section_base(0).ok_or_else(|| {
                BinaryError::invalid_format("Header has no section table")
            })?;
            return Ok(-base);
        }

        let pointer = self.string_table_index_pointer.as_ref().ok_or_else(|| {
            BinaryError::invalid_format("Header has no string index pointer")
        })?;
        let header_size = i64::try_from(kind.header_size())
            .map_err(|_| BinaryError::invalid_format("Header size out of range"))?;
        Ok(i64::from(pointer.raw()) - header_size)
    }

    /// File offset of the tag data, when the header records one
    pub fn metadata_address(&self) -> Option<i64> {
        self.section_base(TAG_SECTION).filter(|base| *base != 0)
    }

    /// Magic of the metadata address space
    pub fn metadata_magic(&self) -> i64 {
        match self.metadata_address() {
            Some(address) => self.virtual_base_address - address,
            None => {
                self.virtual_base_address
                    - (i64::from(self.data_table_address) + i64::from(self.data_table_size))
            }
        }
    }

    /// Magic of the localized string address space.
    ///
    /// Only containers with section tables carry one.
    pub fn locale_magic(&self) -> Option<i64> {
        self.section_base(LOCALE_SECTION).map(|base| -base)
    }

    fn section_base(&self, index: usize) -> Option<i64> {
        let offsets = self.section_offsets.as_ref()?;
        let sections = self.sections.as_ref()?;
        Some(i64::from(offsets.offsets[index]) + i64::from(sections.sections[index].address))
    }

    /// Move the index pointer into another address space
    pub fn retarget_index(&mut self, translator: Arc<dyn AddressTranslator>) {
        if let Some(pointer) = &self.index_pointer {
            self.index_pointer = Some(pointer.retarget(Arc::clone(&translator)));
        }
        if let Some(pointer) = &self.index_pointer64 {
            self.index_pointer64 = Some(pointer.retarget(translator));
        }
    }

    /// File offset of the tag index header
    pub fn index_address(&self) -> Result<u64> {
        match (&self.index_pointer, &self.index_pointer64) {
            (Some(pointer), _) => pointer.address(),
            (None, Some(pointer)) => pointer.address(),
            (None, None) => Err(BinaryError::invalid_format("Header has no index pointer")),
        }
    }
}

/// File offsets of the four container sections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionOffsetTable {
    pub offsets: [i32; 4],
}

impl Constructible for SectionOffsetTable {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for SectionOffsetTable {
    fn build_schema() -> Result<TypeSchema<Self>> {
        type S = SectionOffsetTable;
        TypeSchema::builder("SectionOffsetTable")
            .field(FieldDescriptor::new("debug", |s: &mut S, v: i32| s.offsets[0] = v).at(0))
            .field(FieldDescriptor::new("resource", |s: &mut S, v: i32| s.offsets[1] = v).at(4))
            .field(FieldDescriptor::new("tag", |s: &mut S, v: i32| s.offsets[2] = v).at(8))
            .field(FieldDescriptor::new("locale", |s: &mut S, v: i32| s.offsets[3] = v).at(12))
            .fixed_size(16)
            .build()
    }
}

/// Virtual placement of one section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Section {
    pub address: u32,
    pub size: u32,
}

impl Constructible for Section {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for Section {
    fn build_schema() -> Result<TypeSchema<Self>> {
        TypeSchema::builder("Section")
            .field(FieldDescriptor::new("address", |s: &mut Section, v: u32| s.address = v).at(0))
            .field(FieldDescriptor::new("size", |s: &mut Section, v: u32| s.size = v).at(4))
            .fixed_size(8)
            .build()
    }
}

/// The four container sections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionTable {
    pub sections: [Section; 4],
}

impl Constructible for SectionTable {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for SectionTable {
    fn build_schema() -> Result<TypeSchema<Self>> {
        type S = SectionTable;
        TypeSchema::builder("SectionTable")
            .field(FieldDescriptor::object("debug", |s: &mut S, v: Section| s.sections[0] = v).at(0))
            .field(FieldDescriptor::object("resource", |s: &mut S, v: Section| s.sections[1] = v).at(8))
            .field(FieldDescriptor::object("tag", |s: &mut S, v: Section| s.sections[2] = v).at(16))
            .field(FieldDescriptor::object("locale", |s: &mut S, v: Section| s.sections[3] = v).at(24))
            .fixed_size(32)
            .build()
    }
}
