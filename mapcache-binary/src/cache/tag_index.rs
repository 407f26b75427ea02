//! Tag index
//!
//! The index lists the tag classes and one fixed record per tag. Records
//! with a negative class index are unused slots and are not exposed. Tag
//! paths come from the name table, which is read after the records.

use super::header::CacheHeader;
use super::string_index::{StringId, read_string_table};
use crate::dependency::{
    Constructible, Constructor, Dependency, DependencyReader, ReadContext,
};
use crate::error::{BinaryError, Result};
use crate::pointer::{Pointer, Pointer64};
use crate::schema::{FieldDescriptor, Structure, TypeSchema, VersionRange};
use indexmap::IndexMap;
use mapcache_core::{
    CacheKind, ClassCode, PLAY_FROM_ZONE_OFFSET, RESOURCE_GESTALT_CLASS, RESOURCE_LAYOUT_CLASS,
    SCENARIO_CLASS, is_system_class,
};
use std::collections::HashMap;
use tracing::{debug, warn};

const MCC: i32 = CacheKind::MccHaloReach.version();

/// Counts and locations of the index tables
#[derive(Debug, Clone, Default)]
pub struct TagIndexHeader {
    pub class_count: i32,
    pub class_pointer: Option<Pointer>,
    pub class_pointer64: Option<Pointer64>,
    pub tag_count: i32,
    pub tag_pointer: Option<Pointer>,
    pub tag_pointer64: Option<Pointer64>,
    pub info_count: i32,
    pub info_pointer: Option<Pointer>,
    pub info2_count: i32,
    pub info2_pointer: Option<Pointer>,
}

impl Constructible for TagIndexHeader {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for TagIndexHeader {
    fn build_schema() -> Result<TypeSchema<Self>> {
        type H = TagIndexHeader;
        TypeSchema::builder("TagIndexHeader")
            .fixed_size_for(VersionRange::until(MCC), 32)
            .fixed_size_for(VersionRange::from(MCC), 48)
            .field(FieldDescriptor::new("class_count", |h: &mut H, v: i32| h.class_count = v).at(0))
            .field(
                FieldDescriptor::new("class_pointer", |h: &mut H, v: Pointer| {
                    h.class_pointer = Some(v)
                })
                .at(4)
                .max_version(MCC),
            )
            .field(
                FieldDescriptor::new("class_pointer64", |h: &mut H, v: Pointer64| {
                    h.class_pointer64 = Some(v)
                })
                .at(8)
                .min_version(MCC),
            )
            .field(
                FieldDescriptor::new("tag_count", |h: &mut H, v: i32| h.tag_count = v)
                    .at_versions(VersionRange::until(MCC), 8)
                    .at_versions(VersionRange::from(MCC), 16),
            )
            .field(
                FieldDescriptor::new("tag_pointer", |h: &mut H, v: Pointer| h.tag_pointer = Some(v))
                    .at(12)
                    .max_version(MCC),
            )
            .field(
                FieldDescriptor::new("tag_pointer64", |h: &mut H, v: Pointer64| {
                    h.tag_pointer64 = Some(v)
                })
                .at(24)
                .min_version(MCC),
            )
            .field(
                FieldDescriptor::new("info_count", |h: &mut H, v: i32| h.info_count = v)
                    .at(16)
                    .max_version(MCC),
            )
            .field(
                FieldDescriptor::new("info_pointer", |h: &mut H, v: Pointer| {
                    h.info_pointer = Some(v)
                })
                .at(20)
                .max_version(MCC),
            )
            .field(
                FieldDescriptor::new("info2_count", |h: &mut H, v: i32| h.info2_count = v)
                    .at(24)
                    .max_version(MCC),
            )
            .field(
                FieldDescriptor::new("info2_pointer", |h: &mut H, v: Pointer| {
                    h.info2_pointer = Some(v)
                })
                .at(28)
                .max_version(MCC),
            )
            .build()
    }
}

impl TagIndexHeader {
    fn table_address(
        narrow: &Option<Pointer>,
        wide: &Option<Pointer64>,
        table: &'static str,
    ) -> Result<u64> {
        match (narrow, wide) {
            (Some(pointer), _) => pointer.address(),
            (None, Some(pointer)) => pointer.address(),
            (None, None) => Err(BinaryError::invalid_format(format!(
                "Index header has no {} pointer",
                table
            ))),
        }
    }

    pub fn class_address(&self) -> Result<u64> {
        Self::table_address(&self.class_pointer, &self.class_pointer64, "class")
    }

    pub fn tag_address(&self) -> Result<u64> {
        Self::table_address(&self.tag_pointer, &self.tag_pointer64, "tag")
    }
}

/// A tag class record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagClass {
    pub code: ClassCode,
    pub parent: ClassCode,
    pub parent2: ClassCode,
    pub name: StringId,
}

impl Constructible for TagClass {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for TagClass {
    fn build_schema() -> Result<TypeSchema<Self>> {
        type C = TagClass;
        TypeSchema::builder("TagClass")
            .field(FieldDescriptor::new("code", |c: &mut C, v: ClassCode| c.code = v).at(0))
            .field(FieldDescriptor::new("parent", |c: &mut C, v: ClassCode| c.parent = v).at(4))
            .field(FieldDescriptor::new("parent2", |c: &mut C, v: ClassCode| c.parent2 = v).at(8))
            .field(FieldDescriptor::new("name", |c: &mut C, v: StringId| c.name = v).at(12))
            .fixed_size(16)
            .build()
    }
}

/// One tag: its record in the index plus the class and path resolved
/// while the index was built
#[derive(Debug, Clone)]
pub struct IndexItem {
    id: i32,
    class_index: i16,
    meta_pointer: Option<Pointer>,
    class_code: Option<ClassCode>,
    path: Option<String>,
}

impl IndexItem {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            class_index: -1,
            meta_pointer: None,
            class_code: None,
            path: None,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn class_index(&self) -> i16 {
        self.class_index
    }

    pub fn class_code(&self) -> Option<ClassCode> {
        self.class_code
    }

    /// Full tag path, if the name table has one
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Last path component
    pub fn file_name(&self) -> Option<&str> {
        let path = self.path()?;
        Some(path.rsplit('\\').next().unwrap_or(path))
    }

    pub fn meta_pointer(&self) -> Option<&Pointer> {
        self.meta_pointer.as_ref()
    }

    /// File offset of the tag's metadata
    pub fn meta_address(&self) -> Result<u64> {
        match &self.meta_pointer {
            Some(pointer) if !pointer.is_null() => pointer.address(),
            _ => Err(BinaryError::missing_entry("metadata", self.id)),
        }
    }
}

impl Constructible for IndexItem {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(
            "record",
            vec![Dependency::cursor(), Dependency::on::<ReadContext>()],
            |reader| {
                let context = reader.resolve::<ReadContext>()?;
                Ok(IndexItem::new(context.record_id))
            },
        )]
    }
}

impl Structure for IndexItem {
    fn build_schema() -> Result<TypeSchema<Self>> {
        type I = IndexItem;
        TypeSchema::builder("IndexItem")
            .field(FieldDescriptor::new("class_index", |i: &mut I, v: i16| i.class_index = v).at(0))
            .field(FieldDescriptor::new("salt", |_: &mut I, _: i16| {}).at(2))
            .field(
                FieldDescriptor::new("meta_pointer", |i: &mut I, v: Pointer| {
                    i.meta_pointer = Some(v)
                })
                .at(4),
            )
            .fixed_size(8)
            .build()
    }
}

/// Tag classes, tags and the system tag lookup of one container
#[derive(Debug, Clone)]
pub struct TagIndex {
    kind: CacheKind,
    header: Option<TagIndexHeader>,
    classes: Vec<TagClass>,
    items: IndexMap<i32, IndexItem>,
    system_tags: HashMap<ClassCode, i32>,
}

impl TagIndex {
    pub fn new(kind: CacheKind) -> Self {
        Self {
            kind,
            header: None,
            classes: Vec::new(),
            items: IndexMap::new(),
            system_tags: HashMap::new(),
        }
    }

    /// Read the class and tag tables and the tag names.
    ///
    /// The reader must cover the whole container and resolve metadata
    /// pointers. An index can only be read once.
    pub fn read_items(&mut self, reader: &mut DependencyReader<'_>, header: &CacheHeader) -> Result<()> {
        if self.header.is_some() {
            return Err(BinaryError::invalid_operation("Tag index has already been read"));
        }
        let version = Some(self.kind.version());

        reader.seek_absolute(header.index_address()?)?;
        let index_header: TagIndexHeader = reader.read_object(version)?;
        debug!(
            classes = index_header.class_count,
            tags = index_header.tag_count,
            "Reading tag index"
        );

        reader.seek_absolute(index_header.class_address()?)?;
        let mut classes = Vec::with_capacity(index_header.class_count.max(0) as usize);
        for _ in 0..index_header.class_count {
            classes.push(reader.read_object::<TagClass>(version)?);
        }

        let mut items = IndexMap::new();
        let mut system_tags = HashMap::new();
        reader.seek_absolute(index_header.tag_address()?)?;
        for id in 0..index_header.tag_count {
            let mut record = reader.child_scope(|registry| {
                registry.register_instance(ReadContext { record_id: id })
            })?;
            let mut item: IndexItem = record.read_object(version)?;
            reader.seek(record.position())?;
            if item.class_index < 0 {
                continue;
            }

            let class = classes
                .get(item.class_index as usize)
                .ok_or_else(|| BinaryError::missing_entry("class", item.class_index))?;
            item.class_code = Some(class.code);

            let deferred = class.code == SCENARIO_CLASS && self.kind.selects_scenario_by_name();
            if is_system_class(class.code) && !deferred {
                if let Some(existing) = system_tags.get(&class.code) {
                    warn!(class = %class.code, first = existing, duplicate = id, "Duplicate system tag");
                } else {
                    system_tags.insert(class.code, id);
                }
            }
            items.insert(id, item);
        }

        self.read_names(reader, header, index_header.tag_count, &mut items)?;

        if self.kind.selects_scenario_by_name() {
            let scenario = items.values().find(|item| {
                item.class_code == Some(SCENARIO_CLASS)
                    && item.path() == Some(header.scenario_name.as_str())
            });
            match scenario {
                Some(item) => {
                    system_tags.insert(SCENARIO_CLASS, item.id);
                }
                None => warn!(scenario = %header.scenario_name, "No scenario tag matches the header"),
            }
        }

        if self.kind.redirects_empty_layout() {
            redirect_empty_layout(&mut items, &system_tags)?;
        }

        self.header = Some(index_header);
        self.classes = classes;
        self.items = items;
        self.system_tags = system_tags;
        Ok(())
    }

    fn read_names(
        &self,
        reader: &mut DependencyReader<'_>,
        header: &CacheHeader,
        tag_count: i32,
        items: &mut IndexMap<i32, IndexItem>,
    ) -> Result<()> {
        let (Some(index_pointer), Some(blob_pointer)) =
            (&header.file_table_index_pointer, &header.file_table_pointer)
        else {
            return Err(BinaryError::invalid_format("Header has no name table"));
        };

        let key = self
            .kind
            .uses_encryption()
            .then(|| self.kind.file_names_key());
        let names = read_string_table(
            reader,
            index_pointer.address()?,
            tag_count,
            blob_pointer.address()?,
            header.file_table_size,
            key,
        )?;

        for (id, name) in names.into_iter().enumerate() {
            let id = i32::try_from(id).map_err(|_| BinaryError::invalid_data("Name table too large"))?;
            if let Some(item) = items.get_mut(&id) {
                item.path = name;
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    pub fn is_built(&self) -> bool {
        self.header.is_some()
    }

    pub fn header(&self) -> Option<&TagIndexHeader> {
        self.header.as_ref()
    }

    pub fn classes(&self) -> &[TagClass] {
        &self.classes
    }

    /// Number of exposed tags
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&IndexItem> {
        self.items.get(&id)
    }

    /// Tags in index order
    pub fn iter(&self) -> impl Iterator<Item = &IndexItem> {
        self.items.values()
    }

    /// The single exposed tag of a system class
    pub fn system_tag(&self, code: ClassCode) -> Option<&IndexItem> {
        self.items.get(self.system_tags.get(&code)?)
    }
}

/// A `play` tag with a zero metadata pointer lives inside the `zone` tag
fn redirect_empty_layout(
    items: &mut IndexMap<i32, IndexItem>,
    system_tags: &HashMap<ClassCode, i32>,
) -> Result<()> {
    let (Some(play_id), Some(zone_id)) = (
        system_tags.get(&RESOURCE_LAYOUT_CLASS),
        system_tags.get(&RESOURCE_GESTALT_CLASS),
    ) else {
        return Ok(());
    };

    let Some(zone_pointer) = items.get(zone_id).and_then(|zone| zone.meta_pointer.clone()) else {
        return Ok(());
    };
    let Some(play) = items.get_mut(play_id) else {
        return Ok(());
    };
    if play.meta_pointer.as_ref().is_some_and(|pointer| pointer.raw() == 0) {
        let raw = zone_pointer
            .raw()
            .checked_add(PLAY_FROM_ZONE_OFFSET as u32)
            .ok_or_else(|| BinaryError::invalid_data("zone metadata pointer overflows"))?;
        debug!(raw, "Redirecting play metadata into zone");
        play.meta_pointer = Some(zone_pointer.with_raw(raw));
    }
    Ok(())
}
