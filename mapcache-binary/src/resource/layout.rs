//! Resource tables held by the `zone` and `play` system tags

use crate::block::TagBlock;
use crate::dependency::{Constructible, Constructor};
use crate::error::Result;
use crate::schema::{FieldDescriptor, StringEncoding, Structure, TypeSchema, VersionRange};
use mapcache_core::CacheKind;

const HALO4: i32 = CacheKind::Halo4Retail.version();
const MCC: i32 = CacheKind::MccHaloReach.version();

/// Capacity of a shared cache file name
const SHARED_CACHE_NAME_LENGTH: usize = 256;

/// The resource gestalt: one entry per resource
#[derive(Debug, Clone, Default)]
pub struct ResourceGestalt {
    pub entries: Option<TagBlock<GestaltEntry>>,
}

impl ResourceGestalt {
    pub fn entry(&self, index: usize) -> Option<&GestaltEntry> {
        self.entries.as_ref()?.get(index)
    }
}

impl Constructible for ResourceGestalt {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for ResourceGestalt {
    fn build_schema() -> Result<TypeSchema<Self>> {
        TypeSchema::builder("ResourceGestalt")
            .field(
                FieldDescriptor::object("entries", |g: &mut Self, v: TagBlock<GestaltEntry>| {
                    g.entries = Some(v)
                })
                .at(88),
            )
            .build()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GestaltEntry {
    /// Segment of the layout table, negative when the resource has no data
    pub segment_index: i16,
}

impl Constructible for GestaltEntry {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for GestaltEntry {
    fn build_schema() -> Result<TypeSchema<Self>> {
        TypeSchema::builder("GestaltEntry")
            .field(
                FieldDescriptor::new("segment_index", |e: &mut Self, v: i16| e.segment_index = v)
                    .at(34),
            )
            .fixed_size(64)
            .build()
    }
}

/// Resource layout table: companion files, pages and segments
#[derive(Debug, Clone, Default)]
pub struct ResourceLayoutTable {
    pub shared_caches: Option<TagBlock<SharedCache>>,
    pub pages: Option<TagBlock<Page>>,
    pub segments: Option<TagBlock<Segment>>,
}

impl ResourceLayoutTable {
    pub fn shared_cache(&self, index: usize) -> Option<&SharedCache> {
        self.shared_caches.as_ref()?.get(index)
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.as_ref()?.get(index)
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.as_ref()?.get(index)
    }
}

impl Constructible for ResourceLayoutTable {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for ResourceLayoutTable {
    fn build_schema() -> Result<TypeSchema<Self>> {
        type L = ResourceLayoutTable;
        TypeSchema::builder("ResourceLayoutTable")
            .field(
                FieldDescriptor::object("shared_caches", |l: &mut L, v: TagBlock<SharedCache>| {
                    l.shared_caches = Some(v)
                })
                .at(12),
            )
            .field(
                FieldDescriptor::object("pages", |l: &mut L, v: TagBlock<Page>| l.pages = Some(v))
                    .at(24),
            )
            .field(
                FieldDescriptor::object("segments", |l: &mut L, v: TagBlock<Segment>| {
                    l.segments = Some(v)
                })
                .at(48),
            )
            .build()
    }
}

/// A companion container holding shared pages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedCache {
    pub file_name: String,
}

impl SharedCache {
    /// File name without the directory the game stored with it
    pub fn base_name(&self) -> &str {
        self.file_name
            .rsplit(['\\', '/'])
            .next()
            .unwrap_or(&self.file_name)
    }
}

impl Constructible for SharedCache {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for SharedCache {
    fn build_schema() -> Result<TypeSchema<Self>> {
        TypeSchema::builder("SharedCache")
            .field(
                FieldDescriptor::new("file_name", |c: &mut Self, v: String| c.file_name = v)
                    .encoding(StringEncoding::null_terminated(SHARED_CACHE_NAME_LENGTH))
                    .at(0),
            )
            .fixed_size(264)
            .build()
    }
}

/// A compressed run of resource data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// Shared cache holding the page, negative for the container itself
    pub cache_index: i16,
    pub data_offset: i32,
    pub compressed_size: i32,
    pub decompressed_size: i32,
}

impl Constructible for Page {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for Page {
    fn build_schema() -> Result<TypeSchema<Self>> {
        type P = Page;
        TypeSchema::builder("Page")
            .field(FieldDescriptor::new("cache_index", |p: &mut P, v: i16| p.cache_index = v).at(4))
            .field(FieldDescriptor::new("data_offset", |p: &mut P, v: i32| p.data_offset = v).at(8))
            .field(
                FieldDescriptor::new("compressed_size", |p: &mut P, v: i32| {
                    p.compressed_size = v
                })
                .at(12),
            )
            .field(
                FieldDescriptor::new("decompressed_size", |p: &mut P, v: i32| {
                    p.decompressed_size = v
                })
                .at(16),
            )
            .fixed_size(88)
            .build()
    }
}

/// Where one resource lives: a page index and an offset into the
/// decompressed page, for each of up to three pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub primary_page: i16,
    pub secondary_page: i16,
    pub tertiary_page: i16,
    pub primary_offset: i32,
    pub secondary_offset: i32,
    pub tertiary_offset: i32,
}

impl Default for Segment {
    fn default() -> Self {
        Self {
            primary_page: -1,
            secondary_page: -1,
            tertiary_page: -1,
            primary_offset: -1,
            secondary_offset: -1,
            tertiary_offset: -1,
        }
    }
}

/// Offset `reach` in the 16-byte layout and `halo4` in the 24-byte one
fn segment_field(field: FieldDescriptor<Segment>, reach: u64, halo4: u64) -> FieldDescriptor<Segment> {
    field
        .at_versions(VersionRange::until(HALO4), reach)
        .at_versions(VersionRange::between(HALO4, MCC), halo4)
        .at_versions(VersionRange::from(MCC), reach)
}

impl Constructible for Segment {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for Segment {
    fn build_schema() -> Result<TypeSchema<Self>> {
        type S = Segment;
        TypeSchema::builder("Segment")
            .fixed_size_for(VersionRange::until(HALO4), 16)
            .fixed_size_for(VersionRange::between(HALO4, MCC), 24)
            .fixed_size_for(VersionRange::from(MCC), 16)
            .field(FieldDescriptor::new("primary_page", |s: &mut S, v: i16| s.primary_page = v).at(0))
            .field(
                FieldDescriptor::new("secondary_page", |s: &mut S, v: i16| s.secondary_page = v)
                    .at(2),
            )
            .field(
                FieldDescriptor::new("tertiary_page", |s: &mut S, v: i16| s.tertiary_page = v)
                    .at(4)
                    .exact_version(HALO4),
            )
            .field(segment_field(
                FieldDescriptor::new("primary_offset", |s: &mut S, v: i32| s.primary_offset = v),
                4,
                8,
            ))
            .field(segment_field(
                FieldDescriptor::new("secondary_offset", |s: &mut S, v: i32| {
                    s.secondary_offset = v
                }),
                8,
                12,
            ))
            .field(
                FieldDescriptor::new("tertiary_offset", |s: &mut S, v: i32| s.tertiary_offset = v)
                    .at(16)
                    .exact_version(HALO4),
            )
            .build()
    }
}
