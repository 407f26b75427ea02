//! Resource resolution
//!
//! A resource identifier names a row of the resource gestalt. The row
//! points at a segment of the layout table, and the segment names up to
//! three pages with an offset into each. A page is a compressed run of
//! bytes in the container or in a shared companion container.

pub mod layout;

pub use layout::{GestaltEntry, Page, ResourceGestalt, ResourceLayoutTable, Segment, SharedCache};

use crate::cache::CacheFile;
use crate::compression::Decompressor;
use crate::dependency::{Constructible, Constructor, Dependency, DependencyReader};
use crate::error::{BinaryError, Result};
use crate::reader::BinaryReader;
use crate::schema::{FieldContext, FieldValue};
use mapcache_core::{RESOURCE_GESTALT_CLASS, RESOURCE_LAYOUT_CLASS};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Which page of a segment to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageType {
    /// Highest-priority page that is present
    #[default]
    Auto,
    Primary,
    Secondary,
    Tertiary,
}

impl PageType {
    pub const ALL: [PageType; 4] = [
        PageType::Auto,
        PageType::Primary,
        PageType::Secondary,
        PageType::Tertiary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PageType::Auto => "auto",
            PageType::Primary => "primary",
            PageType::Secondary => "secondary",
            PageType::Tertiary => "tertiary",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PageType {
    type Err = BinaryError;

    fn from_str(s: &str) -> Result<Self> {
        PageType::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BinaryError::invalid_data(format!("Unknown page type '{}'", s)))
    }
}

/// A page reference taken from a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageRef {
    page: i16,
    offset: i32,
}

impl PageRef {
    fn is_present(self) -> bool {
        self.page >= 0 && self.offset >= 0
    }
}

impl Segment {
    fn page_ref(&self, mode: PageType) -> Option<PageRef> {
        let candidate = match mode {
            PageType::Primary => PageRef {
                page: self.primary_page,
                offset: self.primary_offset,
            },
            PageType::Secondary => PageRef {
                page: self.secondary_page,
                offset: self.secondary_offset,
            },
            PageType::Tertiary => PageRef {
                page: self.tertiary_page,
                offset: self.tertiary_offset,
            },
            PageType::Auto => {
                return [PageType::Tertiary, PageType::Secondary, PageType::Primary]
                    .into_iter()
                    .find_map(|mode| self.page_ref(mode));
            }
        };
        candidate.is_present().then_some(candidate)
    }
}

impl CacheFile {
    /// Metadata of the `zone` system tag
    pub fn resource_gestalt(&self) -> Result<Arc<ResourceGestalt>> {
        self.read_metadata(self.system_tag(RESOURCE_GESTALT_CLASS)?)
    }

    /// Metadata of the `play` system tag
    pub fn resource_layout(&self) -> Result<Arc<ResourceLayoutTable>> {
        self.read_metadata(self.system_tag(RESOURCE_LAYOUT_CLASS)?)
    }
}

/// A resource reference bound to the container it was read from
#[derive(Clone)]
pub struct ResourceIdentifier {
    value: u32,
    cache: CacheFile,
}

impl ResourceIdentifier {
    pub fn new(value: u32, cache: CacheFile) -> Self {
        Self { value, cache }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Gestalt row named by the identifier
    pub fn row(&self) -> usize {
        (self.value & 0xFFFF) as usize
    }

    pub fn cache(&self) -> &CacheFile {
        &self.cache
    }

    /// Read up to `max_len` bytes of the resource from the page chosen by
    /// `mode`.
    ///
    /// Every failure along the way is reported as
    /// [`BinaryError::ResourceNotFound`].
    #[instrument(skip(self), fields(id = self.value))]
    pub fn read_data(&self, mode: PageType, max_len: usize) -> Result<Vec<u8>> {
        self.locate_and_read(mode, max_len).map_err(|e| match e {
            BinaryError::ResourceNotFound { .. } => e,
            other => BinaryError::resource_not_found(self.value, other.to_string()),
        })
    }

    fn not_found(&self, reason: impl Into<String>) -> BinaryError {
        BinaryError::resource_not_found(self.value, reason)
    }

    fn locate_and_read(&self, mode: PageType, max_len: usize) -> Result<Vec<u8>> {
        let gestalt = self.cache.resource_gestalt()?;
        let entry = gestalt
            .entry(self.row())
            .ok_or_else(|| self.not_found(format!("no gestalt row {}", self.row())))?;
        let segment_index = usize::try_from(entry.segment_index)
            .map_err(|_| self.not_found("resource has no segment"))?;

        let layout = self.cache.resource_layout()?;
        let segment = layout
            .segment(segment_index)
            .ok_or_else(|| self.not_found(format!("no segment {}", segment_index)))?;

        let mut chosen = segment
            .page_ref(mode)
            .ok_or_else(|| self.not_found(format!("segment has no {} page", mode)))?;
        let mut page = self.page(&layout, chosen)?;

        let unusable = page.data_offset < 0 || page.compressed_size == 0;
        if unusable && mode == PageType::Auto {
            let primary = segment
                .page_ref(PageType::Primary)
                .ok_or_else(|| self.not_found("segment has no primary page"))?;
            if primary != chosen {
                debug!(from = chosen.page, to = primary.page, "Falling back to primary page");
                chosen = primary;
                page = self.page(&layout, chosen)?;
            }
        }
        if page.data_offset < 0 || (mode != PageType::Auto && page.compressed_size == 0) {
            return Err(self.not_found(format!("page {} has no data", chosen.page)));
        }

        let decompressed = self.read_page(&layout, page)?;
        let start = chosen.offset as usize;
        if start > decompressed.len() {
            return Err(self.not_found(format!(
                "offset {} is past the end of page {}",
                start, chosen.page
            )));
        }
        let end = start.saturating_add(max_len).min(decompressed.len());
        Ok(decompressed[start..end].to_vec())
    }

    fn page(&self, layout: &ResourceLayoutTable, page: PageRef) -> Result<Page> {
        layout
            .page(page.page as usize)
            .copied()
            .ok_or_else(|| self.not_found(format!("no page {}", page.page)))
    }

    /// Raw page bytes, decompressed
    fn read_page(&self, layout: &ResourceLayoutTable, page: Page) -> Result<Vec<u8>> {
        let compressed_size = usize::try_from(page.compressed_size)
            .map_err(|_| self.not_found("negative compressed size"))?;
        let decompressed_size = usize::try_from(page.decompressed_size)
            .map_err(|_| self.not_found("negative decompressed size"))?;

        let raw = match usize::try_from(page.cache_index) {
            Ok(index) => {
                let shared = layout
                    .shared_cache(index)
                    .ok_or_else(|| self.not_found(format!("no shared cache {}", index)))?;
                self.read_companion(shared, page.data_offset, compressed_size)?
            }
            Err(_) => {
                let data = self.cache.data();
                let field_at = self.cache.kind().data_table_offset() as usize;
                let field = data
                    .get(field_at..field_at + 4)
                    .ok_or_else(|| self.not_found("header has no data table address"))?;
                let address = self.page_address(field, page.data_offset)?;
                let address = usize::try_from(address)
                    .map_err(|_| self.not_found("page address is out of range"))?;
                data.get(address..address.saturating_add(compressed_size))
                    .ok_or_else(|| self.not_found("page extends past the container"))?
                    .to_vec()
            }
        };

        debug!(
            cache_index = page.cache_index,
            compressed = compressed_size,
            decompressed = decompressed_size,
            "Read resource page"
        );
        if compressed_size == decompressed_size {
            return Ok(raw);
        }
        self.cache.codec().decompress(&raw, decompressed_size)
    }

    /// Read a page from a shared companion container next to this one
    fn read_companion(&self, shared: &SharedCache, data_offset: i32, length: usize) -> Result<Vec<u8>> {
        let files = self.cache.files();
        let path = self.cache.directory().join(shared.base_name());
        if !files.exists(&path) {
            return Err(self.not_found(format!("{} is missing", path.display())));
        }

        let field = files.read_at(&path, self.cache.kind().data_table_offset(), 4)?;
        let address = self.page_address(&field, data_offset)?;
        files.read_at(&path, address, length)
    }

    /// File offset of a page: the data table address stored in the
    /// container header plus the page's offset into the table.
    ///
    /// `field` holds the stored data table address, which is read the same
    /// way for the container and its companions.
    fn page_address(&self, field: &[u8], data_offset: i32) -> Result<u64> {
        let data_table = BinaryReader::new(field, self.cache.byte_order()).read_u32()?;
        u64::from(data_table)
            .checked_add_signed(i64::from(data_offset))
            .ok_or_else(|| self.not_found("page address is negative"))
    }
}

impl fmt::Debug for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceIdentifier({:#010x})", self.value)
    }
}

impl Constructible for ResourceIdentifier {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(
            "cache",
            vec![Dependency::cursor(), Dependency::on::<CacheFile>()],
            |reader| {
                let value = reader.read_u32()?;
                Ok(ResourceIdentifier::new(value, reader.resolve()?))
            },
        )]
    }
}

impl FieldValue for ResourceIdentifier {
    fn read_value(reader: &mut DependencyReader<'_>, _: FieldContext<'_>) -> Result<Self> {
        reader.resolve()
    }
}
