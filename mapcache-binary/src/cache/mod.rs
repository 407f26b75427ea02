//! Container handle
//!
//! Opening a container reads the header, assigns both address space
//! magics, reads the tag index and the string table. After that the
//! handle is immutable apart from the metadata cache of system tags, and
//! can be cloned and shared between threads.

pub mod header;
pub mod locale;
pub mod options;
pub mod probe;
pub mod string_index;
pub mod tag_index;

pub use header::{CacheHeader, Section, SectionOffsetTable, SectionTable};
pub use locale::{Language, LanguageDefinition, LocaleEntry, LocaleIndex, LocaleTable};
pub use options::CacheLoadOptions;
pub use probe::{CacheProbe, is_cache_file};
pub use string_index::{StringId, StringIndex};
pub use tag_index::{IndexItem, TagClass, TagIndex, TagIndexHeader};

use crate::dependency::{Constructible, DependencyReader, DependencyRegistry, ReadContext};
use crate::error::{BinaryError, Result};
use crate::fs::{FileSource, LocalFileSystem};
use crate::pointer::Pointer;
use crate::reader::{BinaryReader, ByteOrder};
use crate::resource::ResourceIdentifier;
use crate::schema::Structure;
use crate::translator::{AddressTranslator, MagicTranslator, PointerExpander, ShiftExpander};
use mapcache_core::{
    CacheKind, ClassCode, GLOBALS_CLASS, RESOURCE_GESTALT_CLASS, RESOURCE_LAYOUT_CLASS,
    ResourceCodec, is_system_class,
};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

type MetadataCache = RwLock<HashMap<(i32, TypeId), Arc<dyn Any + Send + Sync>>>;

/// An open map cache container
#[derive(Clone)]
pub struct CacheFile {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    path: PathBuf,
    files: Arc<dyn FileSource>,
    data: Arc<[u8]>,
    byte_order: ByteOrder,
    build_string: String,
    kind: CacheKind,
    codec: ResourceCodec,
    header: CacheHeader,
    tag_index: TagIndex,
    string_index: StringIndex,
    header_translator: Arc<MagicTranslator>,
    metadata_translator: Arc<MagicTranslator>,
    registry: Arc<DependencyRegistry>,
    metadata_cache: MetadataCache,
    locale_index: OnceCell<Arc<LocaleIndex>>,
}

impl Constructible for CacheFile {}

impl CacheFile {
    /// Open a container from the local file system
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, Arc::new(LocalFileSystem), CacheLoadOptions::default())
    }

    /// Open a container through `files`.
    ///
    /// Companion files referenced by resource pages are looked up through
    /// the same source, next to the container.
    #[instrument(skip(path, files, options), fields(file = %path.as_ref().display()))]
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        files: Arc<dyn FileSource>,
        options: CacheLoadOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = files.read_all(&path)?;
        let probe = CacheProbe::from_bytes(&data)?;
        let kind = match options.kind {
            Some(kind) => kind,
            None => probe.kind().inspect_err(|_| {
                warn!(build = %probe.build_string, "Unrecognised build");
            })?,
        };
        let version = Some(kind.version());
        let byte_order = probe.byte_order;

        let header_translator = Arc::new(MagicTranslator::header());
        let mut header = {
            let mut registry = DependencyRegistry::new();
            let translator: Arc<dyn AddressTranslator> = header_translator.clone();
            registry.register_instance(translator)?;
            let mut reader =
                DependencyReader::new(BinaryReader::new(&data, byte_order), Arc::new(registry));
            reader.read_object::<CacheHeader>(version)?
        };

        if options.validate_header {
            validate_header(&header, data.len())?;
        }

        header_translator.set_magic(header.header_magic(kind)?)?;
        let metadata_translator = Arc::new(MagicTranslator::metadata());
        metadata_translator.set_magic(header.metadata_magic())?;
        debug!(
            header_magic = header_translator.magic()?,
            metadata_magic = metadata_translator.magic()?,
            "Address spaces assigned"
        );

        let translator: Arc<dyn AddressTranslator> = metadata_translator.clone();
        header.retarget_index(Arc::clone(&translator));

        let mut registry = DependencyRegistry::new();
        registry.register_instance(translator)?;
        if let Some(expansion) = kind.pointer_expansion() {
            let expander: Arc<dyn PointerExpander> = Arc::new(ShiftExpander::from(expansion));
            registry.register_instance(expander)?;
        }
        let registry = Arc::new(registry);

        let mut tag_index = TagIndex::new(kind);
        let mut reader = DependencyReader::new(
            BinaryReader::new(&data, byte_order),
            Arc::clone(&registry),
        );
        tag_index.read_items(&mut reader, &header)?;

        let string_index = StringIndex::read(&mut reader, &header, kind)?;

        let cache = CacheFile {
            inner: Arc::new(CacheInner {
                path,
                files,
                byte_order,
                build_string: probe.build_string,
                kind,
                codec: options.resource_codec.unwrap_or(kind.resource_codec()),
                header,
                tag_index,
                string_index,
                header_translator,
                metadata_translator,
                registry,
                metadata_cache: RwLock::new(HashMap::new()),
                locale_index: OnceCell::new(),
                data,
            }),
        };
        cache.validate_registry()?;

        info!(
            kind = %kind,
            build = %cache.build_string(),
            tags = cache.tag_index().len(),
            strings = cache.string_index().len(),
            "Opened cache"
        );

        if options.preload_system_tags {
            if cache.tag_index().system_tag(RESOURCE_GESTALT_CLASS).is_some() {
                cache.resource_gestalt()?;
            }
            if cache.tag_index().system_tag(RESOURCE_LAYOUT_CLASS).is_some() {
                cache.resource_layout()?;
            }
        }

        Ok(cache)
    }

    /// Registry used for metadata reads, with the per-read instances
    fn metadata_registry(&self, record_id: i32) -> Result<DependencyRegistry> {
        let mut registry = DependencyRegistry::clone(&self.inner.registry);
        registry.register_instance(ReadContext { record_id })?;
        registry.register_instance(self.clone())?;
        Ok(registry)
    }

    fn validate_registry(&self) -> Result<()> {
        let registry = self.metadata_registry(-1)?;
        registry.validate::<Pointer>()?;
        registry.validate::<IndexItem>()?;
        registry.validate::<ResourceIdentifier>()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Directory holding the container and its companion files
    pub fn directory(&self) -> &Path {
        self.inner.path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn files(&self) -> &Arc<dyn FileSource> {
        &self.inner.files
    }

    /// Raw container bytes
    pub fn data(&self) -> &[u8] {
        &self.inner.data
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.inner.byte_order
    }

    pub fn build_string(&self) -> &str {
        &self.inner.build_string
    }

    pub fn kind(&self) -> CacheKind {
        self.inner.kind
    }

    /// Codec for resource pages
    pub fn codec(&self) -> ResourceCodec {
        self.inner.codec
    }

    pub fn header(&self) -> &CacheHeader {
        &self.inner.header
    }

    pub fn tag_index(&self) -> &TagIndex {
        &self.inner.tag_index
    }

    pub fn string_index(&self) -> &StringIndex {
        &self.inner.string_index
    }

    pub fn header_translator(&self) -> &Arc<MagicTranslator> {
        &self.inner.header_translator
    }

    pub fn metadata_translator(&self) -> &Arc<MagicTranslator> {
        &self.inner.metadata_translator
    }

    /// Tag by id
    pub fn tag(&self, id: i32) -> Result<&IndexItem> {
        self.inner
            .tag_index
            .get(id)
            .ok_or_else(|| BinaryError::missing_entry("tag", id))
    }

    /// The single tag of a system class
    pub fn system_tag(&self, code: ClassCode) -> Result<&IndexItem> {
        self.inner
            .tag_index
            .system_tag(code)
            .ok_or_else(|| BinaryError::MissingSystemTag(code.text()))
    }

    /// Resolve a string id
    pub fn get_string(&self, id: i32) -> &str {
        self.inner.string_index.get_string(id)
    }

    /// Localized strings, read from the globals tag on first use
    pub fn locale_index(&self) -> Result<Arc<LocaleIndex>> {
        self.inner
            .locale_index
            .get_or_try_init(|| {
                let kind = self.inner.kind;
                if kind.locale_layout().is_none() {
                    return Err(BinaryError::invalid_operation(format!(
                        "{} containers have no locale tables",
                        kind
                    )));
                }
                let magic = self.inner.header.locale_magic().ok_or_else(|| {
                    BinaryError::invalid_format("Header has no locale section")
                })?;
                let locale = MagicTranslator::with_magic("locale", magic);
                let globals = self.system_tag(GLOBALS_CLASS)?;

                let mut reader = DependencyReader::new(
                    BinaryReader::new(&self.inner.data, self.inner.byte_order),
                    Arc::new(self.metadata_registry(globals.id())?),
                );
                let index = LocaleIndex::read(&mut reader, globals.meta_address()?, kind, &locale)?;
                debug!(languages = index.languages().len(), "Read locale index");
                Ok(Arc::new(index))
            })
            .cloned()
    }

    /// Read a tag's metadata as `T`.
    ///
    /// Metadata of system tags is cached per requested type; other tags
    /// are read on every call.
    pub fn read_metadata<T>(&self, item: &IndexItem) -> Result<Arc<T>>
    where
        T: Structure + Send + Sync,
    {
        let cacheable = item.class_code().is_some_and(is_system_class);
        let key = (item.id(), TypeId::of::<T>());
        if cacheable {
            let cached = self.inner.metadata_cache.read().get(&key).cloned();
            if let Some(value) = cached.and_then(|entry| entry.downcast::<T>().ok()) {
                return Ok(value);
            }
        }

        let address = item.meta_address()?;
        let mut reader = DependencyReader::new(
            BinaryReader::new(&self.inner.data, self.inner.byte_order),
            Arc::new(self.metadata_registry(item.id())?),
        );
        reader.seek_absolute(address)?;
        let value = Arc::new(reader.read_object::<T>(Some(self.inner.kind.version()))?);

        if cacheable {
            let entry: Arc<dyn Any + Send + Sync> = value.clone();
            self.inner.metadata_cache.write().insert(key, entry);
        }
        Ok(value)
    }
}

impl fmt::Debug for CacheFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheFile")
            .field("path", &self.inner.path)
            .field("kind", &self.inner.kind)
            .field("build", &self.inner.build_string)
            .field("tags", &self.inner.tag_index.len())
            .field("strings", &self.inner.string_index.len())
            .finish()
    }
}

fn validate_header(header: &CacheHeader, length: usize) -> Result<()> {
    let length = i64::try_from(length).unwrap_or(i64::MAX);
    if header.file_size <= 0 || header.file_size > length {
        return Err(BinaryError::invalid_format(format!(
            "Header file size {} does not fit a {} byte container",
            header.file_size, length
        )));
    }
    Ok(())
}
