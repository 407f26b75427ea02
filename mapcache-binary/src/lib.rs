//! Blam Map Cache Parser
//!
//! This crate reads the versioned binary map containers of the Blam engine:
//! - Container header and both address spaces
//! - Tag index (classes, tags, tag paths, system tags)
//! - String id table
//! - Localized string tables of the globals tag
//! - Tag metadata through declarative record schemas
//! - Resource pages, including pages held by shared companion containers
//!
//! # Features
//!
//! - **Schema-driven records**: field offsets per container version, read
//!   with a single generic reader
//! - **Dependency resolution**: records that need context (translators, the
//!   owning container) are built by a scoped resolver
//! - **Table decryption**: AES-128-CBC name and string tables
//! - **Compression support**: Deflate and LZ4 resource pages
//!
//! # Example
//!
//! ```rust,no_run
//! use mapcache_binary::{CacheFile, PageType, ResourceIdentifier};
//!
//! let cache = CacheFile::open("maps/m10.map")?;
//! println!("{} ({})", cache.header().scenario_name, cache.kind());
//!
//! for tag in cache.tag_index().iter().take(10) {
//!     let class = tag.class_code().map(|c| c.text()).unwrap_or_default();
//!     println!("{:>6} {} {}", tag.id(), class, tag.path().unwrap_or("<unnamed>"));
//! }
//!
//! let resource = ResourceIdentifier::new(0x0001_0004, cache.clone());
//! let bytes = resource.read_data(PageType::Auto, usize::MAX)?;
//! println!("resource holds {} bytes", bytes.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod block;
pub mod cache;
pub mod compression;
pub mod crypto;
pub mod dependency;
pub mod dynamic;
pub mod error;
pub mod fs;
pub mod pointer;
pub mod reader;
pub mod resource;
pub mod schema;
pub mod translator;

// Re-export main types
pub use block::TagBlock;
pub use cache::{
    CacheFile, CacheHeader, CacheLoadOptions, CacheProbe, IndexItem, Language, LocaleIndex,
    LocaleTable, StringId, StringIndex, TagClass, TagIndex, is_cache_file,
};
pub use compression::Decompressor;
pub use dependency::{
    Constructible, Constructor, Dependency, DependencyReader, DependencyRegistry, ReadContext,
};
pub use error::{BinaryError, ErrorCategory, Result};
pub use fs::{FileSource, LocalFileSystem, MemoryFileSystem};
pub use pointer::{Pointer, Pointer64};
pub use reader::{BinaryReader, ByteOrder};
pub use resource::{PageType, ResourceIdentifier};
pub use schema::{
    FieldDescriptor, FieldValue, StringEncoding, Structure, TypeSchema, VersionRange, schema_of,
};
pub use translator::{AddressTranslator, MagicTranslator, PointerExpander, ShiftExpander};

/// Re-export of the core crate's identifiers
pub use mapcache_core::{CacheKind, ClassCode, ResourceCodec};
