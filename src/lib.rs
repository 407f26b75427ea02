//! Blam Map Cache Parser
//!
//! A Rust reader for the map cache containers of the Blam engine (Halo:
//! Reach, Halo 4 and Reach on PC).
//!
//! This crate re-exports the core identifiers and the container parser so
//! that applications depend on a single crate.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mapcache::{CacheFile, SCENARIO_CLASS};
//!
//! let cache = CacheFile::open("maps/m10.map")?;
//! let scenario = cache.system_tag(SCENARIO_CLASS)?;
//! println!("scenario: {}", scenario.path().unwrap_or("<unnamed>"));
//! println!("{} tags, {} strings", cache.tag_index().len(), cache.string_index().len());
//!
//! # Ok::<(), mapcache::BinaryError>(())
//! ```

// Re-export from core and binary crates
pub use mapcache_core::{
    CacheKind, ClassCode, CoreError, LocaleLayout, PointerExpansion, RemapWindow, ResourceCodec,
    constants::*,
};

pub use mapcache_binary::{
    AddressTranslator, BinaryError, BinaryReader, ByteOrder, CacheFile, CacheHeader,
    CacheLoadOptions, CacheProbe, Decompressor, DependencyReader, DependencyRegistry,
    ErrorCategory, FieldDescriptor, FileSource, IndexItem, Language, LocalFileSystem, LocaleIndex,
    LocaleTable, MagicTranslator,
    MemoryFileSystem, PageType, Pointer, Pointer64, ReadContext, ResourceIdentifier, Result,
    StringId, StringIndex, Structure, TagBlock, TagClass, TagIndex, TypeSchema, VersionRange,
    is_cache_file,
};

/// Record schemas and the generic reader
pub mod schema {
    pub use mapcache_binary::schema::*;
}

/// Resource tables and page resolution
pub mod resource {
    pub use mapcache_binary::resource::*;
}
