//! Map Cache Core
//!
//! Core identifiers and per-generation configuration for Blam map cache
//! parsing. This crate holds the pieces that are pure data: class codes,
//! well-known constants and the table of container generations.

pub mod cache_kind;
pub mod class_code;
pub mod constants;
pub mod error;

// Re-export main types
pub use cache_kind::{CacheKind, LocaleLayout, PointerExpansion, RemapWindow, ResourceCodec};
pub use class_code::ClassCode;
pub use constants::*;
pub use error::{CoreError, Result};
