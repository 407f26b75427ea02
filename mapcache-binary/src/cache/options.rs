//! Container loading options

use mapcache_core::{CacheKind, ResourceCodec};

/// Options for opening a container
#[derive(Debug, Clone)]
pub struct CacheLoadOptions {
    /// Force a container kind instead of detecting it from the build string
    pub kind: Option<CacheKind>,
    /// Override the kind's resource page codec
    pub resource_codec: Option<ResourceCodec>,
    /// Check the header file size against the container length
    pub validate_header: bool,
    /// Read the metadata of every system tag during open
    pub preload_system_tags: bool,
}

impl Default for CacheLoadOptions {
    fn default() -> Self {
        Self {
            kind: None,
            resource_codec: None,
            validate_header: true,
            preload_system_tags: false,
        }
    }
}

impl CacheLoadOptions {
    /// Create options for fast loading (no validation)
    pub fn fast() -> Self {
        Self {
            validate_header: false,
            ..Self::default()
        }
    }

    /// Create options that validate the header and resolve the resource
    /// tables up front
    pub fn strict() -> Self {
        Self {
            validate_header: true,
            preload_system_tags: true,
            ..Self::default()
        }
    }

    /// Force a container kind
    pub fn with_kind(mut self, kind: CacheKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Override the resource page codec
    pub fn with_codec(mut self, codec: ResourceCodec) -> Self {
        self.resource_codec = Some(codec);
        self
    }
}
