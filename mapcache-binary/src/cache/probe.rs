//! Container detection

use crate::error::{BinaryError, Result};
use crate::reader::{BinaryReader, ByteOrder};
use mapcache_core::{BUILD_STRING_LENGTH, CacheKind, HEAD_MAGIC};

/// Offset of the build string in big-endian containers
const BUILD_OFFSET_BIG: u64 = 284;
/// Offset of the build string in little-endian containers
const BUILD_OFFSET_LITTLE: u64 = 288;

/// What can be learned about a container from its first bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheProbe {
    pub byte_order: ByteOrder,
    pub build_string: String,
}

impl CacheProbe {
    /// Detect byte order from the `head` magic and read the build string
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let reader = BinaryReader::new(data, ByteOrder::Big);
        let magic = reader.peek_u32()?;
        let byte_order = if magic == HEAD_MAGIC {
            ByteOrder::Big
        } else if magic.swap_bytes() == HEAD_MAGIC {
            ByteOrder::Little
        } else {
            return Err(BinaryError::invalid_format(format!(
                "Not a cache file (magic {:#010x})",
                magic
            )));
        };

        let mut reader = BinaryReader::new(data, byte_order);
        reader.seek(match byte_order {
            ByteOrder::Big => BUILD_OFFSET_BIG,
            ByteOrder::Little => BUILD_OFFSET_LITTLE,
        })?;
        let build_string = reader.read_cstring_max(BUILD_STRING_LENGTH)?;

        Ok(Self {
            byte_order,
            build_string,
        })
    }

    /// Container kind implied by the probe.
    ///
    /// Little-endian containers are always the PC generation; big-endian
    /// ones are identified by build string.
    pub fn kind(&self) -> Result<CacheKind> {
        match self.byte_order {
            ByteOrder::Little => Ok(CacheKind::MccHaloReach),
            ByteOrder::Big => Ok(CacheKind::from_build_string(&self.build_string)?),
        }
    }
}

/// Quick check for the `head` magic in either byte order
pub fn is_cache_file(data: &[u8]) -> bool {
    CacheProbe::from_bytes(data).is_ok()
}
