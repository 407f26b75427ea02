//! Error types for cache parsing

use mapcache_core::CoreError;
use thiserror::Error;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, BinaryError>;

/// Errors that can occur while reading a cache container
#[derive(Error, Debug)]
pub enum BinaryError {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the core crate
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Invalid file format
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Not enough data
    #[error("Not enough data: expected {expected}, got {actual}")]
    NotEnoughData { expected: usize, actual: usize },

    /// A schema or registry declaration is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No offset candidate covers the requested version
    #[error("No offset for {record}.{field} at version {version}")]
    NoApplicableOffset {
        record: &'static str,
        field: &'static str,
        version: i32,
    },

    /// A pointer translated to something outside the addressable range
    #[error("Address translation failed in {space}: {detail}")]
    AddressTranslation { space: &'static str, detail: String },

    /// A table lookup that does not exist
    #[error("{table} has no entry {index}")]
    MissingEntry { table: &'static str, index: i64 },

    /// A system tag the operation depends on is absent
    #[error("Missing system tag '{0}'")]
    MissingSystemTag(String),

    /// A resource could not be located
    #[error("Resource {id:#010x} not found: {reason}")]
    ResourceNotFound { id: u32, reason: String },

    /// Decompression failed
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// An operation was attempted in the wrong state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Broad error classes, used to decide whether a failure aborts the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A declaration problem, raised before any bytes are read
    Configuration,
    /// A decode failure in one table, record or field
    Data,
    /// Storage failures, propagated unchanged
    Io,
}

impl BinaryError {
    /// Create a new invalid format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a new invalid data error
    pub fn invalid_data<S: Into<String>>(msg: S) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create a new not enough data error
    pub fn not_enough_data(expected: usize, actual: usize) -> Self {
        Self::NotEnoughData { expected, actual }
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new address translation error
    pub fn address_translation<S: Into<String>>(space: &'static str, detail: S) -> Self {
        Self::AddressTranslation {
            space,
            detail: detail.into(),
        }
    }

    /// Create a new missing entry error
    pub fn missing_entry(table: &'static str, index: impl Into<i64>) -> Self {
        Self::MissingEntry {
            table,
            index: index.into(),
        }
    }

    /// Create a new resource not found error
    pub fn resource_not_found<S: Into<String>>(id: u32, reason: S) -> Self {
        Self::ResourceNotFound {
            id,
            reason: reason.into(),
        }
    }

    /// Create a new decompression failed error
    pub fn decompression_failed<S: Into<String>>(msg: S) -> Self {
        Self::DecompressionFailed(msg.into())
    }

    /// Create a new invalid operation error
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            BinaryError::Io(_) => ErrorCategory::Io,
            BinaryError::Configuration(_) | BinaryError::InvalidOperation(_) => {
                ErrorCategory::Configuration
            }
            _ => ErrorCategory::Data,
        }
    }

    /// Check whether the caller may skip the failing record and continue
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::Data
    }
}

// Conversion from other error types
impl From<lz4_flex::block::DecompressError> for BinaryError {
    fn from(err: lz4_flex::block::DecompressError) -> Self {
        Self::decompression_failed(format!("LZ4 block error: {}", err))
    }
}

impl From<std::string::FromUtf8Error> for BinaryError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::invalid_data(format!("Invalid UTF-8 string: {}", err))
    }
}
