//! Error types shared by the cache crates

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while interpreting container-level identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A class code that is not exactly four bytes
    #[error("Invalid class code '{code}': expected 4 bytes, got {len}")]
    InvalidClassCode { code: String, len: usize },

    /// A build string with no known container kind
    #[error("Unknown build '{build}'")]
    UnknownBuild { build: String },

    /// A container kind name that could not be parsed
    #[error("Unknown cache kind '{name}'")]
    UnknownKind { name: String },
}

impl CoreError {
    /// Create an invalid class code error
    pub fn invalid_class_code<S: Into<String>>(code: S) -> Self {
        let code = code.into();
        Self::InvalidClassCode {
            len: code.len(),
            code,
        }
    }

    /// Create an unknown build error
    pub fn unknown_build<S: Into<String>>(build: S) -> Self {
        Self::UnknownBuild {
            build: build.into(),
        }
    }

    /// Create an unknown kind error
    pub fn unknown_kind<S: Into<String>>(name: S) -> Self {
        Self::UnknownKind { name: name.into() }
    }
}
