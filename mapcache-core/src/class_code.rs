//! Four character tag class codes

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A tag class code such as `scnr` or `zone`.
///
/// Stored as the four raw bytes in reading order. Codes are not required to be
/// alphanumeric (`ugh!` is a valid code) and may be padded with spaces.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ClassCode([u8; 4]);

impl ClassCode {
    /// Create a class code from its raw bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Create a class code from a big-endian packed integer (`0x73636E72` is `scnr`)
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    /// The packed big-endian integer form of the code
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// The raw bytes of the code
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Code as text, with trailing padding removed
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0)
            .trim_end_matches(|c| c == '\0' || c == ' ')
            .to_string()
    }
}

impl FromStr for ClassCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 {
            return Err(CoreError::invalid_class_code(s));
        }

        // short codes are space padded, the way the tools display them
        let mut code = [b' '; 4];
        code[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(code))
    }
}

impl fmt::Display for ClassCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}
