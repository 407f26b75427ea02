//! Address spaces
//!
//! Stored pointers are virtual addresses in one of the container's address
//! spaces. A translator maps them to file offsets with a per-container
//! magic: `address = pointer - magic` and `pointer = address + magic`.

use crate::dependency::Constructible;
use crate::error::{BinaryError, Result};
use mapcache_core::PointerExpansion;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Maps between stored pointers and file offsets
pub trait AddressTranslator: Send + Sync + fmt::Debug {
    /// Name of the address space, used in errors
    fn space(&self) -> &'static str;

    fn get_address(&self, pointer: u64) -> Result<u64>;

    fn get_pointer(&self, address: u64) -> Result<u64>;
}

impl Constructible for Arc<dyn AddressTranslator> {}

/// Translator for one address space with a magic assigned exactly once
#[derive(Debug)]
pub struct MagicTranslator {
    space: &'static str,
    magic: OnceCell<i64>,
}

impl MagicTranslator {
    pub fn new(space: &'static str) -> Self {
        Self {
            space,
            magic: OnceCell::new(),
        }
    }

    /// Translator for pointers stored in the header (string and name tables)
    pub fn header() -> Self {
        Self::new("header")
    }

    /// Translator for pointers into tag metadata
    pub fn metadata() -> Self {
        Self::new("metadata")
    }

    /// Translator with the magic already assigned
    pub fn with_magic(space: &'static str, magic: i64) -> Self {
        let translator = Self::new(space);
        let _ = translator.magic.set(magic);
        translator
    }

    pub fn set_magic(&self, magic: i64) -> Result<()> {
        self.magic.set(magic).map_err(|_| {
            BinaryError::invalid_operation(format!("{} magic is already set", self.space))
        })
    }

    pub fn magic(&self) -> Result<i64> {
        self.magic.get().copied().ok_or_else(|| {
            BinaryError::invalid_operation(format!("{} magic has not been set", self.space))
        })
    }

    fn to_unsigned(&self, value: i128, what: &str, input: u64) -> Result<u64> {
        u64::try_from(value).map_err(|_| {
            BinaryError::address_translation(
                self.space,
                format!("{} {:#x} translates out of range ({})", what, input, value),
            )
        })
    }
}

impl AddressTranslator for MagicTranslator {
    fn space(&self) -> &'static str {
        self.space
    }

    fn get_address(&self, pointer: u64) -> Result<u64> {
        let magic = self.magic()?;
        self.to_unsigned(i128::from(pointer) - i128::from(magic), "pointer", pointer)
    }

    fn get_pointer(&self, address: u64) -> Result<u64> {
        let magic = self.magic()?;
        self.to_unsigned(i128::from(address) + i128::from(magic), "address", address)
    }
}

/// Widens truncated 32-bit pointers before translation
pub trait PointerExpander: Send + Sync + fmt::Debug {
    fn expand(&self, raw: u32) -> Result<u64>;
}

impl Constructible for Arc<dyn PointerExpander> {}

/// `base + (raw << shift)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftExpander {
    shift: u32,
    base: u64,
}

impl ShiftExpander {
    pub fn new(shift: u32, base: u64) -> Self {
        Self { shift, base }
    }
}

impl From<PointerExpansion> for ShiftExpander {
    fn from(expansion: PointerExpansion) -> Self {
        Self::new(expansion.shift, expansion.base)
    }
}

impl PointerExpander for ShiftExpander {
    fn expand(&self, raw: u32) -> Result<u64> {
        u64::from(raw)
            .checked_shl(self.shift)
            .filter(|shifted| shifted >> self.shift == u64::from(raw))
            .and_then(|shifted| shifted.checked_add(self.base))
            .ok_or_else(|| {
                BinaryError::address_translation(
                    "expander",
                    format!("{:#x} overflows when expanded", raw),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_magic_set_once() {
        let translator = MagicTranslator::header();
        assert!(matches!(
            translator.get_address(0x100),
            Err(BinaryError::InvalidOperation(_))
        ));
        translator.set_magic(0x1000).unwrap();
        assert!(translator.set_magic(0x2000).is_err());
        assert_eq!(translator.magic().unwrap(), 0x1000);
    }

    #[test]
    fn test_translation() {
        let translator = MagicTranslator::with_magic("metadata", 0x8000_0000);
        assert_eq!(translator.get_address(0x8000_1234).unwrap(), 0x1234);
        assert_eq!(translator.get_pointer(0x1234).unwrap(), 0x8000_1234);

        let err = translator.get_address(0x10).unwrap_err();
        assert!(matches!(
            err,
            BinaryError::AddressTranslation {
                space: "metadata",
                ..
            }
        ));
    }

    #[test]
    fn test_negative_magic() {
        let translator = MagicTranslator::with_magic("header", -0x400);
        assert_eq!(translator.get_address(0x10).unwrap(), 0x410);
        assert!(translator.get_pointer(0x10).is_err());
    }

    #[test]
    fn test_expander() {
        let expander = ShiftExpander::new(2, 0x5000_0000);
        assert_eq!(expander.expand(0x10).unwrap(), 0x5000_0040);
        assert_eq!(
            expander.expand(u32::MAX).unwrap(),
            0x5000_0000 + (u64::from(u32::MAX) << 2)
        );
        assert!(ShiftExpander::new(40, 0).expand(u32::MAX).is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip_from_pointer(magic in any::<i64>(), pointer in any::<u64>()) {
            let translator = MagicTranslator::with_magic("prop", magic);
            if let Ok(address) = translator.get_address(pointer) {
                prop_assert_eq!(translator.get_pointer(address).unwrap(), pointer);
            }
        }

        #[test]
        fn prop_round_trip_from_address(magic in any::<i64>(), address in any::<u64>()) {
            let translator = MagicTranslator::with_magic("prop", magic);
            if let Ok(pointer) = translator.get_pointer(address) {
                prop_assert_eq!(translator.get_address(pointer).unwrap(), address);
            }
        }
    }
}
