//! Byte cursor for cache containers
//!
//! [`BinaryReader`] reads primitives in a configurable byte order from a
//! borrowed buffer. Positions are relative to the reader's origin, so a
//! virtual reader created at some record can address it from zero while
//! still sharing the underlying bytes.

use crate::error::{BinaryError, Result};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

/// Byte order for reading binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Big endian (Xbox 360 containers)
    #[default]
    Big,
    /// Little endian (PC containers)
    Little,
}

/// Binary reader over a borrowed buffer
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    origin: usize,
    position: usize,
    byte_order: ByteOrder,
}

macro_rules! read_primitive {
    ($(#[$doc:meta])* $name:ident, $peek:ident, $ty:ty, $size:expr, $read:ident) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.take($size)?;
            Ok(match self.byte_order {
                ByteOrder::Big => BigEndian::$read(bytes),
                ByteOrder::Little => LittleEndian::$read(bytes),
            })
        }

        /// Read the same value without advancing
        pub fn $peek(&self) -> Result<$ty> {
            self.clone().$name()
        }
    };
}

impl<'a> BinaryReader<'a> {
    /// Create a new binary reader from byte slice
    pub fn new(data: &'a [u8], byte_order: ByteOrder) -> Self {
        Self {
            data,
            origin: 0,
            position: 0,
            byte_order,
        }
    }

    /// Position relative to the origin
    pub fn position(&self) -> u64 {
        (self.position - self.origin) as u64
    }

    /// Position in the underlying buffer
    pub fn absolute_position(&self) -> u64 {
        self.position as u64
    }

    /// Offset of position zero in the underlying buffer
    pub fn origin(&self) -> u64 {
        self.origin as u64
    }

    /// Seek to a position relative to the origin
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        let target = usize::try_from(pos)
            .ok()
            .and_then(|pos| pos.checked_add(self.origin))
            .filter(|target| *target <= self.data.len())
            .ok_or_else(|| {
                BinaryError::not_enough_data(
                    (self.origin as u64).saturating_add(pos) as usize,
                    self.data.len(),
                )
            })?;
        self.position = target;
        Ok(())
    }

    /// Seek to a position in the underlying buffer.
    ///
    /// Translated addresses are always absolute; a virtual reader cannot
    /// seek before its own origin.
    pub fn seek_absolute(&mut self, address: u64) -> Result<()> {
        let origin = self.origin as u64;
        if address < origin {
            return Err(BinaryError::invalid_data(format!(
                "Address {:#x} lies before reader origin {:#x}",
                address, origin
            )));
        }
        self.seek(address - origin)
    }

    /// Move the position by a signed amount
    pub fn skip(&mut self, count: i64) -> Result<()> {
        let pos = self.position() as i64 + count;
        if pos < 0 {
            return Err(BinaryError::invalid_data(format!(
                "Seek before origin by {} bytes",
                -pos
            )));
        }
        self.seek(pos as u64)
    }

    /// Total length of the underlying buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the underlying buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes between the position and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if we have at least `count` bytes remaining
    pub fn has_bytes(&self, count: usize) -> bool {
        self.remaining() >= count
    }

    /// Get the current byte order
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Set the byte order
    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    /// Create a reader whose origin is the current position
    pub fn virtual_reader(&self) -> BinaryReader<'a> {
        BinaryReader {
            data: self.data,
            origin: self.position,
            position: self.position,
            byte_order: self.byte_order,
        }
    }

    /// Borrow the next `count` bytes and advance past them
    pub fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if !self.has_bytes(count) {
            return Err(BinaryError::not_enough_data(count, self.remaining()));
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Read a fixed number of bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        Ok(self.take(count)?.to_vec())
    }

    /// Read up to `count` bytes, zero filling whatever the buffer cannot supply
    pub fn read_bytes_padded(&mut self, count: usize) -> Vec<u8> {
        let available = count.min(self.remaining());
        let mut buffer = vec![0u8; count];
        buffer[..available].copy_from_slice(&self.data[self.position..self.position + available]);
        self.position += available;
        buffer
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a signed 8-bit integer
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a boolean (as u8, 0 = false, non-zero = true)
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_primitive!(
        /// Read an unsigned 16-bit integer
        read_u16, peek_u16, u16, 2, read_u16
    );
    read_primitive!(
        /// Read a signed 16-bit integer
        read_i16, peek_i16, i16, 2, read_i16
    );
    read_primitive!(
        /// Read an unsigned 32-bit integer
        read_u32, peek_u32, u32, 4, read_u32
    );
    read_primitive!(
        /// Read a signed 32-bit integer
        read_i32, peek_i32, i32, 4, read_i32
    );
    read_primitive!(
        /// Read an unsigned 64-bit integer
        read_u64, peek_u64, u64, 8, read_u64
    );
    read_primitive!(
        /// Read a signed 64-bit integer
        read_i64, peek_i64, i64, 8, read_i64
    );
    read_primitive!(
        /// Read a 32-bit floating point number
        read_f32, peek_f32, f32, 4, read_f32
    );
    read_primitive!(
        /// Read a 64-bit floating point number
        read_f64, peek_f64, f64, 8, read_f64
    );

    /// Read `count` consecutive 32-bit integers
    pub fn read_i32_array(&mut self, count: usize) -> Result<Vec<i32>> {
        (0..count).map(|_| self.read_i32()).collect()
    }

    /// Read a null-terminated string
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.position.min(self.data.len())..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| BinaryError::invalid_data("Unterminated string"))?;
        let bytes = self.take(end)?;
        self.position += 1;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Read a null-terminated string of at most `max_length` bytes.
    ///
    /// Reading stops after the terminator or once `max_length` bytes were
    /// consumed, whichever comes first.
    pub fn read_cstring_max(&mut self, max_length: usize) -> Result<String> {
        let window = max_length.min(self.remaining());
        let rest = &self.data[self.position..self.position + window];
        let (end, consumed) = match rest.iter().position(|&b| b == 0) {
            Some(end) => (end, end + 1),
            None if window == max_length => (window, window),
            None => return Err(BinaryError::not_enough_data(max_length, window)),
        };
        let bytes = rest[..end].to_vec();
        self.position += consumed;
        Ok(String::from_utf8(bytes)?)
    }

    /// Read a string with a 32-bit length prefix
    pub fn read_length_prefixed_string(&mut self) -> Result<String> {
        let length = self.read_u32()? as usize;
        let bytes = self.take(length)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Read a string occupying exactly `length` bytes.
    ///
    /// Trailing NULs are always dropped; `padding` is stripped from the end
    /// and `trim` additionally removes trailing whitespace.
    pub fn read_fixed_string(
        &mut self,
        length: usize,
        padding: Option<char>,
        trim: bool,
    ) -> Result<String> {
        let bytes = self.take(length)?;
        let text = String::from_utf8(bytes.to_vec())?;
        let mut text = text.trim_end_matches('\0');
        if let Some(pad) = padding {
            text = text.trim_end_matches(pad);
        }
        if trim {
            text = text.trim_end();
        }
        Ok(text.to_string())
    }
}
