//! Table decryption
//!
//! Name and string tables in the Xbox generations are AES-128-CBC encrypted
//! with a fixed ASCII key. The cipher key is the ASCII bytes XOR `0xA5`, the
//! IV is the cipher key XOR `0x3C`, and ciphertext is a whole number of
//! blocks with no padding scheme.

use crate::error::{BinaryError, Result};
use crate::reader::BinaryReader;
use aes::Aes128;
use cbc::Decryptor;
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};

type Aes128CbcDec = Decryptor<Aes128>;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// Round `length` up to a whole number of blocks
pub fn padded_length(length: usize) -> usize {
    length.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Cipher key and IV derived from a table key
pub fn derive_key(key: &str) -> Result<([u8; 16], [u8; 16])> {
    let bytes = key.as_bytes();
    if bytes.len() != 16 {
        return Err(BinaryError::DecryptionFailed(format!(
            "Key must be 16 bytes, got {}",
            bytes.len()
        )));
    }
    let mut cipher_key = [0u8; 16];
    let mut iv = [0u8; 16];
    for (i, byte) in bytes.iter().enumerate() {
        cipher_key[i] = byte ^ 0xA5;
        iv[i] = cipher_key[i] ^ 0x3C;
    }
    Ok((cipher_key, iv))
}

/// Decrypt a block-aligned buffer with a table key
pub fn decrypt_fixed_key(ciphertext: &[u8], key: &str) -> Result<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(BinaryError::DecryptionFailed(format!(
            "Ciphertext length {} is not a multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }
    let (cipher_key, iv) = derive_key(key)?;
    if ciphertext.is_empty() {
        return Ok(Vec::new());
    }
    let cipher = Aes128CbcDec::new_from_slices(&cipher_key, &iv)
        .map_err(|e| BinaryError::DecryptionFailed(e.to_string()))?;
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|e| BinaryError::DecryptionFailed(e.to_string()))?;
    Ok(buffer)
}

/// Read `length` bytes of table data rounded up to the block size and
/// decrypt them.
///
/// The table itself must fit in the buffer; only the rounding of the final
/// block may run past the end, and those bytes are read as zeros.
pub fn read_encrypted(reader: &mut BinaryReader<'_>, length: usize, key: &str) -> Result<Vec<u8>> {
    if length > reader.remaining() {
        return Err(BinaryError::not_enough_data(length, reader.remaining()));
    }
    let ciphertext = reader.read_bytes_padded(padded_length(length));
    decrypt_fixed_key(&ciphertext, key)
}
