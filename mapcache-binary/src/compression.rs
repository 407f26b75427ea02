//! Resource page decompression

use crate::error::{BinaryError, Result};
use flate2::read::DeflateDecoder;
use mapcache_core::ResourceCodec;
use std::io::Read;

/// Expands one compressed page to its declared size
pub trait Decompressor: Send + Sync {
    fn decompress(&self, data: &[u8], decompressed_len: usize) -> Result<Vec<u8>>;
}

impl Decompressor for ResourceCodec {
    fn decompress(&self, data: &[u8], decompressed_len: usize) -> Result<Vec<u8>> {
        if decompressed_len == 0 {
            return Ok(Vec::new());
        }
        match self {
            ResourceCodec::Stored => decompress_stored(data, decompressed_len),
            ResourceCodec::Deflate => decompress_deflate(data, decompressed_len),
            ResourceCodec::Lz4 => decompress_lz4(data, decompressed_len),
        }
    }
}

fn decompress_stored(data: &[u8], decompressed_len: usize) -> Result<Vec<u8>> {
    if data.len() < decompressed_len {
        return Err(BinaryError::decompression_failed(format!(
            "Stored page holds {} bytes, expected {}",
            data.len(),
            decompressed_len
        )));
    }
    Ok(data[..decompressed_len].to_vec())
}

/// Raw deflate stream (no zlib or gzip wrapper)
fn decompress_deflate(data: &[u8], decompressed_len: usize) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::with_capacity(decompressed_len);
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| BinaryError::decompression_failed(format!("Deflate error: {}", e)))?;
    check_length("Deflate", decompressed, decompressed_len)
}

/// LZ4 block format
fn decompress_lz4(data: &[u8], decompressed_len: usize) -> Result<Vec<u8>> {
    let decompressed = lz4_flex::block::decompress(data, decompressed_len)?;
    check_length("LZ4", decompressed, decompressed_len)
}

fn check_length(codec: &str, data: Vec<u8>, expected: usize) -> Result<Vec<u8>> {
    if data.len() != expected {
        return Err(BinaryError::decompression_failed(format!(
            "{} produced {} bytes, expected {}",
            codec,
            data.len(),
            expected
        )));
    }
    Ok(data)
}
