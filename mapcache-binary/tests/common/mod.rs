//! Synthetic Reach retail containers for integration tests
//!
//! File layout (big-endian):
//!
//! | offset   | contents                                  |
//! |----------|-------------------------------------------|
//! | 0x0000   | header (40960 bytes)                      |
//! | 0xA000   | string offsets, then the string blob      |
//! | 0xA200   | name offsets, then the name blob          |
//! | 0xB000   | resource data table                       |
//! | 0xC000   | tag metadata (index, tables, system tags) |

#![allow(dead_code)]

use aes::Aes128;
use cbc::Encryptor;
use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use mapcache_binary::crypto::{derive_key, padded_length};
use mapcache_core::{FILE_NAMES_KEY, HEAD_MAGIC, STRINGS_KEY};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

pub const BUILD: &str = "11860.10.07.24.0147.omaha_relea";
pub const SCENARIO: &str = "levels\\test\\test";

const STRING_OFFSETS: usize = 0xA000;
const STRING_BLOB: usize = 0xA100;
const NAME_OFFSETS: usize = 0xA200;
const NAME_BLOB: usize = 0xA300;
const DATA_TABLE: usize = 0xB000;
const DATA_TABLE_SIZE: usize = 0x1000;
const METADATA: usize = 0xC000;
const VIRTUAL_BASE: u32 = 0x8000_0000;
const TOTAL_SIZE: usize = 0xD000;

const CLASSES: usize = 0xC040;
const TAGS: usize = 0xC100;
const ZONE: usize = 0xC200;
const PLAY: usize = 0xC300;
const GESTALT_ENTRIES: usize = 0xC400;
const PAGES: usize = 0xC600;
const SEGMENTS: usize = 0xC780;
const SHARED_CACHES: usize = 0xC800;
pub const BITMAP: usize = 0xCA00;

/// Data table offset of the companion file, stored at header offset 1136
const SHARED_DATA_TABLE: usize = 0x800;
const SHARED_PAGE_OFFSET: usize = 0x20;

/// Tag records: class index and metadata offset (0 for none)
pub const TAGS_TABLE: [(i16, usize); 5] = [(0, ZONE), (-1, 0), (1, PLAY), (2, 0), (2, BITMAP)];
/// File names, one per tag record
pub const NAMES: [Option<&str>; 5] = [
    Some("levels\\test\\zone"),
    None,
    Some("levels\\test\\play"),
    None,
    None,
];
pub const STRINGS: [Option<&str>; 3] = [Some("default"), None, Some("name")];

/// Gestalt row of each resource used by the tests
pub const LOCAL_ROW: u32 = 0;
pub const SHARED_ROW: u32 = 1;
pub const NO_SEGMENT_ROW: u32 = 2;
pub const NO_DATA_ROW: u32 = 3;
/// Secondary page has no data; the primary page is the local one
pub const FALLBACK_ROW: u32 = 4;
/// Secondary page is empty and the primary page has no data
pub const DEAD_FALLBACK_ROW: u32 = 5;

/// Offset of the local resource inside its page
pub const LOCAL_CHUNK_OFFSET: usize = 16;
/// Offset of the shared resource inside its page
pub const SHARED_CHUNK_OFFSET: usize = 4;

pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
    /// Decompressed bytes of the local page
    pub local_page: Vec<u8>,
    /// Bytes of the stored page in the companion file
    pub shared_page: Vec<u8>,
}

struct Buffer(Vec<u8>);

impl Buffer {
    fn new(size: usize) -> Self {
        Self(vec![0u8; size])
    }

    fn bytes(&mut self, at: usize, bytes: &[u8]) {
        self.0[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn u32(&mut self, at: usize, value: u32) {
        self.bytes(at, &value.to_be_bytes());
    }

    fn i32(&mut self, at: usize, value: i32) {
        self.bytes(at, &value.to_be_bytes());
    }

    fn i16(&mut self, at: usize, value: i16) {
        self.bytes(at, &value.to_be_bytes());
    }

    /// A tag block reference: count and pointer
    fn block(&mut self, at: usize, count: usize, target: usize) {
        self.i32(at, count as i32);
        self.u32(at + 4, meta(target));
    }
}

/// Metadata pointer for a file offset
pub fn meta(offset: usize) -> u32 {
    VIRTUAL_BASE + (offset - METADATA) as u32
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn encrypt(plain: &[u8], key: &str) -> Vec<u8> {
    let (cipher_key, iv) = derive_key(key).unwrap();
    let mut buffer = plain.to_vec();
    buffer.resize(padded_length(plain.len()), 0);
    if buffer.is_empty() {
        return buffer;
    }
    let length = buffer.len();
    Encryptor::<Aes128>::new_from_slices(&cipher_key, &iv)
        .unwrap()
        .encrypt_padded_mut::<NoPadding>(&mut buffer, length)
        .unwrap();
    buffer
}

/// Offsets and blob of a string table; `None` entries get offset -1
fn string_table(entries: &[Option<&str>]) -> (Vec<i32>, Vec<u8>) {
    let mut offsets = Vec::new();
    let mut blob = Vec::new();
    for entry in entries {
        match entry {
            Some(text) => {
                offsets.push(blob.len() as i32);
                blob.extend_from_slice(text.as_bytes());
                blob.push(0);
            }
            None => offsets.push(-1),
        }
    }
    (offsets, blob)
}

fn write_table(
    buffer: &mut Buffer,
    offsets_at: usize,
    blob_at: usize,
    entries: &[Option<&str>],
    key: &str,
) -> usize {
    let (offsets, blob) = string_table(entries);
    for (i, offset) in offsets.iter().enumerate() {
        buffer.i32(offsets_at + i * 4, *offset);
    }
    buffer.bytes(blob_at, &encrypt(&blob, key));
    blob.len()
}

fn header(buffer: &mut Buffer, strings_size: usize, names_size: usize) {
    buffer.u32(0, HEAD_MAGIC);
    buffer.i32(8, TOTAL_SIZE as i32);
    buffer.u32(16, meta(METADATA));
    buffer.bytes(284, BUILD.as_bytes());

    // Header magic is zero: header pointers are file offsets
    buffer.i32(344, STRINGS.len() as i32);
    buffer.i32(348, strings_size as i32);
    buffer.u32(352, STRING_OFFSETS as u32);
    buffer.u32(356, STRING_BLOB as u32);

    buffer.bytes(432, SCENARIO.as_bytes());

    buffer.i32(692, NAMES.len() as i32);
    buffer.u32(696, NAME_BLOB as u32);
    buffer.i32(700, names_size as i32);
    buffer.u32(704, NAME_OFFSETS as u32);

    buffer.u32(744, VIRTUAL_BASE);
    buffer.i32(1136, DATA_TABLE as i32);
    buffer.i32(1160, DATA_TABLE_SIZE as i32);
}

fn tag_index(buffer: &mut Buffer) {
    buffer.i32(METADATA, 3);
    buffer.u32(METADATA + 4, meta(CLASSES));
    buffer.i32(METADATA + 8, TAGS_TABLE.len() as i32);
    buffer.u32(METADATA + 12, meta(TAGS));

    for (i, code) in [b"zone", b"play", b"bitm"].iter().enumerate() {
        buffer.bytes(CLASSES + i * 16, *code);
        buffer.i32(CLASSES + i * 16 + 12, i as i32);
    }

    for (i, (class, offset)) in TAGS_TABLE.iter().enumerate() {
        buffer.i16(TAGS + i * 8, *class);
        buffer.i16(TAGS + i * 8 + 2, 0x1000 + i as i16);
        if *offset != 0 {
            buffer.u32(TAGS + i * 8 + 4, meta(*offset));
        }
    }
}

/// `zone` and `play` metadata and the local page
fn resources(buffer: &mut Buffer, compressed_local: &[u8], local_len: usize, shared_len: usize) {
    // Segment index of each gestalt row
    let rows: [i16; 6] = [0, 1, -1, 2, 3, 4];
    buffer.block(ZONE + 88, rows.len(), GESTALT_ENTRIES);
    for (i, segment) in rows.iter().enumerate() {
        buffer.i16(GESTALT_ENTRIES + i * 64 + 34, *segment);
    }

    buffer.block(PLAY + 12, 1, SHARED_CACHES);
    buffer.block(PLAY + 24, 4, PAGES);
    buffer.block(PLAY + 48, 5, SEGMENTS);

    buffer.bytes(SHARED_CACHES, b"maps\\shared.map");

    // cache index, data offset, compressed size, decompressed size
    let pages: [(i16, i32, usize, usize); 4] = [
        (-1, 0, compressed_local.len(), local_len),
        (0, SHARED_PAGE_OFFSET as i32, shared_len, shared_len),
        (-1, -1, 0, 0),
        (-1, 0, 0, 0),
    ];
    for (i, (cache, offset, compressed, decompressed)) in pages.iter().enumerate() {
        let at = PAGES + i * 88;
        buffer.i16(at + 4, *cache);
        buffer.i32(at + 8, *offset);
        buffer.i32(at + 12, *compressed as i32);
        buffer.i32(at + 16, *decompressed as i32);
    }

    // primary page, secondary page, primary offset, secondary offset
    let segments: [(i16, i16, i32, i32); 5] = [
        (0, -1, LOCAL_CHUNK_OFFSET as i32, -1),
        (1, -1, SHARED_CHUNK_OFFSET as i32, -1),
        (2, -1, 0, -1),
        (0, 2, LOCAL_CHUNK_OFFSET as i32, 0),
        (2, 3, 0, 0),
    ];
    for (i, (primary, secondary, primary_offset, secondary_offset)) in segments.iter().enumerate() {
        let at = SEGMENTS + i * 16;
        buffer.i16(at, *primary);
        buffer.i16(at + 2, *secondary);
        buffer.i32(at + 4, *primary_offset);
        buffer.i32(at + 8, *secondary_offset);
    }

    buffer.bytes(DATA_TABLE, compressed_local);
}

/// A bitmap-like record: width, height and a resource identifier
fn bitmap(buffer: &mut Buffer) {
    buffer.i16(BITMAP, 64);
    buffer.i16(BITMAP + 2, 32);
    buffer.u32(BITMAP + 4, 0x0007_0000 | LOCAL_ROW);
}

fn shared_container(page: &[u8]) -> Vec<u8> {
    let mut buffer = Buffer::new(0x1000);
    buffer.u32(0, HEAD_MAGIC);
    buffer.i32(1136, SHARED_DATA_TABLE as i32);
    buffer.bytes(SHARED_DATA_TABLE + SHARED_PAGE_OFFSET, page);
    buffer.0
}

/// Build the container and its companion in a fresh temporary directory
pub fn build() -> Fixture {
    let local_page: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
    let shared_page: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(3)).collect();
    let compressed = deflate(&local_page);

    let mut buffer = Buffer::new(TOTAL_SIZE);
    let strings_size = write_table(&mut buffer, STRING_OFFSETS, STRING_BLOB, &STRINGS, STRINGS_KEY);
    let names_size = write_table(&mut buffer, NAME_OFFSETS, NAME_BLOB, &NAMES, FILE_NAMES_KEY);
    header(&mut buffer, strings_size, names_size);
    tag_index(&mut buffer);
    resources(&mut buffer, &compressed, local_page.len(), shared_page.len());
    bitmap(&mut buffer);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.map");
    std::fs::write(&path, &buffer.0).unwrap();
    std::fs::write(dir.path().join("shared.map"), shared_container(&shared_page)).unwrap();

    Fixture {
        dir,
        path,
        local_page,
        shared_page,
    }
}
