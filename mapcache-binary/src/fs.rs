//! File access for containers and their companion files

use crate::error::{BinaryError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Random-access reads of whole files or byte ranges
pub trait FileSource: Send + Sync + fmt::Debug {
    /// Read an entire file
    fn read_all(&self, path: &Path) -> Result<Arc<[u8]>>;

    /// Read `length` bytes at `offset`; short reads are an error
    fn read_at(&self, path: &Path, offset: u64, length: usize) -> Result<Vec<u8>>;

    fn exists(&self, path: &Path) -> bool;
}

/// Files on the local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSource for LocalFileSystem {
    fn read_all(&self, path: &Path) -> Result<Arc<[u8]>> {
        Ok(std::fs::read(path)?.into())
    }

    fn read_at(&self, path: &Path, offset: u64, length: usize) -> Result<Vec<u8>> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = Vec::with_capacity(length);
        let read = file.by_ref().take(length as u64).read_to_end(&mut buffer)?;
        if read < length {
            return Err(BinaryError::not_enough_data(length, read));
        }
        Ok(buffer)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory files keyed by path
#[derive(Default)]
pub struct MemoryFileSystem {
    files: RwLock<HashMap<PathBuf, Arc<[u8]>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Arc<[u8]>>) {
        self.files.write().insert(path.into(), data.into());
    }

    fn get(&self, path: &Path) -> Result<Arc<[u8]>> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            BinaryError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not in memory", path.display()),
            ))
        })
    }
}

impl fmt::Debug for MemoryFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let files = self.files.read();
        f.debug_struct("MemoryFileSystem")
            .field("files", &files.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FileSource for MemoryFileSystem {
    fn read_all(&self, path: &Path) -> Result<Arc<[u8]>> {
        self.get(path)
    }

    fn read_at(&self, path: &Path, offset: u64, length: usize) -> Result<Vec<u8>> {
        let data = self.get(path)?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(length).min(data.len());
        if end - start < length {
            return Err(BinaryError::not_enough_data(length, end - start));
        }
        Ok(data[start..end].to_vec())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }
}
