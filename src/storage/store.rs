use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use parking_lot::Mutex;

use crate::core::error::{Result, StorageError};

/// Byte-addressed backing store for one heap file.
///
/// Writing at `offset == len()` grows the store. Stores perform no caching;
/// that is the buffer pool's job.
pub trait BlockStore: Send + Sync {
    /// Stable identity of the store; feeds the table id of the heap file.
    fn identity(&self) -> String;

    fn len(&self) -> Result<u64>;

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()>;

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

pub struct FileStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileStore {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let path = std::fs::canonicalize(path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockStore for FileStore {
    fn identity(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

/// In-memory store, mainly for tests and scratch tables.
pub struct MemoryStore {
    name: String,
    bytes: Mutex<Vec<u8>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes: Mutex::new(Vec::new()),
        }
    }
}

impl BlockStore for MemoryStore {
    fn identity(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn len(&self) -> Result<u64> {
        Ok(self.bytes.lock().len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let bytes = self.bytes.lock();
        let start = offset as usize;
        let end = start + buf.len();
        if end > bytes.len() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("read of {}..{} past end of store ({} bytes)", start, end, bytes.len()),
            )));
        }
        buf.copy_from_slice(&bytes[start..end]);
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut bytes = self.bytes.lock();
        let start = offset as usize;
        let end = start + buf.len();
        if end > bytes.len() {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(buf);
        Ok(())
    }
}
