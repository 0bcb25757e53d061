use std::path::Path;
use std::sync::Arc;
use logly::Logger;

use crate::core::config::StorageConfig;
use crate::core::error::Result;
use crate::storage::buffer::BufferPool;
use crate::storage::catalog::Catalog;
use crate::storage::heap_file::HeapFile;
use crate::storage::store::MemoryStore;
use crate::storage::tuple::TupleDesc;

/// A catalog plus the buffer pool that caches its tables' pages.
///
/// Everything that would otherwise be process-global hangs off this handle,
/// so tests can build as many independent databases as they like.
pub struct Database {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
    page_size: usize,
}

impl Database {
    pub fn new(config: &StorageConfig) -> Self {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(config.buffer_pool_size, catalog.clone()));
        Self {
            catalog,
            buffer_pool,
            page_size: config.page_size,
        }
    }

    pub fn with_logger(config: &StorageConfig, logger: Arc<Logger>) -> Self {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = BufferPool::new(config.buffer_pool_size, catalog.clone()).with_logger(logger);
        Self {
            catalog,
            buffer_pool: Arc::new(buffer_pool),
            page_size: config.page_size,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Opens (or creates) the heap file at `path` and registers it as `name`.
    pub fn create_table(&self, name: &str, path: &Path, desc: TupleDesc) -> Result<u32> {
        let file = HeapFile::open(path, desc, self.page_size)?;
        Ok(self.catalog.add_table(file, name, None))
    }

    /// Registers a table that lives only in memory.
    pub fn create_memory_table(&self, name: &str, desc: TupleDesc) -> Result<u32> {
        let file = HeapFile::new(Box::new(MemoryStore::new(name)), desc, self.page_size)?;
        Ok(self.catalog.add_table(file, name, None))
    }
}
