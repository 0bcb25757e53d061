use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use lru::LruCache;
use logly::Logger;

use crate::core::error::{Result, StorageError};
use crate::storage::catalog::Catalog;
use crate::storage::ids::PageId;
use crate::storage::page::HeapPage;
use crate::storage::transaction::{Permissions, TransactionId};
use crate::storage::tuple::Tuple;

pub const DEFAULT_POOL_PAGES: usize = 50;

/// A cached page. The frame is shared with callers; they must not hold its
/// guard while calling back into the pool.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Bounded LRU cache of heap pages with write-back on eviction.
///
/// All map bookkeeping happens under one mutex. The I/O done while holding
/// it is limited to one page: the read that fills a miss, or the write-back
/// of a single eviction victim.
pub struct BufferPool {
    capacity: usize,
    pages: Mutex<LruCache<PageId, PageRef>>,
    catalog: Arc<Catalog>,
    logger: Option<Arc<Logger>>,
}

impl BufferPool {
    /// `capacity` is clamped to at least one frame.
    pub fn new(capacity: usize, catalog: Arc<Catalog>) -> Self {
        Self {
            capacity: capacity.max(1),
            // Capacity is enforced by `evict_page`, never by the map itself
            pages: Mutex::new(LruCache::unbounded()),
            catalog,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.lock().is_empty()
    }

    /// Whether `pid` currently occupies a frame. Does not touch recency.
    pub fn is_cached(&self, pid: PageId) -> bool {
        self.pages.lock().contains(&pid)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the page, loading it from its heap file on a miss.
    ///
    /// `perm` is not enforced: there is no lock manager, so concurrent
    /// readers and writers of the same page are never blocked.
    pub fn get_page(&self, _tid: TransactionId, pid: PageId, _perm: Permissions) -> Result<PageRef> {
        {
            let mut pages = self.pages.lock();
            if let Some(page) = pages.get(&pid) {
                return Ok(page.clone());
            }
        }

        let file = self.catalog.database_file(pid.table_id)?;
        let mut pages = self.pages.lock();
        // Another caller may have loaded it in the meantime
        if let Some(page) = pages.get(&pid) {
            return Ok(page.clone());
        }

        // Read under the lock: a load must not overlap a write-back of the
        // same page.
        let loaded = Arc::new(RwLock::new(file.read_page(pid)?));
        self.make_room(&mut pages)?;
        pages.put(pid, loaded.clone());
        Ok(loaded)
    }

    /// Inserts `tuple` into table `table_id` and caches every page the heap
    /// file modified.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: u32, tuple: &mut Tuple) -> Result<()> {
        let file = self.catalog.database_file(table_id)?;
        for page in file.insert_tuple(self, tid, tuple)? {
            self.cache_page(page)?;
        }
        Ok(())
    }

    /// Deletes `tuple` from the table named by its record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<()> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| StorageError::DeleteNotFound("tuple has no record id".to_string()))?;
        let file = self
            .catalog
            .database_file(rid.page_id.table_id)
            .map_err(|_| StorageError::DeleteNotFound(format!("{} names an unknown table", rid)))?;
        for page in file.delete_tuple(self, tid, tuple)? {
            self.cache_page(page)?;
        }
        Ok(())
    }

    /// Puts `page` in the cache as most recently used, replacing any cached
    /// copy of the same page.
    pub fn cache_page(&self, page: PageRef) -> Result<()> {
        let pid = page.read().id();
        let mut pages = self.pages.lock();
        if !pages.contains(&pid) {
            self.make_room(&mut pages)?;
        }
        pages.put(pid, page);
        Ok(())
    }

    /// Writes back every dirty cached page. Nothing is evicted.
    pub fn flush_all_pages(&self) -> Result<()> {
        for (pid, page) in self.snapshot() {
            self.flush_frame(pid, &page)?;
        }
        Ok(())
    }

    /// Writes back `pid` if it is cached and dirty.
    pub fn flush_page(&self, pid: PageId) -> Result<()> {
        let page = self.pages.lock().peek(&pid).cloned();
        match page {
            Some(page) => self.flush_frame(pid, &page),
            None => Ok(()),
        }
    }

    /// Writes back every cached page last dirtied by `tid`.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        for (pid, page) in self.snapshot() {
            if page.read().dirtier() == Some(tid) {
                self.flush_frame(pid, &page)?;
            }
        }
        Ok(())
    }

    /// Drops `pid` from the cache without writing it back. Any unflushed
    /// changes are lost; the next access reloads the page from its file.
    pub fn discard_page(&self, pid: PageId) {
        self.pages.lock().pop(&pid);
    }

    fn snapshot(&self) -> Vec<(PageId, PageRef)> {
        self.pages
            .lock()
            .iter()
            .map(|(pid, page)| (*pid, page.clone()))
            .collect()
    }

    fn make_room(&self, pages: &mut LruCache<PageId, PageRef>) -> Result<()> {
        while pages.len() >= self.capacity {
            let Some((pid, page)) = pages.peek_lru().map(|(pid, page)| (*pid, page.clone())) else {
                break;
            };
            self.evict_page(pages, pid, &page)?;
        }
        Ok(())
    }

    /// Removes the least recently used frame, writing it back first if it
    /// is dirty. If the write fails the frame stays cached and dirty.
    fn evict_page(&self, pages: &mut LruCache<PageId, PageRef>, pid: PageId, page: &PageRef) -> Result<()> {
        let was_dirty = page.read().is_dirty();
        self.flush_frame(pid, page)?;
        pages.pop(&pid);

        if was_dirty {
            self.log_info(format!("Evicted dirty page {} after write-back", pid));
        }
        Ok(())
    }

    fn flush_frame(&self, pid: PageId, page: &PageRef) -> Result<()> {
        let mut guard = page.write();
        if !guard.is_dirty() {
            return Ok(());
        }

        let file = self.catalog.database_file(pid.table_id)?;
        if let Err(e) = file.write_page(&guard) {
            self.log_error(format!("Failed to write back page {}: {}", pid, e));
            return Err(e);
        }
        guard.mark_dirty(false, None);
        Ok(())
    }

    fn log_info(&self, message: String) {
        if let Some(logger) = &self.logger {
            let _ = logger.info(message);
        }
    }

    fn log_error(&self, message: String) {
        if let Some(logger) = &self.logger {
            let _ = logger.error(message);
        }
    }
}
