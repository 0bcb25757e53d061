use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use parking_lot::{Mutex, RwLock};

use crate::core::error::{Result, StorageError};
use crate::storage::buffer::{BufferPool, PageRef};
use crate::storage::ids::PageId;
use crate::storage::page::{HeapPage, slot_capacity};
use crate::storage::scan::HeapFileIterator;
use crate::storage::store::{BlockStore, FileStore};
use crate::storage::transaction::{Permissions, TransactionId};
use crate::storage::tuple::{Tuple, TupleDesc};

/// An unordered collection of tuples stored as a sequence of heap pages.
///
/// Page `i` lives at byte offset `i * page_size`; there is no file header.
/// Only `read_page` and `write_page` touch the store directly. Everything
/// else goes through the buffer pool.
pub struct HeapFile {
    store: Box<dyn BlockStore>,
    desc: Arc<TupleDesc>,
    table_id: u32,
    page_size: usize,
    // Where the next insert starts probing for a free slot
    cursor: AtomicU32,
    append_lock: Mutex<()>,
}

impl HeapFile {
    pub fn new(store: Box<dyn BlockStore>, desc: TupleDesc, page_size: usize) -> Result<Self> {
        let width = desc.byte_width();
        if slot_capacity(page_size, width) == 0 {
            return Err(StorageError::TupleTooWide { width, page_size });
        }

        let mut hasher = DefaultHasher::new();
        store.identity().hash(&mut hasher);
        desc.hash(&mut hasher);
        let table_id = hasher.finish() as u32;

        Ok(Self {
            store,
            desc: Arc::new(desc),
            table_id,
            page_size,
            cursor: AtomicU32::new(0),
            append_lock: Mutex::new(()),
        })
    }

    pub fn open(path: &Path, desc: TupleDesc, page_size: usize) -> Result<Self> {
        Self::new(Box::new(FileStore::open(path)?), desc, page_size)
    }

    pub fn id(&self) -> u32 {
        self.table_id
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn identity(&self) -> String {
        self.store.identity()
    }

    pub fn num_pages(&self) -> Result<u32> {
        Ok((self.store.len()? / self.page_size as u64) as u32)
    }

    /// Reads a page straight from the store, bypassing the buffer pool.
    pub fn read_page(&self, pid: PageId) -> Result<HeapPage> {
        let num_pages = self.num_pages()?;
        if pid.page_no >= num_pages {
            return Err(StorageError::OutOfBounds {
                table_id: pid.table_id,
                page_no: pid.page_no,
                num_pages,
            });
        }

        let mut buffer = vec![0u8; self.page_size];
        self.store.read_at(self.offset_of(pid.page_no), &mut buffer)?;
        HeapPage::from_bytes(pid, self.desc.clone(), &buffer, self.page_size)
    }

    /// Overwrites an existing page, or appends when the page number equals
    /// the current page count.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let pid = page.id();
        let num_pages = self.num_pages()?;
        if pid.page_no > num_pages {
            return Err(StorageError::OutOfBounds {
                table_id: pid.table_id,
                page_no: pid.page_no,
                num_pages,
            });
        }

        if page.page_size() != self.page_size {
            return Err(StorageError::InvalidPageSize {
                expected: self.page_size,
                actual: page.page_size(),
            });
        }
        self.store.write_at(self.offset_of(pid.page_no), &page.to_bytes())
    }

    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    /// Inserts `tuple` into the first page with a free slot, starting at the
    /// probe cursor, or into a freshly appended page. Consecutive inserts
    /// rotate across pages with room. Returns the page that
    /// was modified.
    pub fn insert_tuple(&self, pool: &BufferPool, tid: TransactionId, tuple: &mut Tuple) -> Result<Vec<PageRef>> {
        if tuple.desc().as_ref() != self.desc.as_ref() {
            return Err(StorageError::SchemaMismatch {
                expected: self.desc.to_string(),
                found: tuple.desc().to_string(),
            });
        }

        let num_pages = self.num_pages()?;
        if num_pages > 0 {
            let start = self.cursor.load(Ordering::Relaxed) % num_pages;
            for i in 0..num_pages {
                let page_no = (start + i) % num_pages;
                let pid = PageId::new(self.table_id, page_no);
                let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
                {
                    let mut guard = page.write();
                    if guard.num_empty_slots() == 0 {
                        continue;
                    }
                    guard.insert_tuple(tuple)?;
                    guard.mark_dirty(true, Some(tid));
                }
                self.advance_cursor(page_no);
                return Ok(vec![page]);
            }
        }

        self.append_tuple(tid, tuple)
    }

    // No existing page has room: build a new one and persist it right away,
    // since it has no frame to be written back from.
    fn append_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<Vec<PageRef>> {
        let _append = self.append_lock.lock();

        let page_no = self.num_pages()?;
        let pid = PageId::new(self.table_id, page_no);
        let mut page = HeapPage::empty(pid, self.desc.clone(), self.page_size);
        page.insert_tuple(tuple)?;
        page.mark_dirty(true, Some(tid));

        self.write_page(&page)?;
        page.mark_dirty(false, None);
        self.advance_cursor(page_no);

        Ok(vec![Arc::new(RwLock::new(page))])
    }

    /// Removes `tuple` from the page its record id points at. Returns the
    /// page that was modified.
    pub fn delete_tuple(&self, pool: &BufferPool, tid: TransactionId, tuple: &mut Tuple) -> Result<Vec<PageRef>> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| StorageError::DeleteNotFound("tuple has no record id".to_string()))?;
        if rid.page_id.table_id != self.table_id {
            return Err(StorageError::DeleteNotFound(format!(
                "{} does not belong to table {}",
                rid, self.table_id
            )));
        }
        if rid.page_id.page_no >= self.num_pages()? {
            return Err(StorageError::DeleteNotFound(format!("{} is past the end of the file", rid)));
        }

        let page = pool.get_page(tid, rid.page_id, Permissions::ReadWrite)?;
        {
            let mut guard = page.write();
            guard.delete_tuple(tuple)?;
            guard.mark_dirty(true, Some(tid));
        }
        Ok(vec![page])
    }

    /// Scans every live tuple, one page at a time through the buffer pool.
    pub fn iterator<'a>(&'a self, pool: &'a BufferPool, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self, pool, tid)
    }

    // The next insert starts probing just past the page that took this one,
    // wrapping modulo the page count.
    fn advance_cursor(&self, page_no: u32) {
        self.cursor.store(page_no.wrapping_add(1), Ordering::Relaxed);
    }

    fn offset_of(&self, page_no: u32) -> u64 {
        page_no as u64 * self.page_size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::catalog::Catalog;
    use crate::storage::page::DEFAULT_PAGE_SIZE;
    use crate::storage::store::MemoryStore;
    use crate::storage::tuple::{Field, Type};
    use tempfile::TempDir;

    fn five_ints() -> TupleDesc {
        TupleDesc::from_types(vec![Type::Int; 5])
    }

    fn row(file: &HeapFile, v: i32) -> Tuple {
        Tuple::with_fields(file.tuple_desc().clone(), vec![Field::Int(v); 5]).unwrap()
    }

    fn setup(name: &str, capacity: usize) -> (Arc<Catalog>, BufferPool, Arc<HeapFile>) {
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::new(Box::new(MemoryStore::new(name)), five_ints(), DEFAULT_PAGE_SIZE).unwrap();
        let table_id = catalog.add_table(file, name, None);
        let file = catalog.database_file(table_id).unwrap();
        let pool = BufferPool::new(capacity, catalog.clone());
        (catalog, pool, file)
    }

    #[test]
    fn test_table_id_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("t.dat");
        let a = HeapFile::open(&path, five_ints(), DEFAULT_PAGE_SIZE).unwrap();
        let b = HeapFile::open(&path, five_ints(), DEFAULT_PAGE_SIZE).unwrap();
        let c = HeapFile::open(&path, TupleDesc::from_types(vec![Type::Int]), DEFAULT_PAGE_SIZE).unwrap();
        let d = HeapFile::open(&temp_dir.path().join("u.dat"), five_ints(), DEFAULT_PAGE_SIZE).unwrap();

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_ne!(a.id(), d.id());
    }

    #[test]
    fn test_rejects_tuple_wider_than_page() {
        let desc = TupleDesc::from_types(vec![Type::Str; 40]);
        let result = HeapFile::new(Box::new(MemoryStore::new("wide")), desc, DEFAULT_PAGE_SIZE);
        assert!(matches!(result, Err(StorageError::TupleTooWide { .. })));
    }

    #[test]
    fn test_read_page_out_of_bounds() {
        let (_catalog, _pool, file) = setup("oob", 4);
        assert_eq!(file.num_pages().unwrap(), 0);
        let err = file.read_page(PageId::new(file.id(), 0)).unwrap_err();
        assert!(matches!(err, StorageError::OutOfBounds { page_no: 0, num_pages: 0, .. }));
    }

    #[test]
    fn test_write_page_appends_then_overwrites() {
        let (_catalog, _pool, file) = setup("write", 4);
        let pid = PageId::new(file.id(), 0);
        let mut page = HeapPage::empty(pid, file.tuple_desc().clone(), DEFAULT_PAGE_SIZE);
        file.write_page(&page).unwrap();
        assert_eq!(file.num_pages().unwrap(), 1);

        page.insert_tuple(&mut row(&file, 7)).unwrap();
        file.write_page(&page).unwrap();
        assert_eq!(file.num_pages().unwrap(), 1);

        let reread = file.read_page(pid).unwrap();
        assert_eq!(reread.num_tuples(), 1);
        assert_eq!(reread.iter().next().unwrap().field(0), Some(&Field::Int(7)));

        // cannot leave a hole
        let far = HeapPage::empty(PageId::new(file.id(), 5), file.tuple_desc().clone(), DEFAULT_PAGE_SIZE);
        assert!(matches!(file.write_page(&far), Err(StorageError::OutOfBounds { .. })));

        let small = HeapPage::empty(pid, file.tuple_desc().clone(), 1024);
        assert!(matches!(
            file.write_page(&small),
            Err(StorageError::InvalidPageSize { expected: 4096, actual: 1024 })
        ));
    }

    #[test]
    fn test_insert_fills_page_then_appends() {
        let (_catalog, pool, file) = setup("fill", 10);
        let tid = TransactionId::new();

        for i in 0..203 {
            let mut t = row(&file, i);
            let pages = file.insert_tuple(&pool, tid, &mut t).unwrap();
            assert_eq!(pages.len(), 1);
            assert_eq!(t.record_id().unwrap().page_id.page_no, 0);
            for page in pages {
                pool.cache_page(page).unwrap();
            }
        }
        assert_eq!(file.num_pages().unwrap(), 1);
        let page0 = pool.get_page(tid, PageId::new(file.id(), 0), Permissions::ReadOnly).unwrap();
        assert_eq!(page0.read().num_empty_slots(), 0);

        let mut t = row(&file, 203);
        let pages = file.insert_tuple(&pool, tid, &mut t).unwrap();
        assert_eq!(file.num_pages().unwrap(), 2);
        assert_eq!(t.record_id().unwrap().page_id.page_no, 1);
        // the appended page is already durable
        assert!(!pages[0].read().is_dirty());
        assert_eq!(file.read_page(PageId::new(file.id(), 1)).unwrap().num_tuples(), 1);
    }

    #[test]
    fn test_insert_schema_mismatch() {
        let (_catalog, pool, file) = setup("mismatch", 4);
        let mut t = Tuple::new(Arc::new(TupleDesc::from_types(vec![Type::Str])));
        let err = file.insert_tuple(&pool, TransactionId::new(), &mut t).unwrap_err();
        assert!(matches!(err, StorageError::SchemaMismatch { .. }));
        assert_eq!(file.num_pages().unwrap(), 0);
    }

    #[test]
    fn test_insert_cursor_rotates_across_pages() {
        let (_catalog, pool, file) = setup("cursor", 10);
        let desc = file.tuple_desc().clone();
        let tid = TransactionId::new();

        // three empty pages on disk
        for page_no in 0..3 {
            let page = HeapPage::empty(PageId::new(file.id(), page_no), desc.clone(), DEFAULT_PAGE_SIZE);
            file.write_page(&page).unwrap();
        }

        let mut placed = Vec::new();
        for i in 0..6 {
            let mut t = row(&file, i);
            pool.insert_tuple(tid, file.id(), &mut t).unwrap();
            placed.push(t.record_id().unwrap().page_id.page_no);
        }
        assert_eq!(placed, vec![0, 1, 2, 0, 1, 2]);

        // a full page is skipped, the cursor still moves past the page used
        let page1 = pool.get_page(tid, PageId::new(file.id(), 1), Permissions::ReadWrite).unwrap();
        {
            let mut guard = page1.write();
            while guard.num_empty_slots() > 0 {
                guard.insert_tuple(&mut row(&file, 7)).unwrap();
            }
        }
        let mut placed = Vec::new();
        for i in 0..3 {
            let mut t = row(&file, 100 + i);
            pool.insert_tuple(tid, file.id(), &mut t).unwrap();
            placed.push(t.record_id().unwrap().page_id.page_no);
        }
        assert_eq!(placed, vec![0, 2, 0]);
        assert_eq!(file.num_pages().unwrap(), 3);
    }

    #[test]
    fn test_delete_tuple_errors() {
        let (_catalog, pool, file) = setup("delete", 4);
        let tid = TransactionId::new();

        let mut loose = row(&file, 1);
        assert!(matches!(
            file.delete_tuple(&pool, tid, &mut loose),
            Err(StorageError::DeleteNotFound(_))
        ));

        let mut t = row(&file, 2);
        file.insert_tuple(&pool, tid, &mut t).unwrap();
        let mut stale = t.clone();
        let pages = file.delete_tuple(&pool, tid, &mut t).unwrap();
        assert!(pages[0].read().is_dirty());
        assert_eq!(t.record_id(), None);

        assert!(matches!(
            file.delete_tuple(&pool, tid, &mut stale),
            Err(StorageError::DeleteNotFound(_))
        ));
    }
}
