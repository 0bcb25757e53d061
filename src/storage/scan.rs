use crate::core::error::{Result, StorageError};
use crate::storage::buffer::BufferPool;
use crate::storage::heap_file::HeapFile;
use crate::storage::ids::PageId;
use crate::storage::transaction::{Permissions, TransactionId};
use crate::storage::tuple::Tuple;

/// Pull-based iterator over the tuples of a file.
///
/// `next` on an iterator that is not open, or has no more tuples, returns
/// `StorageError::NoSuchElement`.
pub trait DbFileIterator {
    fn open(&mut self) -> Result<()>;

    /// `false` when exhausted or not open.
    fn has_next(&mut self) -> Result<bool>;

    fn next(&mut self) -> Result<Tuple>;

    /// Restarts from the first page.
    fn rewind(&mut self) -> Result<()>;

    fn close(&mut self);
}

/// Walks a heap file page by page (ascending page number, then slot),
/// fetching each page through the buffer pool. Only one page's tuples are
/// held at a time.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    next_page: u32,
    num_pages: u32,
    tuples: Option<std::vec::IntoIter<Tuple>>,
}

impl<'a> HeapFileIterator<'a> {
    pub fn new(file: &'a HeapFile, pool: &'a BufferPool, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            next_page: 0,
            num_pages: 0,
            tuples: None,
        }
    }

    fn load_next_page(&mut self) -> Result<()> {
        let pid = PageId::new(self.file.id(), self.next_page);
        let page = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
        let tuples: Vec<Tuple> = page.read().iter().cloned().collect();
        self.tuples = Some(tuples.into_iter());
        self.next_page += 1;
        Ok(())
    }
}

impl DbFileIterator for HeapFileIterator<'_> {
    fn open(&mut self) -> Result<()> {
        // Pages appended after open are not part of this scan
        self.num_pages = self.file.num_pages()?;
        self.next_page = 0;
        self.tuples = Some(Vec::new().into_iter());
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        loop {
            match &self.tuples {
                None => return Ok(false),
                Some(tuples) if tuples.len() > 0 => return Ok(true),
                Some(_) => {}
            }
            if self.next_page >= self.num_pages {
                return Ok(false);
            }
            self.load_next_page()?;
        }
    }

    fn next(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(StorageError::NoSuchElement);
        }
        self.tuples
            .as_mut()
            .and_then(|tuples| tuples.next())
            .ok_or(StorageError::NoSuchElement)
    }

    fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        self.tuples = None;
    }
}
