//! Page-oriented heap file storage with a bounded LRU buffer pool.
//!
//! Tables are heap files of fixed-size pages. Every page access outside
//! `HeapFile::read_page`/`write_page` goes through a shared `BufferPool`,
//! which evicts the least recently used page and writes it back if dirty.

pub mod core;
pub mod database;
pub mod storage;

pub use crate::core::config::{Config, StorageConfig};
pub use crate::core::error::{Result, StorageError};
pub use crate::database::Database;
pub use crate::storage::buffer::{BufferPool, PageRef};
pub use crate::storage::catalog::Catalog;
pub use crate::storage::heap_file::HeapFile;
pub use crate::storage::ids::{PageId, RecordId};
pub use crate::storage::page::HeapPage;
pub use crate::storage::scan::{DbFileIterator, HeapFileIterator};
pub use crate::storage::transaction::{Permissions, TransactionId};
pub use crate::storage::tuple::{Field, Tuple, TupleDesc, Type};
