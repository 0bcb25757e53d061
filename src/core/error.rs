use thiserror::Error;

use crate::storage::ids::PageId;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Page {page_no} out of bounds for table {table_id} (total: {num_pages})")]
    OutOfBounds {
        table_id: u32,
        page_no: u32,
        num_pages: u32,
    },

    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("No empty slot on page {0}")]
    PageFull(PageId),

    #[error("Tuple not found: {0}")]
    DeleteNotFound(String),

    #[error("No more tuples")]
    NoSuchElement,

    #[error("Unknown table id {0}")]
    UnknownTable(u32),

    #[error("Invalid page size: expected {expected} bytes, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Tuple of {width} bytes does not fit on a {page_size}-byte page")]
    TupleTooWide { width: usize, page_size: usize },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Corrupt page data: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
