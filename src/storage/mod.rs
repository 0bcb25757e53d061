pub mod buffer;
pub mod catalog;
pub mod heap_file;
pub mod ids;
pub mod page;
pub mod scan;
pub mod store;
pub mod transaction;
pub mod tuple;
