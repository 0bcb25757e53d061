use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Plain transaction identifier. Pages remember the id of the transaction
/// that last dirtied them; nothing here tracks transaction state.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Access mode requested from the buffer pool.
///
/// No lock manager exists yet, so neither mode blocks or conflicts with
/// the other. The value is carried so a future lock manager can sit in
/// front of `BufferPool::get_page` without changing its signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}
