use std::sync::Arc;

use crate::core::error::{Result, StorageError};
use crate::storage::ids::{PageId, RecordId};
use crate::storage::transaction::TransactionId;
use crate::storage::tuple::{Tuple, TupleDesc};

pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Number of tuple slots that fit on a page: the largest `n` with
/// `ceil(n / 8) + n * tuple_width <= page_size`.
pub fn slot_capacity(page_size: usize, tuple_width: usize) -> usize {
    if tuple_width == 0 {
        return 0;
    }
    (page_size * 8) / (tuple_width * 8 + 1)
}

/// Bytes in the slot bitmap for `capacity` slots.
pub fn header_size(capacity: usize) -> usize {
    capacity.div_ceil(8)
}

/// A page of fixed-width tuples sharing one schema.
///
/// Layout: a bitmap header with one bit per slot (LSB-first within each
/// byte, set when the slot is live) followed by `capacity` slots of
/// `desc.byte_width()` bytes. Unused bytes are zero.
#[derive(Clone, Debug)]
pub struct HeapPage {
    pid: PageId,
    desc: Arc<TupleDesc>,
    page_size: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirty: bool,
    dirtier: Option<TransactionId>,
}

impl HeapPage {
    pub fn empty(pid: PageId, desc: Arc<TupleDesc>, page_size: usize) -> Self {
        let capacity = slot_capacity(page_size, desc.byte_width());
        Self {
            pid,
            desc,
            page_size,
            header: vec![0; header_size(capacity)],
            tuples: vec![None; capacity],
            dirty: false,
            dirtier: None,
        }
    }

    /// Raw bytes of a page with no live slots.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0; page_size]
    }

    pub fn from_bytes(pid: PageId, desc: Arc<TupleDesc>, data: &[u8], page_size: usize) -> Result<Self> {
        if data.len() != page_size {
            return Err(StorageError::InvalidPageSize {
                expected: page_size,
                actual: data.len(),
            });
        }

        let mut page = Self::empty(pid, desc, page_size);
        let header_len = page.header.len();
        page.header.copy_from_slice(&data[..header_len]);

        let width = page.desc.byte_width();
        for slot in 0..page.capacity() {
            if !page.is_slot_used(slot) {
                continue;
            }
            let start = header_len + slot * width;
            let mut tuple = Tuple::read_from(page.desc.clone(), &data[start..start + width])?;
            tuple.set_record_id(Some(RecordId::new(pid, slot)));
            page.tuples[slot] = Some(tuple);
        }

        Ok(page)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.page_size];
        let header_len = self.header.len();
        data[..header_len].copy_from_slice(&self.header);

        let width = self.desc.byte_width();
        for (slot, tuple) in self.tuples.iter().enumerate() {
            if let Some(tuple) = tuple {
                let start = header_len + slot * width;
                tuple.write_to(&mut data[start..start + width]);
            }
        }
        data
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn capacity(&self) -> usize {
        self.tuples.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        let live: u32 = self.header.iter().map(|b| b.count_ones()).sum();
        self.capacity() - live as usize
    }

    pub fn num_tuples(&self) -> usize {
        self.capacity() - self.num_empty_slots()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.capacity() && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_slot(&mut self, slot: usize, used: bool) {
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    /// Places `tuple` in the lowest free slot and stamps its record id.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        if tuple.desc().as_ref() != self.desc.as_ref() {
            return Err(StorageError::SchemaMismatch {
                expected: self.desc.to_string(),
                found: tuple.desc().to_string(),
            });
        }

        let slot = (0..self.capacity())
            .find(|&slot| !self.is_slot_used(slot))
            .ok_or(StorageError::PageFull(self.pid))?;

        let rid = RecordId::new(self.pid, slot);
        tuple.set_record_id(Some(rid));
        self.set_slot(slot, true);
        self.tuples[slot] = Some(tuple.clone());
        self.dirty = true;
        Ok(rid)
    }

    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> Result<()> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| StorageError::DeleteNotFound("tuple has no record id".to_string()))?;
        if rid.page_id != self.pid {
            return Err(StorageError::DeleteNotFound(format!("{} is not on page {}", rid, self.pid)));
        }
        let slot = rid.slot;
        if !self.is_slot_used(slot) {
            return Err(StorageError::DeleteNotFound(format!("slot {} is empty", rid)));
        }

        self.set_slot(slot, false);
        self.tuples[slot] = None;
        tuple.set_record_id(None);
        self.dirty = true;
        Ok(())
    }

    /// Live tuples in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.tuples.iter().filter_map(|t| t.as_ref())
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: Option<TransactionId>) {
        self.dirty = dirty;
        self.dirtier = if dirty { tid } else { None };
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Transaction that last dirtied the page; `None` when clean.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }
}
