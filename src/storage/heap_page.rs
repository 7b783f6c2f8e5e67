use crate::tuple::{RecordId, SlotId, Tuple, TupleDesc};

use super::error::{StorageError, StorageResult};
use super::{PageId, PAGE_HEADER_SIZE, PAGE_SIZE};

/// A slotted page of fixed-width tuples. The serialized form is exactly
/// PAGE_SIZE bytes: an 8-byte header (slot count and used-slot count,
/// both i32 little-endian) followed by the occupied tuples in ascending
/// slot order, then zero padding.
///
/// Slot indices are stable while the page lives in memory; the on-disk
/// form packs tuples densely, so slots may be renumbered across a
/// flush/reload cycle. That is acceptable because a dirty page is always
/// written whole before any consumer observes it again.
pub struct HeapPage {
    page_no: PageId,
    desc: TupleDesc,
    slots: Vec<Option<Tuple>>,
    dirty: bool,
}

impl HeapPage {
    /// Create an empty page for a file of schema `desc`
    pub fn new(desc: &TupleDesc, page_no: PageId) -> Self {
        let num_slots = Self::slot_capacity(desc);
        Self {
            page_no,
            desc: desc.clone(),
            slots: vec![None; num_slots],
            dirty: false,
        }
    }

    /// Number of tuple slots a page of this schema holds
    pub fn slot_capacity(desc: &TupleDesc) -> usize {
        (PAGE_SIZE - PAGE_HEADER_SIZE) / desc.bytes_per_tuple()
    }

    pub fn page_no(&self) -> PageId {
        self.page_no
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_used(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }

    /// Store `t` in the lowest free slot, recording the slot on both the
    /// stored copy and the caller's tuple. Does not touch the dirty flag;
    /// that is the caller's responsibility.
    pub fn insert_tuple(&mut self, t: &mut Tuple) -> StorageResult<RecordId> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(StorageError::PageFull(self.page_no))?;

        let rid = RecordId {
            page_no: self.page_no,
            slot,
        };
        t.set_rid(Some(rid));
        self.slots[slot] = Some(t.clone());
        Ok(rid)
    }

    /// Clear the slot `rid` points at
    pub fn delete_tuple(&mut self, rid: RecordId) -> StorageResult<()> {
        match self.slots.get_mut(rid.slot) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(StorageError::TupleNotFound(format!(
                "no tuple in slot {} of page {}",
                rid.slot, self.page_no
            ))),
        }
    }

    pub fn tuple(&self, slot: SlotId) -> Option<&Tuple> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    /// Occupied slots in ascending slot order
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().flatten()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Serialize to exactly PAGE_SIZE bytes
    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        buf.extend_from_slice(&(self.num_slots() as i32).to_le_bytes());
        buf.extend_from_slice(&(self.num_used() as i32).to_le_bytes());
        for tuple in self.iter() {
            tuple.write_to(&mut buf)?;
        }
        if buf.len() > PAGE_SIZE {
            return Err(StorageError::MalformedData(format!(
                "page {} serialized to {} bytes",
                self.page_no,
                buf.len()
            )));
        }
        buf.resize(PAGE_SIZE, 0);
        Ok(buf)
    }

    /// Rebuild a page from its serialized form. Tuples are packed into
    /// the lowest slots, so slot numbers observed before a flush do not
    /// survive the round trip.
    pub fn from_bytes(desc: &TupleDesc, page_no: PageId, data: &[u8]) -> StorageResult<Self> {
        if data.len() != PAGE_SIZE {
            return Err(StorageError::MalformedData(format!(
                "expected a {} byte page, got {}",
                PAGE_SIZE,
                data.len()
            )));
        }

        let used = i32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let mut page = HeapPage::new(desc, page_no);
        if used > page.num_slots() {
            return Err(StorageError::MalformedData(format!(
                "page {} claims {} used slots but holds at most {}",
                page_no,
                used,
                page.num_slots()
            )));
        }

        let width = desc.bytes_per_tuple();
        let mut offset = PAGE_HEADER_SIZE;
        for _ in 0..used {
            let mut tuple = Tuple::read_from(&data[offset..offset + width], desc)?;
            page.insert_tuple(&mut tuple)?;
            offset += width;
        }
        page.dirty = false;
        Ok(page)
    }
}
