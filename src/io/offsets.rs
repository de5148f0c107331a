//! Fixed-size per-id records locating each payload inside the arena.

use std::path::Path;

use crate::constants::{CANARY_BYTE, CANARY_LENGTH, OFFSET_RECORD_SIZE};
use crate::error::Result;
use crate::io::backing::{Backing, HeapBuffer, MappedFile};

/// `(offset, length)` of one committed string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetRecord {
    pub offset: u64,
    pub length: u16,
}

impl OffsetRecord {
    fn encode(self) -> [u8; OFFSET_RECORD_SIZE] {
        let mut raw = [0u8; OFFSET_RECORD_SIZE];
        raw[..8].copy_from_slice(&self.offset.to_le_bytes());
        raw[8..10].copy_from_slice(&self.length.to_le_bytes());
        raw
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        let length = u16::from_le_bytes([raw[8], raw[9]]);
        if length == CANARY_LENGTH {
            return None;
        }
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&raw[..8]);
        Some(Self {
            offset: u64::from_le_bytes(offset),
            length,
        })
    }
}

/// Record array indexed by id. Slots past the committed count read as canary.
pub struct OffsetIndex {
    store: Box<dyn Backing>,
    chunk: usize,
    path: Option<std::path::PathBuf>,
}

impl OffsetIndex {
    pub(crate) fn open(path: &Path, recover: bool, chunk: usize) -> Result<Self> {
        let store = MappedFile::open(path, recover)?;
        let path = store.path().to_path_buf();
        let mut index = Self::with_store(Box::new(store), chunk)?;
        index.path = Some(path);
        Ok(index)
    }

    pub(crate) fn in_memory(chunk: usize) -> Result<Self> {
        Self::with_store(Box::<HeapBuffer>::default(), chunk)
    }

    fn with_store(mut store: Box<dyn Backing>, chunk: usize) -> Result<Self> {
        // Keep every growth step record-aligned.
        let chunk = chunk.max(1).div_ceil(OFFSET_RECORD_SIZE) * OFFSET_RECORD_SIZE;
        if store.len() == 0 {
            store.grow(chunk)?;
        }
        Ok(Self {
            store,
            chunk,
            path: None,
        })
    }

    /// Number of whole record slots currently backed by storage.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.store.len() / OFFSET_RECORD_SIZE
    }

    /// Bytes past the last whole record; non-zero only for a truncated file.
    #[must_use]
    pub fn trailing_bytes(&self) -> usize {
        self.store.len() % OFFSET_RECORD_SIZE
    }

    /// Record for `id`, or `None` when the slot still holds the canary.
    ///
    /// # Panics
    ///
    /// Panics if `id` is beyond the backed slots.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<OffsetRecord> {
        let start = id * OFFSET_RECORD_SIZE;
        let bytes = self.store.bytes();
        assert!(
            start + OFFSET_RECORD_SIZE <= bytes.len(),
            "offset record {id} outside index of {} slots",
            self.slot_count()
        );
        OffsetRecord::decode(&bytes[start..start + OFFSET_RECORD_SIZE])
    }

    /// Commit the record for `id`, growing the store first if needed.
    pub fn put(&mut self, id: usize, record: OffsetRecord) -> Result<()> {
        let start = id * OFFSET_RECORD_SIZE;
        let end = start + OFFSET_RECORD_SIZE;
        while end > self.store.len() - self.trailing_bytes() {
            self.store.grow(self.chunk)?;
        }
        self.store.bytes_mut()[start..end].copy_from_slice(&record.encode());
        Ok(())
    }

    /// Reset every slot from `id` on to the canary, dropping records recovery rejected.
    pub(crate) fn clear_from(&mut self, id: usize) {
        let end = self.slot_count() * OFFSET_RECORD_SIZE;
        let start = (id * OFFSET_RECORD_SIZE).min(end);
        self.store.bytes_mut()[start..end].fill(CANARY_BYTE);
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn sync(&self) -> Result<()> {
        self.store.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_slots_read_as_canary() {
        let index = OffsetIndex::in_memory(64).unwrap();
        assert_eq!(index.slot_count(), 4);
        assert!((0..4).all(|id| index.get(id).is_none()));
    }

    #[test]
    fn put_grows_and_round_trips() {
        let mut index = OffsetIndex::in_memory(32).unwrap();
        for id in 0..10 {
            let record = OffsetRecord {
                offset: id as u64 * 3,
                length: 3,
            };
            index.put(id, record).unwrap();
        }
        assert!(index.slot_count() >= 10);
        assert_eq!(
            index.get(9),
            Some(OffsetRecord {
                offset: 27,
                length: 3
            })
        );
        assert!(index.get(10).is_none());
    }

    #[test]
    fn chunk_is_rounded_to_whole_records() {
        let index = OffsetIndex::in_memory(20).unwrap();
        assert_eq!(index.trailing_bytes(), 0);
        assert_eq!(index.slot_count(), 2);
    }

    #[test]
    fn clear_from_resets_later_slots() {
        let mut index = OffsetIndex::in_memory(64).unwrap();
        for id in 0..4 {
            index.put(id, OffsetRecord { offset: id as u64, length: 1 }).unwrap();
        }
        index.clear_from(2);
        assert!(index.get(1).is_some());
        assert!(index.get(2).is_none() && index.get(3).is_none());
        index.clear_from(10);
        assert!(index.get(1).is_some());
    }
}
