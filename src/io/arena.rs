//! Append-only payload store for string bytes.

use std::path::Path;

use crate::error::Result;
use crate::io::backing::{Backing, HeapBuffer, MappedFile};

/// Append-only byte arena. Entries are written once and never moved.
///
/// Growth is not synchronized; callers hold the engine's write lock.
pub struct PayloadArena {
    store: Box<dyn Backing>,
    tail: u64,
    chunk: usize,
    /// Backing length before any growth on open.
    persisted_len: usize,
}

impl PayloadArena {
    pub(crate) fn open(path: &Path, recover: bool, chunk: usize) -> Result<Self> {
        let store = MappedFile::open(path, recover)?;
        Self::with_store(Box::new(store), chunk)
    }

    pub(crate) fn in_memory(chunk: usize) -> Result<Self> {
        Self::with_store(Box::<HeapBuffer>::default(), chunk)
    }

    fn with_store(mut store: Box<dyn Backing>, chunk: usize) -> Result<Self> {
        let chunk = chunk.max(1);
        let persisted_len = store.len();
        if store.len() == 0 {
            store.grow(chunk)?;
        }
        Ok(Self {
            store,
            tail: 0,
            chunk,
            persisted_len,
        })
    }

    /// Write `bytes` at the tail and return their offset.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let needed = self.tail as usize + bytes.len();
        while needed > self.store.len() {
            self.store.grow(self.chunk)?;
        }
        let offset = self.tail;
        let start = offset as usize;
        self.store.bytes_mut()[start..needed].copy_from_slice(bytes);
        self.tail = needed as u64;
        Ok(offset)
    }

    /// Zero-copy view of a committed entry.
    ///
    /// # Panics
    ///
    /// Panics if the range lies outside the arena.
    #[must_use]
    pub fn read(&self, offset: u64, len: usize) -> &[u8] {
        let start = offset as usize;
        let end = start + len;
        let bytes = self.store.bytes();
        assert!(
            end <= bytes.len(),
            "payload read {start}..{end} outside arena of {} bytes",
            bytes.len()
        );
        &bytes[start..end]
    }

    /// Whether `offset..offset + len` lay within the backing as it was opened.
    #[must_use]
    pub fn persisted(&self, offset: u64, len: usize) -> bool {
        (offset as usize)
            .checked_add(len)
            .is_some_and(|end| end <= self.persisted_len)
    }

    #[must_use]
    pub fn tail(&self) -> u64 {
        self.tail
    }

    /// Reposition the tail after recovery.
    pub(crate) fn set_tail(&mut self, tail: u64) {
        self.tail = tail;
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.store.len()
    }

    pub(crate) fn sync(&self) -> Result<()> {
        self.store.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CANARY_BYTE;

    #[test]
    fn append_returns_contiguous_offsets() {
        let mut arena = PayloadArena::in_memory(16).unwrap();
        assert_eq!(arena.append(b"apple").unwrap(), 0);
        assert_eq!(arena.append(b"banana").unwrap(), 5);
        assert_eq!(arena.read(5, 6), b"banana");
        assert_eq!(arena.tail(), 11);
    }

    #[test]
    fn append_grows_across_several_chunks() {
        let mut arena = PayloadArena::in_memory(8).unwrap();
        let long = vec![b'x'; 30];
        let offset = arena.append(&long).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(arena.capacity(), 32);
        assert_eq!(arena.read(0, 30), &long[..]);
        assert_eq!(arena.read(30, 2), &[CANARY_BYTE, CANARY_BYTE]);
    }

    #[test]
    fn growth_on_open_is_not_persisted() {
        let mut arena = PayloadArena::in_memory(16).unwrap();
        assert_eq!(arena.capacity(), 16);
        assert!(!arena.persisted(0, 8));
        arena.append(b"abc").unwrap();
        assert!(!arena.persisted(0, 3));
    }

    #[test]
    #[should_panic(expected = "outside arena")]
    fn read_past_end_panics() {
        let arena = PayloadArena::in_memory(8).unwrap();
        let _ = arena.read(4, 8);
    }
}
