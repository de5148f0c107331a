//! Open-addressing index from string hash to id.
//!
//! Slots hold ids; the strings themselves live in the payload arena, so probes compare
//! through a [`PayloadSource`]. Capacity is always a power of two and the table is
//! doubled before an insertion would push the load factor past one half.

use crate::constants::NULL_STRING_ID;
use crate::types::StringId;

const EMPTY_SLOT: StringId = NULL_STRING_ID;

/// Largest capacity the index will size itself to.
const MAX_CAPACITY: usize = 1 << 31;

/// Rolling polynomial hash over raw bytes (multiplier 997, wrapping).
#[must_use]
pub fn rk_hash(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(1u32, |hash, &b| hash.wrapping_mul(997).wrapping_add(u32::from(b)))
}

/// Smallest power of two `>= n`, clamped to the index maximum.
#[must_use]
pub fn round_up_p2(n: usize) -> usize {
    n.max(1).checked_next_power_of_two().map_or(MAX_CAPACITY, |p| p.min(MAX_CAPACITY))
}

/// Read access to committed payloads by id.
pub trait PayloadSource {
    fn payload(&self, id: StringId) -> &[u8];
}

pub struct HashIndex {
    slots: Vec<StringId>,
    /// Per-id hashes, kept only when materialization is enabled.
    hashes: Option<Vec<u32>>,
}

impl HashIndex {
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two.
    #[must_use]
    pub fn new(capacity: usize, materialize_hashes: bool) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "hash index capacity {capacity} must be a power of two"
        );
        Self {
            slots: vec![EMPTY_SLOT; capacity],
            hashes: materialize_hashes.then(|| Vec::with_capacity(capacity / 2)),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn materializes_hashes(&self) -> bool {
        self.hashes.is_some()
    }

    /// Probe for `bytes`: returns the bucket holding its id, or the empty bucket where
    /// it would be inserted.
    pub fn find_bucket<S: PayloadSource + ?Sized>(
        &self,
        hash: u32,
        bytes: &[u8],
        source: &S,
    ) -> usize {
        let mask = self.slots.len() - 1;
        let mut bucket = hash as usize & mask;
        loop {
            let id = self.slots[bucket];
            if id == EMPTY_SLOT {
                return bucket;
            }
            let hash_matches = self
                .hashes
                .as_ref()
                .is_none_or(|hashes| hashes[id as usize] == hash);
            if hash_matches && source.payload(id) == bytes {
                return bucket;
            }
            bucket = (bucket + 1) & mask;
        }
    }

    /// Id stored in `bucket`, if any.
    #[must_use]
    pub fn slot(&self, bucket: usize) -> Option<StringId> {
        let id = self.slots[bucket];
        (id != EMPTY_SLOT).then_some(id)
    }

    pub fn lookup<S: PayloadSource + ?Sized>(&self, bytes: &[u8], source: &S) -> Option<StringId> {
        self.slot(self.find_bucket(rk_hash(bytes), bytes, source))
    }

    /// Whether inserting one more id into a table holding `count` would exceed 50% load.
    #[must_use]
    pub fn needs_growth(&self, count: usize) -> bool {
        self.slots.len() < (count + 1) * 2 && self.slots.len() < MAX_CAPACITY
    }

    /// Place `id` in a bucket previously returned empty by [`find_bucket`](Self::find_bucket).
    pub fn insert_at(&mut self, bucket: usize, id: StringId, hash: u32) {
        debug_assert_eq!(self.slots[bucket], EMPTY_SLOT);
        self.slots[bucket] = id;
        self.record_hash(id, hash);
    }

    /// Insert an id known to be distinct from every indexed id.
    pub fn insert_unique(&mut self, id: StringId, hash: u32) {
        let bucket = Self::unique_bucket(&self.slots, hash);
        self.slots[bucket] = id;
        self.record_hash(id, hash);
    }

    /// Double the capacity and rehash the `count` committed ids in one pass.
    pub fn grow<S: PayloadSource + ?Sized>(&mut self, count: usize, source: &S) {
        let mut slots = vec![EMPTY_SLOT; self.slots.len() * 2];
        match &self.hashes {
            Some(hashes) => {
                for &id in self.slots.iter().filter(|id| **id != EMPTY_SLOT) {
                    let bucket = Self::unique_bucket(&slots, hashes[id as usize]);
                    slots[bucket] = id;
                }
            }
            None => {
                for id in 0..count {
                    let id = id as StringId;
                    let bucket = Self::unique_bucket(&slots, rk_hash(source.payload(id)));
                    slots[bucket] = id;
                }
            }
        }
        tracing::debug!(
            dict.old_capacity = self.slots.len(),
            dict.new_capacity = slots.len(),
            dict.count = count,
            "hash index grown"
        );
        self.slots = slots;
    }

    fn record_hash(&mut self, id: StringId, hash: u32) {
        if let Some(hashes) = self.hashes.as_mut() {
            let idx = id as usize;
            if hashes.len() <= idx {
                hashes.resize(idx + 1, 0);
            }
            hashes[idx] = hash;
        }
    }

    fn unique_bucket(slots: &[StringId], hash: u32) -> usize {
        let mask = slots.len() - 1;
        let mut bucket = hash as usize & mask;
        while slots[bucket] != EMPTY_SLOT {
            bucket = (bucket + 1) & mask;
        }
        bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecSource(Vec<Vec<u8>>);

    impl PayloadSource for VecSource {
        fn payload(&self, id: StringId) -> &[u8] {
            &self.0[id as usize]
        }
    }

    fn insert(index: &mut HashIndex, source: &mut VecSource, value: &str) -> StringId {
        let hash = rk_hash(value.as_bytes());
        let bucket = index.find_bucket(hash, value.as_bytes(), &*source);
        if let Some(id) = index.slot(bucket) {
            return id;
        }
        let count = source.0.len();
        let bucket = if index.needs_growth(count) {
            index.grow(count, &*source);
            index.find_bucket(hash, value.as_bytes(), &*source)
        } else {
            bucket
        };
        source.0.push(value.as_bytes().to_vec());
        index.insert_at(bucket, count as StringId, hash);
        count as StringId
    }

    #[test]
    fn rk_hash_matches_reference_values() {
        assert_eq!(rk_hash(b""), 1);
        assert_eq!(rk_hash(b"a"), 997 + 97);
        assert_eq!(rk_hash(b"ab"), (997 + 97) * 997 + 98);
    }

    #[test]
    fn round_up_p2_handles_edges() {
        assert_eq!(round_up_p2(0), 1);
        assert_eq!(round_up_p2(1), 1);
        assert_eq!(round_up_p2(5), 8);
        assert_eq!(round_up_p2(64), 64);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn non_power_of_two_capacity_is_rejected() {
        let _ = HashIndex::new(12, false);
    }

    #[test]
    fn growth_keeps_load_at_most_half() {
        for materialize in [false, true] {
            let mut index = HashIndex::new(2, materialize);
            let mut source = VecSource(Vec::new());
            for i in 0..500 {
                let id = insert(&mut index, &mut source, &format!("value-{i}"));
                assert_eq!(id, i);
                assert!(index.capacity() >= 2 * source.0.len());
            }
            assert!(index.capacity().is_power_of_two());
            for i in 0..500 {
                let key = format!("value-{i}");
                assert_eq!(index.lookup(key.as_bytes(), &source), Some(i));
            }
            assert_eq!(index.lookup(b"missing", &source), None);
        }
    }

    #[test]
    fn colliding_hashes_resolve_by_bytes() {
        let mut index = HashIndex::new(4, true);
        let mut source = VecSource(Vec::new());
        // Same bucket in a 4-slot table is likely for short keys; equality must still
        // be decided by content.
        let a = insert(&mut index, &mut source, "a");
        let e = insert(&mut index, &mut source, "e");
        assert_ne!(a, e);
        assert_eq!(insert(&mut index, &mut source, "a"), a);
    }
}
