//! Core `StringDictionary` type: encode, decode and predicate evaluation over one
//! dictionary, served locally or forwarded to a remote dictionary server.

pub mod decode;
pub mod lifecycle;
pub mod mutation;
pub mod predicate;
mod recovery;
pub mod translate;

use std::ops::{Deref, Range};
use std::path::PathBuf;

use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock};
use rayon::ThreadPool;

use crate::cache::{QueryCaches, SortedCache};
use crate::hash_index::{HashIndex, PayloadSource};
use crate::io::{OffsetIndex, PayloadArena};
use crate::remote::DictionaryClient;
use crate::types::{DictHost, DictRef, DictionaryOptions, StringId};

pub use translate::{populate_string_array_ids, populate_string_ids, translate_string_ids};

/// Handle to one string dictionary.
///
/// Local dictionaries own their storage, hash index and caches behind a single
/// reader/writer lock. Remote dictionaries forward every call to a dictionary server.
pub struct StringDictionary {
    pub(crate) backend: Backend,
}

pub(crate) enum Backend {
    Local(LocalDictionary),
    Remote(RemoteDictionary),
}

pub(crate) struct LocalDictionary {
    pub(crate) state: RwLock<DictState>,
    /// Process-wide worker pool, shared with every other dictionary.
    pub(crate) pool: &'static ThreadPool,
    /// Shard count for scans.
    pub(crate) workers: usize,
    pub(crate) options: DictionaryOptions,
    /// `None` for ephemeral dictionaries.
    pub(crate) folder: Option<PathBuf>,
}

pub(crate) struct RemoteDictionary {
    /// Timeout-bounded connection for interactive calls.
    pub(crate) client: Box<dyn DictionaryClient>,
    /// Unbounded connection for bulk encoding.
    pub(crate) client_no_timeout: Box<dyn DictionaryClient>,
    pub(crate) host: DictHost,
    pub(crate) dict_ref: DictRef,
}

/// Payload arena plus offset index: the durable half of a dictionary.
pub(crate) struct Storage {
    pub(crate) arena: PayloadArena,
    pub(crate) offsets: OffsetIndex,
}

impl PayloadSource for Storage {
    fn payload(&self, id: StringId) -> &[u8] {
        assert!(id >= 0, "negative string id {id}");
        match self.offsets.get(id as usize) {
            Some(record) => self.arena.read(record.offset, record.length as usize),
            None => panic!("string id {id} points at an uncommitted offset record"),
        }
    }
}

/// Everything guarded by the dictionary lock.
pub(crate) struct DictState {
    pub(crate) storage: Storage,
    pub(crate) index: HashIndex,
    /// Committed entries; also the current generation.
    pub(crate) count: usize,
    pub(crate) sorted: SortedCache,
    /// Result caches; the mutex lets scans under the shared lock publish results.
    pub(crate) caches: Mutex<QueryCaches>,
}

impl DictState {
    pub(crate) fn new(storage: Storage, index: HashIndex) -> Self {
        Self {
            storage,
            index,
            count: 0,
            sorted: SortedCache::default(),
            caches: Mutex::new(QueryCaches::default()),
        }
    }

    /// Decode a committed id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is negative or not below the committed count.
    pub(crate) fn payload_checked(&self, id: StringId) -> &[u8] {
        assert!(
            id >= 0 && (id as usize) < self.count,
            "string id {id} out of range for dictionary of {} entries",
            self.count
        );
        self.storage.payload(id)
    }
}

/// Zero-copy view of one payload. Holds the dictionary's shared lock while alive.
///
/// Do not insert into the same dictionary from the thread holding a view.
pub struct StringBytes<'a>(MappedRwLockReadGuard<'a, [u8]>);

impl Deref for StringBytes<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for StringBytes<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Split `0..len` into at most `parts` contiguous, non-empty ranges.
pub(crate) fn shards(len: usize, parts: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let stride = len.div_ceil(parts.max(1));
    (0..len)
        .step_by(stride)
        .map(|start| start..(start + stride).min(len))
        .collect()
}
