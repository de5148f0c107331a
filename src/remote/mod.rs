//! Proxy seam for dictionaries served by another process.
//!
//! A remote [`StringDictionary`](crate::StringDictionary) forwards each operation to a
//! [`DictionaryClient`]. Clients are created by a [`DictionaryConnector`], once with a
//! call timeout for interactive work and once without for bulk calls.

mod loopback;

pub use loopback::{LoopbackClient, LoopbackServer};

use crate::error::Result;
use crate::types::{CompareOp, DictHost, DictRef, StringId};

/// One connection to a dictionary server, bound to a single dictionary.
pub trait DictionaryClient: Send + Sync {
    fn get_or_add_bulk(&self, values: &[&str]) -> Result<Vec<StringId>>;

    /// Id of `value`, or NULL when absent.
    fn get(&self, value: &str) -> Result<StringId>;

    fn get_string(&self, id: StringId) -> Result<String>;

    fn storage_entry_count(&self) -> Result<usize>;

    fn get_like(
        &self,
        pattern: &str,
        case_insensitive: bool,
        simple: bool,
        escape: u8,
        generation: usize,
    ) -> Result<Vec<StringId>>;

    fn get_regexp_like(&self, pattern: &str, escape: u8, generation: usize)
    -> Result<Vec<StringId>>;

    fn get_compare(&self, pattern: &str, op: CompareOp, generation: usize)
    -> Result<Vec<StringId>>;

    fn checkpoint(&self) -> Result<bool>;

    /// Map ids of `source_ref` into the id space of `dest_ref` on the server.
    ///
    /// Strings missing from the destination, or added at or after `dest_generation`,
    /// map to NULL.
    fn translate_string_ids(
        &self,
        dest_ref: DictRef,
        source_ids: &[StringId],
        source_ref: DictRef,
        dest_generation: usize,
    ) -> Result<Vec<StringId>>;
}

/// Creates clients for a server address.
pub trait DictionaryConnector: Send + Sync {
    fn connect(
        &self,
        host: &DictHost,
        dict_ref: DictRef,
        with_timeout: bool,
    ) -> Result<Box<dyn DictionaryClient>>;
}
