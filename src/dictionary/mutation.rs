//! Encoding: interning strings and resolving existing ones.

use tracing::instrument;

use super::{Backend, DictState, StringDictionary};
use crate::constants::{MAX_STRCOUNT, MAX_STRLEN, NULL_STRING_ID};
use crate::error::{DictError, Result};
use crate::hash_index::rk_hash;
use crate::io::OffsetRecord;
use crate::types::{EncodedId, StringId};

/// Outcome of a locked lookup-or-insert.
enum Interned {
    Existing(StringId),
    Added(StringId),
    /// The id would not fit the requested output width.
    Overflow,
}

impl DictState {
    /// Probe for `bytes` and append it if absent. Caller holds the write lock.
    ///
    /// Caches are left untouched; callers invalidate once per batch.
    fn intern(&mut self, bytes: &[u8], hash: u32, max_valid: usize) -> Result<Interned> {
        let mut bucket = self.index.find_bucket(hash, bytes, &self.storage);
        if let Some(id) = self.index.slot(bucket) {
            return Ok(if id as usize > max_valid {
                Interned::Overflow
            } else {
                Interned::Existing(id)
            });
        }
        // The next id is `count`; it must fit both the dictionary and the output width.
        if self.count >= MAX_STRCOUNT || self.count > max_valid {
            return Ok(Interned::Overflow);
        }
        if self.index.needs_growth(self.count) {
            self.index.grow(self.count, &self.storage);
            bucket = self.index.find_bucket(hash, bytes, &self.storage);
        }

        let offset = self.storage.arena.append(bytes)?;
        self.storage.offsets.put(
            self.count,
            OffsetRecord {
                offset,
                length: bytes.len() as u16,
            },
        )?;
        let id = self.count as StringId;
        self.index.insert_at(bucket, id, hash);
        self.count += 1;
        Ok(Interned::Added(id))
    }

    pub(crate) fn invalidate_caches(&mut self) {
        self.caches.get_mut().invalidate();
    }

    pub(crate) fn lookup(&self, bytes: &[u8]) -> StringId {
        self.index
            .lookup(bytes, &self.storage)
            .unwrap_or(NULL_STRING_ID)
    }
}

fn check_len(value: &str) -> Result<()> {
    if value.len() > MAX_STRLEN {
        return Err(DictError::StringTooLong {
            len: value.len(),
            max: MAX_STRLEN,
        });
    }
    Ok(())
}

fn log_encoding_error<T: EncodedId>(value: &str) {
    tracing::error!(
        dict.width_bits = T::BITS,
        value,
        "could not encode string: the encoded value does not fit, storing NULL instead"
    );
}

impl StringDictionary {
    /// Return the id of `value`, interning it if new.
    ///
    /// The empty string is NULL and never stored. When the dictionary holds
    /// `MAX_STRCOUNT` strings the condition is logged and NULL returned.
    pub fn get_or_add(&self, value: &str) -> Result<StringId> {
        let local = match &self.backend {
            Backend::Remote(remote) => {
                let ids = remote.client.get_or_add_bulk(&[value])?;
                return ids.first().copied().ok_or_else(|| DictError::Remote {
                    reason: "get_or_add_bulk returned no ids".into(),
                });
            }
            Backend::Local(local) => local,
        };
        if value.is_empty() {
            return Ok(NULL_STRING_ID);
        }
        check_len(value)?;
        let bytes = value.as_bytes();
        let hash = rk_hash(bytes);
        {
            let state = local.state.read_recursive();
            let bucket = state.index.find_bucket(hash, bytes, &state.storage);
            if let Some(id) = state.index.slot(bucket) {
                return Ok(id);
            }
        }

        // Re-probe under the write lock: another writer may have added it meanwhile.
        let mut state = local.state.write();
        match state.intern(bytes, hash, <i32 as EncodedId>::max_valid())? {
            Interned::Existing(id) => Ok(id),
            Interned::Added(id) => {
                state.invalidate_caches();
                Ok(id)
            }
            Interned::Overflow => {
                log_encoding_error::<i32>(value);
                Ok(NULL_STRING_ID)
            }
        }
    }

    /// Encode a batch into ids of width `T`, holding the write lock for the whole batch.
    ///
    /// Empty strings and values whose id does not fit `T` become `T::null()`; overflow
    /// is logged per value and never fails the batch.
    #[instrument(level = "debug", skip_all, fields(dict.batch = values.len(), dict.width_bits = T::BITS))]
    pub fn get_or_add_bulk<T: EncodedId, S: AsRef<str>>(&self, values: &[S]) -> Result<Vec<T>> {
        let local = match &self.backend {
            Backend::Remote(remote) => {
                let strs: Vec<&str> = values.iter().map(AsRef::as_ref).collect();
                let ids = remote.client_no_timeout.get_or_add_bulk(&strs)?;
                return Ok(ids
                    .into_iter()
                    .zip(&strs)
                    .map(|(id, value)| {
                        if id == NULL_STRING_ID {
                            return T::null();
                        }
                        if id < 0 || id as usize > T::max_valid() {
                            log_encoding_error::<T>(value);
                            return T::null();
                        }
                        T::from_id(id)
                    })
                    .collect());
            }
            Backend::Local(local) => local,
        };
        for value in values {
            check_len(value.as_ref())?;
        }

        let mut state = local.state.write();
        let mut added = 0usize;
        let mut encoded = Vec::with_capacity(values.len());
        for value in values {
            let value = value.as_ref();
            if value.is_empty() {
                encoded.push(T::null());
                continue;
            }
            let bytes = value.as_bytes();
            match state.intern(bytes, rk_hash(bytes), T::max_valid())? {
                Interned::Existing(id) => encoded.push(T::from_id(id)),
                Interned::Added(id) => {
                    added += 1;
                    encoded.push(T::from_id(id));
                }
                Interned::Overflow => {
                    log_encoding_error::<T>(value);
                    encoded.push(T::null());
                }
            }
        }
        if added > 0 {
            state.invalidate_caches();
        }
        tracing::debug!(dict.added = added, dict.count = state.count, "bulk encode done");
        Ok(encoded)
    }

    /// Encode each row of an array column independently.
    pub fn get_or_add_bulk_array<S: AsRef<str>>(
        &self,
        rows: &[Vec<S>],
    ) -> Result<Vec<Vec<StringId>>> {
        rows.iter()
            .map(|row| self.get_or_add_bulk::<StringId, S>(row))
            .collect()
    }

    /// Id of `value` without inserting it; NULL when absent.
    pub fn get_id_of_string(&self, value: &str) -> Result<StringId> {
        match &self.backend {
            Backend::Remote(remote) => remote.client.get(value),
            Backend::Local(local) => Ok(local.state.read_recursive().lookup(value.as_bytes())),
        }
    }
}
