//! Decoding ids back to strings.

use std::sync::Arc;

use parking_lot::RwLockReadGuard;
use rayon::prelude::*;

use super::{Backend, DictState, StringBytes, StringDictionary, shards};
use crate::error::{DictError, Result};
use crate::types::StringId;

impl StringDictionary {
    /// Decode `id` into an owned string.
    ///
    /// # Panics
    ///
    /// Panics if `id` is negative or not yet committed.
    pub fn get_string(&self, id: StringId) -> Result<String> {
        match &self.backend {
            Backend::Remote(remote) => remote.client.get_string(id),
            Backend::Local(local) => {
                let state = local.state.read_recursive();
                Ok(String::from_utf8_lossy(state.payload_checked(id)).into_owned())
            }
        }
    }

    /// Zero-copy view of the payload of `id`.
    ///
    /// The returned view holds the shared lock, so writers wait until it is dropped.
    /// Other reads stay available while it is held, even with a writer queued.
    /// Inserting from the thread that holds the view deadlocks.
    ///
    /// # Panics
    ///
    /// Panics if `id` is negative or not yet committed.
    pub fn get_string_bytes(&self, id: StringId) -> Result<StringBytes<'_>> {
        match &self.backend {
            Backend::Remote(_) => Err(DictError::UnsupportedRemote {
                operation: "get_string_bytes",
            }),
            Backend::Local(local) => {
                let state = local.state.read_recursive();
                Ok(StringBytes(RwLockReadGuard::map(state, |state| {
                    state.payload_checked(id)
                })))
            }
        }
    }

    /// Number of committed strings, which is also the current generation.
    pub fn storage_entry_count(&self) -> Result<usize> {
        match &self.backend {
            Backend::Remote(remote) => remote.client.storage_entry_count(),
            Backend::Local(local) => Ok(local.state.read_recursive().count),
        }
    }

    /// Every committed string in id order. The result is cached until the next insert.
    pub fn copy_strings(&self) -> Result<Arc<Vec<String>>> {
        let local = match &self.backend {
            Backend::Remote(_) => {
                return Err(DictError::UnsupportedRemote {
                    operation: "copy_strings",
                });
            }
            Backend::Local(local) => local,
        };
        let state = local.state.read_recursive();
        if let Some(strings) = &state.caches.lock().strings {
            return Ok(Arc::clone(strings));
        }

        let view: &DictState = &state;
        let decode =
            |id: usize| String::from_utf8_lossy(view.payload_checked(id as StringId)).into_owned();
        let strings = if state.count > local.options.copy_parallel_threshold {
            let ranges = shards(state.count, local.workers);
            let parts: Vec<Vec<String>> = local.pool.install(|| {
                ranges
                    .into_par_iter()
                    .map(|range| range.map(decode).collect())
                    .collect()
            });
            parts.into_iter().flatten().collect()
        } else {
            (0..state.count).map(decode).collect()
        };
        tracing::debug!(dict.count = state.count, "strings copied");

        let strings = Arc::new(strings);
        state.caches.lock().strings = Some(Arc::clone(&strings));
        Ok(strings)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{DictError, DictionaryOptions, StringDictionary};

    fn dict(threshold: usize) -> StringDictionary {
        StringDictionary::ephemeral(
            DictionaryOptions::builder()
                .copy_parallel_threshold(threshold)
                .worker_threads(3)
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn bytes_view_matches_string() {
        let dict = dict(10);
        let id = dict.get_or_add("héllo").unwrap();
        assert_eq!(&*dict.get_string_bytes(id).unwrap(), "héllo".as_bytes());
        assert_eq!(dict.get_string(id).unwrap(), "héllo");
    }

    #[test]
    fn reads_proceed_while_a_view_is_held_and_a_writer_waits() {
        let dict = dict(10);
        dict.get_or_add("a").unwrap();
        let view = dict.get_string_bytes(0).unwrap();

        std::thread::scope(|scope| {
            let writer = scope.spawn(|| dict.get_or_add("b").unwrap());
            // Give the writer time to queue on the lock behind the view.
            std::thread::sleep(std::time::Duration::from_millis(100));
            assert_eq!(dict.get_string(0).unwrap(), "a");
            assert_eq!(dict.storage_entry_count().unwrap(), 1);
            assert_eq!(dict.get_id_of_string("a").unwrap(), 0);
            assert_eq!(&*view, b"a");
            drop(view);
            assert_eq!(writer.join().unwrap(), 1);
        });
        assert_eq!(dict.get_string(1).unwrap(), "b");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn decoding_uncommitted_id_panics() {
        let dict = dict(10);
        dict.get_or_add("a").unwrap();
        let _ = dict.get_string(1);
    }

    #[test]
    fn copy_is_cached_until_insert() {
        let dict = dict(4);
        for i in 0..50 {
            dict.get_or_add(&format!("s{i}")).unwrap();
        }
        let first = dict.copy_strings().unwrap();
        assert_eq!(first.len(), 50);
        assert_eq!(first[17], "s17");
        assert!(Arc::ptr_eq(&first, &dict.copy_strings().unwrap()));

        dict.get_or_add("late").unwrap();
        let second = dict.copy_strings().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.last().map(String::as_str), Some("late"));
    }

    #[test]
    fn parallel_and_serial_copies_agree() {
        let serial = dict(usize::MAX);
        let parallel = dict(0);
        for i in 0..500 {
            let value = format!("{:x}", i * 7919);
            serial.get_or_add(&value).unwrap();
            parallel.get_or_add(&value).unwrap();
        }
        assert_eq!(*serial.copy_strings().unwrap(), *parallel.copy_strings().unwrap());
    }

    #[test]
    fn remote_only_operations_report_unsupported() {
        let server = crate::remote::LoopbackServer::new();
        let dict_ref = crate::DictRef::new(1, 1);
        server.register(dict_ref, dict(10));
        let remote =
            StringDictionary::remote(&server, crate::DictHost::new("loopback", 0), dict_ref).unwrap();
        assert!(matches!(
            remote.copy_strings(),
            Err(DictError::UnsupportedRemote { .. })
        ));
        assert!(matches!(
            remote.get_string_bytes(0),
            Err(DictError::UnsupportedRemote { .. })
        ));
    }
}
