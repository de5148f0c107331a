use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{DictionaryClient, DictionaryConnector};
use crate::dictionary::{StringDictionary, translate::translate_local};
use crate::error::{DictError, Result};
use crate::types::{CompareOp, DictHost, DictRef, StringId};

#[derive(Default)]
struct Registry {
    dictionaries: RwLock<HashMap<DictRef, Arc<StringDictionary>>>,
    timeout_calls: AtomicUsize,
    unbounded_calls: AtomicUsize,
}

/// In-process dictionary server. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct LoopbackServer {
    registry: Arc<Registry>,
}

impl LoopbackServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `dict` under `dict_ref`, replacing any previous registration.
    pub fn register(&self, dict_ref: DictRef, dict: StringDictionary) -> Arc<StringDictionary> {
        let dict = Arc::new(dict);
        self.registry
            .dictionaries
            .write()
            .insert(dict_ref, Arc::clone(&dict));
        tracing::debug!(dict.dict_ref = %dict_ref, "dictionary registered");
        dict
    }

    /// Calls served through timeout-bounded clients.
    #[must_use]
    pub fn timeout_calls(&self) -> usize {
        self.registry.timeout_calls.load(Ordering::Relaxed)
    }

    /// Calls served through unbounded clients.
    #[must_use]
    pub fn unbounded_calls(&self) -> usize {
        self.registry.unbounded_calls.load(Ordering::Relaxed)
    }

    fn dictionary(&self, dict_ref: DictRef) -> Result<Arc<StringDictionary>> {
        self.registry
            .dictionaries
            .read()
            .get(&dict_ref)
            .cloned()
            .ok_or_else(|| DictError::Remote {
                reason: format!("no dictionary registered as {dict_ref}"),
            })
    }
}

impl DictionaryConnector for LoopbackServer {
    fn connect(
        &self,
        host: &DictHost,
        dict_ref: DictRef,
        with_timeout: bool,
    ) -> Result<Box<dyn DictionaryClient>> {
        tracing::trace!(dict.host = %host, dict.dict_ref = %dict_ref, with_timeout, "loopback connect");
        Ok(Box::new(LoopbackClient {
            server: self.clone(),
            dict_ref,
            with_timeout,
        }))
    }
}

/// Client side of a [`LoopbackServer`] connection.
pub struct LoopbackClient {
    server: LoopbackServer,
    dict_ref: DictRef,
    with_timeout: bool,
}

impl LoopbackClient {
    /// Count the call and resolve the bound dictionary.
    fn target(&self) -> Result<Arc<StringDictionary>> {
        self.record();
        self.server.dictionary(self.dict_ref)
    }

    fn record(&self) {
        let counter = if self.with_timeout {
            &self.server.registry.timeout_calls
        } else {
            &self.server.registry.unbounded_calls
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl DictionaryClient for LoopbackClient {
    fn get_or_add_bulk(&self, values: &[&str]) -> Result<Vec<StringId>> {
        self.target()?.get_or_add_bulk::<StringId, _>(values)
    }

    fn get(&self, value: &str) -> Result<StringId> {
        self.target()?.get_id_of_string(value)
    }

    fn get_string(&self, id: StringId) -> Result<String> {
        self.target()?.get_string(id)
    }

    fn storage_entry_count(&self) -> Result<usize> {
        self.target()?.storage_entry_count()
    }

    fn get_like(
        &self,
        pattern: &str,
        case_insensitive: bool,
        simple: bool,
        escape: u8,
        generation: usize,
    ) -> Result<Vec<StringId>> {
        self.target()?
            .get_like(pattern, case_insensitive, simple, escape, generation)
    }

    fn get_regexp_like(
        &self,
        pattern: &str,
        escape: u8,
        generation: usize,
    ) -> Result<Vec<StringId>> {
        self.target()?.get_regexp_like(pattern, escape, generation)
    }

    fn get_compare(
        &self,
        pattern: &str,
        op: CompareOp,
        generation: usize,
    ) -> Result<Vec<StringId>> {
        self.target()?.compare(pattern, op, generation)
    }

    fn checkpoint(&self) -> Result<bool> {
        Ok(self.target()?.checkpoint())
    }

    fn translate_string_ids(
        &self,
        dest_ref: DictRef,
        source_ids: &[StringId],
        source_ref: DictRef,
        dest_generation: usize,
    ) -> Result<Vec<StringId>> {
        self.record();
        let dest = self.server.dictionary(dest_ref)?;
        let source = self.server.dictionary(source_ref)?;
        translate_local(&dest, source_ids, &source, dest_generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DictionaryOptions;

    #[test]
    fn unknown_dictionary_is_a_remote_error() {
        let server = LoopbackServer::new();
        let client = server
            .connect(&DictHost::new("loopback", 0), DictRef::new(9, 9), true)
            .unwrap();
        assert!(matches!(
            client.storage_entry_count(),
            Err(DictError::Remote { .. })
        ));
        assert_eq!(server.timeout_calls(), 1);
        assert_eq!(server.unbounded_calls(), 0);
    }

    #[test]
    fn clients_share_the_registry() {
        let server = LoopbackServer::new();
        let dict_ref = DictRef::new(1, 2);
        let local = server.register(
            dict_ref,
            StringDictionary::ephemeral(DictionaryOptions::default()).unwrap(),
        );
        let client = server
            .clone()
            .connect(&DictHost::new("loopback", 0), dict_ref, false)
            .unwrap();
        assert_eq!(client.get_or_add_bulk(&["x", "y", "x"]).unwrap(), vec![0, 1, 0]);
        assert_eq!(local.storage_entry_count().unwrap(), 2);
        assert_eq!(server.unbounded_calls(), 1);
    }
}
