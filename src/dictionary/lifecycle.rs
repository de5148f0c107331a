//! Lifecycle management for persistent, ephemeral and remote dictionaries.
//!
//! Responsibilities:
//! - Open (or create) the offsets and payload files of a persistent dictionary, locking
//!   them for the lifetime of the handle, and replay them when recovering.
//! - Hand out the process-wide worker pool shared by every dictionary's scans and
//!   recovery.
//! - Connect remote dictionaries over a timeout-bounded and an unbounded client.
//! - Checkpoint durable state on request and on drop.

use std::path::Path;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::instrument;

use super::recovery::recover;
use super::{Backend, DictState, LocalDictionary, RemoteDictionary, Storage, StringDictionary};
use crate::constants::{OFFSETS_FILE_NAME, PAYLOAD_FILE_NAME};
use crate::error::{DictError, Result};
use crate::hash_index::HashIndex;
use crate::io::{OffsetIndex, PayloadArena};
use crate::remote::DictionaryConnector;
use crate::types::{DictHost, DictRef, DictionaryOptions};

impl StringDictionary {
    /// Open a durable dictionary stored in `folder`.
    ///
    /// With `options.recover` the existing files are replayed and every previously
    /// committed string keeps its id; otherwise the files are truncated.
    ///
    /// # Panics
    ///
    /// Panics if `options.initial_capacity` is not a power of two.
    #[instrument(level = "debug", skip_all, fields(dict.folder = %folder.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(folder: P, options: DictionaryOptions) -> Result<Self> {
        let folder = folder.as_ref();
        let index = HashIndex::new(options.initial_capacity, options.materialize_hashes);
        let arena = PayloadArena::open(
            &folder.join(PAYLOAD_FILE_NAME),
            options.recover,
            options.growth_chunk_bytes,
        )?;
        let offsets = OffsetIndex::open(
            &folder.join(OFFSETS_FILE_NAME),
            options.recover,
            options.growth_chunk_bytes,
        )?;
        let pool = worker_pool()?;
        let workers = options.worker_count();

        let mut state = DictState::new(Storage { arena, offsets }, index);
        if options.recover {
            pool.install(|| recover(&mut state, workers));
        }
        tracing::info!(
            dict.folder = %folder.display(),
            dict.count = state.count,
            dict.recover = options.recover,
            "dictionary opened"
        );

        Ok(Self {
            backend: Backend::Local(LocalDictionary {
                state: RwLock::new(state),
                pool,
                workers,
                options,
                folder: Some(folder.to_path_buf()),
            }),
        })
    }

    /// Create a heap-backed dictionary for transient results. Nothing touches disk.
    ///
    /// # Panics
    ///
    /// Panics if `options.initial_capacity` is not a power of two.
    pub fn ephemeral(options: DictionaryOptions) -> Result<Self> {
        let index = HashIndex::new(options.initial_capacity, options.materialize_hashes);
        let storage = Storage {
            arena: PayloadArena::in_memory(options.growth_chunk_bytes)?,
            offsets: OffsetIndex::in_memory(options.growth_chunk_bytes)?,
        };
        let pool = worker_pool()?;
        Ok(Self {
            backend: Backend::Local(LocalDictionary {
                state: RwLock::new(DictState::new(storage, index)),
                pool,
                workers: options.worker_count(),
                options,
                folder: None,
            }),
        })
    }

    /// Bind to a dictionary served elsewhere. Every operation is forwarded.
    pub fn remote(
        connector: &dyn DictionaryConnector,
        host: DictHost,
        dict_ref: DictRef,
    ) -> Result<Self> {
        let client = connector.connect(&host, dict_ref, true)?;
        let client_no_timeout = connector.connect(&host, dict_ref, false)?;
        tracing::debug!(dict.host = %host, dict.dict_ref = %dict_ref, "remote dictionary bound");
        Ok(Self {
            backend: Backend::Remote(RemoteDictionary {
                client,
                client_no_timeout,
                host,
                dict_ref,
            }),
        })
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self.backend, Backend::Remote(_))
    }

    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        matches!(&self.backend, Backend::Local(local) if local.folder.is_none())
    }

    /// Storage folder of a durable dictionary.
    #[must_use]
    pub fn folder(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Local(local) => local.folder.as_deref(),
            Backend::Remote(_) => None,
        }
    }

    #[must_use]
    pub fn options(&self) -> Option<&DictionaryOptions> {
        match &self.backend {
            Backend::Local(local) => Some(&local.options),
            Backend::Remote(_) => None,
        }
    }

    /// Server address and dictionary reference of a remote dictionary.
    #[must_use]
    pub fn remote_ref(&self) -> Option<(&DictHost, DictRef)> {
        match &self.backend {
            Backend::Local(_) => None,
            Backend::Remote(remote) => Some((&remote.host, remote.dict_ref)),
        }
    }

    /// Current hash index capacity of a local dictionary.
    #[must_use]
    pub fn hash_index_capacity(&self) -> Option<usize> {
        match &self.backend {
            Backend::Local(local) => Some(local.state.read_recursive().index.capacity()),
            Backend::Remote(_) => None,
        }
    }

    /// Flush and fsync both storage files. Never fails; reports success instead.
    ///
    /// Ephemeral dictionaries have nothing to sync and report success.
    pub fn checkpoint(&self) -> bool {
        match &self.backend {
            Backend::Remote(remote) => match remote.client.checkpoint() {
                Ok(ok) => ok,
                Err(err) => {
                    tracing::warn!(error = %err, dict.dict_ref = %remote.dict_ref, "remote checkpoint failed");
                    false
                }
            },
            Backend::Local(local) => {
                if local.folder.is_none() {
                    return true;
                }
                let state = local.state.read_recursive();
                let synced = state
                    .storage
                    .offsets
                    .sync()
                    .and_then(|()| state.storage.arena.sync());
                match synced {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            dict.folder = ?local.folder,
                            "dictionary checkpoint failed"
                        );
                        false
                    }
                }
            }
        }
    }
}

impl Drop for StringDictionary {
    fn drop(&mut self) {
        if let Backend::Local(local) = &self.backend {
            if local.folder.is_some() && !self.checkpoint() {
                tracing::error!(dict.folder = ?self.folder(), "checkpoint on close failed");
            }
        }
    }
}

static WORKER_POOL: OnceCell<ThreadPool> = OnceCell::new();

/// Pool for scan, sort, copy and recovery tasks, sized to the machine once per process.
///
/// Kept apart from rayon's global pool: tasks here never take a dictionary lock, so a
/// worker blocked in a join cannot steal work that waits on the lock its caller holds.
pub(crate) fn worker_pool() -> Result<&'static ThreadPool> {
    WORKER_POOL.get_or_try_init(|| {
        let threads = num_cpus::get().max(1);
        tracing::debug!(dict.worker_threads = threads, "starting dictionary worker pool");
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("strdict-worker-{idx}"))
            .build()
            .map_err(|err| DictError::Io(std::io::Error::other(err)))
    })
}
