//! Builder-style options used when opening a dictionary.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COPY_PARALLEL_THRESHOLD, DEFAULT_GROWTH_CHUNK_BYTES, DEFAULT_INITIAL_CAPACITY,
};

fn default_true() -> bool {
    true
}

fn default_initial_capacity() -> usize {
    DEFAULT_INITIAL_CAPACITY
}

fn default_growth_chunk_bytes() -> usize {
    DEFAULT_GROWTH_CHUNK_BYTES
}

fn default_copy_parallel_threshold() -> usize {
    DEFAULT_COPY_PARALLEL_THRESHOLD
}

/// Tunable options for a local dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryOptions {
    /// Starting hash index capacity. Must be a power of two.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    /// Keep a per-id hash array so probes can skip byte comparisons on mismatch
    /// and growth can rehash without touching payload bytes.
    #[serde(default)]
    pub materialize_hashes: bool,
    /// Rebuild from existing files on open. When false, existing files are truncated.
    #[serde(default = "default_true")]
    pub recover: bool,
    /// Worker pool size for scans and recovery. `None` uses every CPU.
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Growth increment for the payload and offset stores.
    #[serde(default = "default_growth_chunk_bytes")]
    pub growth_chunk_bytes: usize,
    /// Entry count above which `copy_strings` runs on the worker pool.
    #[serde(default = "default_copy_parallel_threshold")]
    pub copy_parallel_threshold: usize,
}

impl Default for DictionaryOptions {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            materialize_hashes: false,
            recover: true,
            worker_threads: None,
            growth_chunk_bytes: DEFAULT_GROWTH_CHUNK_BYTES,
            copy_parallel_threshold: DEFAULT_COPY_PARALLEL_THRESHOLD,
        }
    }
}

impl DictionaryOptions {
    /// Start a fluent builder for `DictionaryOptions`.
    #[must_use]
    pub fn builder() -> DictionaryOptionsBuilder {
        DictionaryOptionsBuilder::default()
    }

    /// Effective worker count; never zero.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DictionaryOptionsBuilder {
    inner: DictionaryOptions,
}

impl DictionaryOptionsBuilder {
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.inner.initial_capacity = capacity;
        self
    }

    #[must_use]
    pub fn materialize_hashes(mut self, enabled: bool) -> Self {
        self.inner.materialize_hashes = enabled;
        self
    }

    #[must_use]
    pub fn recover(mut self, enabled: bool) -> Self {
        self.inner.recover = enabled;
        self
    }

    #[must_use]
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.inner.worker_threads = Some(threads);
        self
    }

    /// Growth increment in bytes. Small values are useful in tests to force remaps.
    #[must_use]
    pub fn growth_chunk_bytes(mut self, bytes: usize) -> Self {
        self.inner.growth_chunk_bytes = bytes;
        self
    }

    #[must_use]
    pub fn copy_parallel_threshold(mut self, threshold: usize) -> Self {
        self.inner.copy_parallel_threshold = threshold;
        self
    }

    #[must_use]
    pub fn build(self) -> DictionaryOptions {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let options: DictionaryOptions =
            serde_json::from_str(r#"{"materialize_hashes": true}"#).expect("parse options");
        assert!(options.materialize_hashes);
        assert!(options.recover);
        assert_eq!(options.initial_capacity, DEFAULT_INITIAL_CAPACITY);
        assert_eq!(options.growth_chunk_bytes, DEFAULT_GROWTH_CHUNK_BYTES);
    }

    #[test]
    fn worker_count_is_never_zero() {
        let options = DictionaryOptions::builder().worker_threads(0).build();
        assert_eq!(options.worker_count(), 1);
    }
}
