//! Predicate evaluation: `LIKE`, regexp and ordered comparison against a pattern.
//!
//! Every query is bounded by a generation (a committed count) and only reports ids
//! below it. Scans split `[0, generation)` into one contiguous shard per configured
//! worker and run on the shared worker pool under the shared lock. Results are cached
//! per parameters and generation.
//! Ordered comparisons use the sorted cache, which is brought up to date lazily.

use std::sync::Arc;

use parking_lot::RwLockWriteGuard;
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::instrument;

use super::{Backend, DictState, LocalDictionary, StringDictionary, shards};
use crate::cache::{LikeKey, RegexKey};
use crate::error::Result;
use crate::hash_index::PayloadSource;
use crate::pattern::Matcher;
use crate::types::{CompareOp, StringId};

impl StringDictionary {
    /// Ids below `generation` whose string matches the `LIKE` pattern, in id order.
    ///
    /// With `simple` the pattern is a bare literal matched by substring containment.
    ///
    /// # Panics
    ///
    /// Panics if `generation` exceeds the committed count.
    #[instrument(level = "debug", skip(self, pattern), fields(dict.pattern_len = pattern.len()))]
    pub fn get_like(
        &self,
        pattern: &str,
        case_insensitive: bool,
        simple: bool,
        escape: u8,
        generation: usize,
    ) -> Result<Vec<StringId>> {
        let local = match &self.backend {
            Backend::Remote(remote) => {
                return remote
                    .client
                    .get_like(pattern, case_insensitive, simple, escape, generation);
            }
            Backend::Local(local) => local,
        };
        let state = local.state.read_recursive();
        check_generation(&state, generation);
        let key = LikeKey {
            pattern: pattern.to_owned(),
            case_insensitive,
            simple,
            escape,
            generation,
        };
        if let Some(hit) = state.caches.lock().like.get(&key) {
            return Ok(hit.as_ref().clone());
        }

        let matcher = Matcher::like(pattern, case_insensitive, simple, escape);
        let ids = scan(local.pool, local.workers, &state, generation, |bytes| matcher.is_match(bytes));
        state.caches.lock().like.insert(key, Arc::new(ids.clone()));
        Ok(ids)
    }

    /// Ids below `generation` whose whole string matches the regular expression.
    ///
    /// # Errors
    ///
    /// Returns `DictError::InvalidPattern` if the expression does not compile.
    ///
    /// # Panics
    ///
    /// Panics if `generation` exceeds the committed count.
    #[instrument(level = "debug", skip(self, pattern), fields(dict.pattern_len = pattern.len()))]
    pub fn get_regexp_like(
        &self,
        pattern: &str,
        escape: u8,
        generation: usize,
    ) -> Result<Vec<StringId>> {
        let local = match &self.backend {
            Backend::Remote(remote) => {
                return remote.client.get_regexp_like(pattern, escape, generation);
            }
            Backend::Local(local) => local,
        };
        let state = local.state.read_recursive();
        check_generation(&state, generation);
        let key = RegexKey {
            pattern: pattern.to_owned(),
            escape,
            generation,
        };
        if let Some(hit) = state.caches.lock().regex.get(&key) {
            return Ok(hit.as_ref().clone());
        }

        let matcher = Matcher::regexp(pattern, escape)?;
        let ids = scan(local.pool, local.workers, &state, generation, |bytes| matcher.is_match(bytes));
        state.caches.lock().regex.insert(key, Arc::new(ids.clone()));
        Ok(ids)
    }

    /// Ordered comparison with the operator given in SQL spelling (`=`, `<>`, `<`, ...).
    ///
    /// # Errors
    ///
    /// Returns `DictError::UnsupportedOperator` for any other operator string.
    pub fn get_compare(
        &self,
        pattern: &str,
        op: &str,
        generation: usize,
    ) -> Result<Vec<StringId>> {
        self.compare(pattern, op.parse()?, generation)
    }

    /// Ids below `generation` whose string compares to `pattern` as `op` asks.
    ///
    /// Results come in string order, except for the point-equality path which yields
    /// id order. `<`, `=` and `>` partition the generation.
    ///
    /// # Panics
    ///
    /// Panics if `generation` exceeds the committed count.
    #[instrument(level = "debug", skip(self, pattern, op), fields(dict.op = %op))]
    pub fn compare(
        &self,
        pattern: &str,
        op: CompareOp,
        generation: usize,
    ) -> Result<Vec<StringId>> {
        let local = match &self.backend {
            Backend::Remote(remote) => {
                return remote.client.get_compare(pattern, op, generation);
            }
            Backend::Local(local) => local,
        };

        let mut state = local.state.read_recursive();
        check_generation(&state, generation);
        if state.sorted.len() < state.count {
            match op {
                CompareOp::Eq => {
                    return Ok(equal_id(local, &state, pattern, generation)
                        .into_iter()
                        .collect());
                }
                CompareOp::Ne => {
                    let hit = equal_id(local, &state, pattern, generation);
                    return Ok((0..generation)
                        .map(|id| id as StringId)
                        .filter(|id| Some(*id) != hit)
                        .collect());
                }
                _ => {}
            }
            drop(state);
            let mut writer = local.state.write();
            let DictState {
                storage,
                sorted,
                count,
                ..
            } = &mut *writer;
            local.pool.install(|| sorted.extend(*count, &*storage));
            state = RwLockWriteGuard::downgrade(writer);
        }

        let position = {
            let mut caches = state.caches.lock();
            *caches
                .compare
                .entry(pattern.to_owned())
                .or_insert_with(|| state.sorted.position(pattern.as_bytes(), &state.storage))
        };
        let sorted = state.sorted.ids();
        let ranges = position.ranges(op, sorted.len());
        Ok(ranges
            .into_iter()
            .flat_map(|range| sorted[range].iter().copied())
            .filter(|id| (*id as usize) < generation)
            .collect())
    }
}

fn check_generation(state: &DictState, generation: usize) {
    assert!(
        generation <= state.count,
        "generation {generation} is ahead of the dictionary ({} entries)",
        state.count
    );
}

/// Point lookup used while the sorted cache is behind: a parallel scan for the first
/// id holding exactly `pattern`, cached per generation.
fn equal_id(
    local: &LocalDictionary,
    state: &DictState,
    pattern: &str,
    generation: usize,
) -> Option<StringId> {
    let key = (pattern.to_owned(), generation);
    if let Some(hit) = state.caches.lock().equal.get(&key) {
        return *hit;
    }
    let needle = pattern.as_bytes();
    let hit = scan(local.pool, local.workers, state, generation, |bytes| bytes == needle)
        .first()
        .copied();
    state.caches.lock().equal.insert(key, hit);
    hit
}

/// Ids in `[0, generation)` whose payload satisfies `pred`, in id order.
fn scan<F>(
    pool: &ThreadPool,
    workers: usize,
    state: &DictState,
    generation: usize,
    pred: F,
) -> Vec<StringId>
where
    F: Fn(&[u8]) -> bool + Sync,
{
    let ranges = shards(generation, workers);
    let parts: Vec<Vec<StringId>> = pool.install(|| {
        ranges
            .into_par_iter()
            .map(|range| {
                range
                    .map(|id| id as StringId)
                    .filter(|id| pred(state.storage.payload(*id)))
                    .collect()
            })
            .collect()
    });
    parts.concat()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::pattern::DEFAULT_ESCAPE;
    use crate::{CompareOp, DictError, DictionaryOptions, StringDictionary};

    fn fruit() -> StringDictionary {
        let dict = StringDictionary::ephemeral(DictionaryOptions::builder().worker_threads(2).build())
            .unwrap();
        for value in ["apple", "banana", "cherry", "Apricot", "date"] {
            dict.get_or_add(value).unwrap();
        }
        dict
    }

    fn set(ids: Vec<i32>) -> HashSet<i32> {
        ids.into_iter().collect()
    }

    #[test]
    fn like_variants() {
        let dict = fruit();
        assert_eq!(dict.get_like("a%", false, false, DEFAULT_ESCAPE, 5).unwrap(), vec![0]);
        assert_eq!(dict.get_like("a%", true, false, DEFAULT_ESCAPE, 5).unwrap(), vec![0, 3]);
        assert_eq!(dict.get_like("an", false, true, DEFAULT_ESCAPE, 5).unwrap(), vec![1]);
        assert_eq!(dict.get_like("_a%", false, false, DEFAULT_ESCAPE, 5).unwrap(), vec![1, 4]);
        // Generation bounds the visible ids.
        assert_eq!(dict.get_like("%a%", false, false, DEFAULT_ESCAPE, 2).unwrap(), vec![0, 1]);
    }

    #[test]
    fn regexp_full_match() {
        let dict = fruit();
        assert_eq!(dict.get_regexp_like("[a-c].*", DEFAULT_ESCAPE, 5).unwrap(), vec![0, 1, 2]);
        assert_eq!(dict.get_regexp_like("an", DEFAULT_ESCAPE, 5).unwrap(), Vec::<i32>::new());
        assert!(matches!(
            dict.get_regexp_like("(", DEFAULT_ESCAPE, 5),
            Err(DictError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn compare_ordering_is_bytewise() {
        let dict = fruit();
        assert_eq!(dict.get_compare("banana", "<", 5).unwrap(), vec![3, 0]);
        assert_eq!(dict.get_compare("banana", "<=", 5).unwrap(), vec![3, 0, 1]);
        assert_eq!(dict.get_compare("banana", ">", 5).unwrap(), vec![2, 4]);
        assert_eq!(set(dict.get_compare("banana", "<>", 5).unwrap()), set(vec![0, 2, 3, 4]));
        assert!(matches!(
            dict.get_compare("banana", "~", 5),
            Err(DictError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn equality_before_and_after_sorting_agree() {
        let dict = fruit();
        // Sorted cache is behind: point-equality path.
        assert_eq!(dict.compare("cherry", CompareOp::Eq, 5).unwrap(), vec![2]);
        assert_eq!(set(dict.compare("cherry", CompareOp::Ne, 5).unwrap()), set(vec![0, 1, 3, 4]));
        assert!(dict.compare("kiwi", CompareOp::Eq, 5).unwrap().is_empty());

        // An ordered operator brings the sorted cache up to date.
        dict.compare("cherry", CompareOp::Ge, 5).unwrap();
        assert_eq!(dict.compare("cherry", CompareOp::Eq, 5).unwrap(), vec![2]);
        assert_eq!(set(dict.compare("cherry", CompareOp::Ne, 5).unwrap()), set(vec![0, 1, 3, 4]));
    }

    #[test]
    fn compare_respects_generation_after_growth() {
        let dict = fruit();
        assert_eq!(dict.get_compare("c", ">", 5).unwrap(), vec![2, 4]);
        dict.get_or_add("coconut").unwrap();
        assert_eq!(dict.get_compare("c", ">", 5).unwrap(), vec![2, 4]);
        assert_eq!(dict.get_compare("c", ">", 6).unwrap(), vec![2, 5, 4]);
    }

    #[test]
    #[should_panic(expected = "ahead of the dictionary")]
    fn future_generation_panics() {
        let dict = fruit();
        let _ = dict.get_like("%", false, false, DEFAULT_ESCAPE, 6);
    }
}
