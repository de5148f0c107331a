//! Predicate result caches and the incrementally merged sorted id order.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use rayon::slice::ParallelSliceMut;

use crate::hash_index::PayloadSource;
use crate::types::{CompareOp, StringId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct LikeKey {
    pub pattern: String,
    pub case_insensitive: bool,
    pub simple: bool,
    pub escape: u8,
    pub generation: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RegexKey {
    pub pattern: String,
    pub escape: u8,
    pub generation: usize,
}

/// Where a pattern falls in the sorted order: `lower` entries sort strictly before it,
/// and `exact` tells whether the entry at `lower` equals it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ComparePosition {
    pub lower: usize,
    pub exact: bool,
}

impl ComparePosition {
    /// Sorted-order ranges selected by `op`. `<>` yields two ranges; the rest one.
    pub(crate) fn ranges(self, op: CompareOp, len: usize) -> [Range<usize>; 2] {
        let lower = self.lower;
        let upper = lower + usize::from(self.exact);
        let empty = len..len;
        match op {
            CompareOp::Lt => [0..lower, empty],
            CompareOp::Le => [0..upper, empty],
            CompareOp::Gt => [upper..len, empty],
            CompareOp::Ge => [lower..len, empty],
            CompareOp::Eq => [lower..upper, empty],
            CompareOp::Ne => [0..lower, upper..len],
        }
    }
}

/// Per-predicate caches. Every map is cleared when new strings are committed.
#[derive(Default)]
pub(crate) struct QueryCaches {
    pub like: HashMap<LikeKey, Arc<Vec<StringId>>>,
    pub regex: HashMap<RegexKey, Arc<Vec<StringId>>>,
    /// Point-equality lookups keyed by `(pattern, generation)`.
    pub equal: HashMap<(String, usize), Option<StringId>>,
    /// Binary-search positions into the sorted cache, keyed by pattern.
    pub compare: HashMap<String, ComparePosition>,
    /// Every string in id order, materialized by `copy_strings`.
    pub strings: Option<Arc<Vec<String>>>,
}

impl QueryCaches {
    pub(crate) fn invalidate(&mut self) {
        self.like.clear();
        self.regex.clear();
        self.equal.clear();
        self.compare.clear();
        self.strings = None;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.like.is_empty()
            && self.regex.is_empty()
            && self.equal.is_empty()
            && self.compare.is_empty()
            && self.strings.is_none()
    }
}

/// All committed ids ordered by byte-wise string value.
#[derive(Debug, Default)]
pub(crate) struct SortedCache {
    ids: Vec<StringId>,
}

impl SortedCache {
    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn ids(&self) -> &[StringId] {
        &self.ids
    }

    /// Bring the order up to `count` ids: sort the new suffix on its own, then merge it
    /// into the existing order in one linear pass.
    pub(crate) fn extend<S: PayloadSource + Sync + ?Sized>(&mut self, count: usize, source: &S) {
        let start = self.ids.len();
        if count <= start {
            return;
        }
        let mut fresh: Vec<StringId> = (start..count).map(|id| id as StringId).collect();
        fresh.par_sort_unstable_by(|a, b| source.payload(*a).cmp(source.payload(*b)));

        if self.ids.is_empty() {
            self.ids = fresh;
            return;
        }

        let mut merged = Vec::with_capacity(count);
        let (mut old, mut new) = (self.ids.iter().peekable(), fresh.iter().peekable());
        while let (Some(&&o), Some(&&n)) = (old.peek(), new.peek()) {
            if source.payload(n) < source.payload(o) {
                merged.push(n);
                new.next();
            } else {
                merged.push(o);
                old.next();
            }
        }
        merged.extend(old);
        merged.extend(new);
        tracing::debug!(
            dict.sorted_before = start,
            dict.sorted_after = merged.len(),
            "sorted cache extended"
        );
        self.ids = merged;
    }

    /// Binary search for the insertion point of `pattern`.
    pub(crate) fn position<S: PayloadSource + ?Sized>(
        &self,
        pattern: &[u8],
        source: &S,
    ) -> ComparePosition {
        let lower = self
            .ids
            .partition_point(|id| source.payload(*id) < pattern);
        let exact = self
            .ids
            .get(lower)
            .is_some_and(|id| source.payload(*id) == pattern);
        ComparePosition { lower, exact }
    }
}
