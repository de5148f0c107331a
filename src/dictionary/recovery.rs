//! Rebuild the hash index and counters of a persistent dictionary from its files.
//!
//! The committed count is not stored anywhere; it is whatever prefix of the offsets
//! file holds real records. Chunks of ids are read in parallel, each stopping at the
//! first canary record, and merged back in id order so every string keeps its id.

use std::ops::Range;

use rayon::prelude::*;
use tracing::instrument;

use super::{DictState, Storage};
use crate::constants::{RECOVERY_MAX_CHUNK, RECOVERY_MIN_CHUNK};
use crate::hash_index::{HashIndex, rk_hash, round_up_p2};

/// Recovered hashes for one chunk, plus the payload end of its last record.
struct ChunkScan {
    hashes: Vec<u32>,
    tail: Option<u64>,
    /// The chunk hit a canary or unreadable record before its end.
    stopped_early: bool,
}

#[instrument(level = "debug", skip_all)]
pub(super) fn recover(state: &mut DictState, workers: usize) {
    let slots = state.storage.offsets.slot_count();
    if state.storage.offsets.trailing_bytes() != 0 {
        tracing::warn!(
            dict.path = ?state.storage.offsets.path(),
            dict.trailing_bytes = state.storage.offsets.trailing_bytes(),
            "offsets file is truncated; ignoring partial trailing record"
        );
    }

    let DictState {
        storage,
        index,
        count,
        ..
    } = state;
    *index = HashIndex::new(round_up_p2(slots * 2 + 1), index.materializes_hashes());

    let threads = workers.max(1);
    let per_chunk = (slots / threads + 1).clamp(RECOVERY_MIN_CHUNK, RECOVERY_MAX_CHUNK);
    let chunks: Vec<Range<usize>> = (0..slots)
        .step_by(per_chunk)
        .map(|start| start..(start + per_chunk).min(slots))
        .collect();

    let mut recovered = 0usize;
    let mut tail = 0u64;
    // Draining one wave of `threads` chunks at a time bounds the outstanding work.
    'waves: for wave in chunks.chunks(threads) {
        let storage: &Storage = storage;
        let scans: Vec<ChunkScan> = wave
            .par_iter()
            .map(|range| scan_chunk(storage, range.clone()))
            .collect();
        for scan in scans {
            for hash in scan.hashes {
                index.insert_unique(recovered as i32, hash);
                recovered += 1;
            }
            if let Some(end) = scan.tail {
                tail = end;
            }
            if scan.stopped_early {
                break 'waves;
            }
        }
    }

    *count = recovered;
    storage.arena.set_tail(tail);
    // Later appends must not revive records past the cut.
    storage.offsets.clear_from(recovered);
    tracing::info!(
        dict.slots = slots,
        dict.recovered = recovered,
        dict.payload_tail = tail,
        dict.hash_capacity = index.capacity(),
        "dictionary recovered"
    );
}

fn scan_chunk(storage: &Storage, range: Range<usize>) -> ChunkScan {
    let mut scan = ChunkScan {
        hashes: Vec::with_capacity(range.len()),
        tail: None,
        stopped_early: false,
    };
    for id in range {
        let Some(record) = storage.offsets.get(id) else {
            // Canary: everything from here on was never committed.
            scan.stopped_early = true;
            break;
        };
        let len = record.length as usize;
        // Bytes past the persisted length are canary fill from growth on open.
        if !storage.arena.persisted(record.offset, len) {
            tracing::warn!(
                dict.id = id,
                dict.offset = record.offset,
                dict.length = len,
                "offset record points past the payload file; truncating dictionary here"
            );
            scan.stopped_early = true;
            break;
        }
        scan.hashes.push(rk_hash(storage.arena.read(record.offset, len)));
        scan.tail = Some(record.offset + len as u64);
    }
    scan
}
