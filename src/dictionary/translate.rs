//! Re-encoding ids from one dictionary's id space into another's.

use rayon::prelude::*;
use tracing::instrument;

use super::StringDictionary;
use crate::constants::NULL_STRING_ID;
use crate::error::{DictError, Result};
use crate::remote::DictionaryConnector;
use crate::types::{DictHost, DictRef, StringId};

/// Rows per worker above which array translation fans out across the global pool.
const PARALLEL_ROWS_PER_THREAD: usize = 10;

fn decode_source(source: &StringDictionary, id: StringId) -> Result<Option<String>> {
    match id {
        NULL_STRING_ID => Ok(None),
        id if id < 0 => Err(DictError::InvalidArgument {
            reason: format!("cannot translate negative string id {id}"),
        }),
        id => source.get_string(id).map(Some),
    }
}

/// Encode the strings behind `source_ids` into `dest`, adding any that are missing.
///
/// NULL stays NULL; any other negative id is rejected.
#[instrument(level = "debug", skip_all, fields(dict.batch = source_ids.len()))]
pub fn populate_string_ids(
    dest: &StringDictionary,
    source_ids: &[StringId],
    source: &StringDictionary,
) -> Result<Vec<StringId>> {
    let strings = source_ids
        .iter()
        .map(|id| decode_source(source, *id).map(Option::unwrap_or_default))
        .collect::<Result<Vec<String>>>()?;
    dest.get_or_add_bulk::<StringId, _>(&strings)
}

/// Row-wise [`populate_string_ids`] for array columns.
pub fn populate_string_array_ids(
    dest: &StringDictionary,
    source_rows: &[Vec<StringId>],
    source: &StringDictionary,
) -> Result<Vec<Vec<StringId>>> {
    if source_rows.len() / rayon::current_num_threads() > PARALLEL_ROWS_PER_THREAD {
        source_rows
            .par_iter()
            .map(|row| populate_string_ids(dest, row, source))
            .collect()
    } else {
        source_rows
            .iter()
            .map(|row| populate_string_ids(dest, row, source))
            .collect()
    }
}

/// Translate ids between two dictionaries held by the server at `host`.
///
/// The work happens server side over an unbounded connection. Strings absent from
/// the destination, or added to it at or after `dest_generation`, come back NULL.
pub fn translate_string_ids(
    connector: &dyn DictionaryConnector,
    host: &DictHost,
    dest_ref: DictRef,
    source_ids: &[StringId],
    source_ref: DictRef,
    dest_generation: usize,
) -> Result<Vec<StringId>> {
    // The connection is not bound to one dictionary; both refs travel with the call.
    let client = connector.connect(host, DictRef::new(-1, -1), false)?;
    client.translate_string_ids(dest_ref, source_ids, source_ref, dest_generation)
}

/// Lookup-only translation between two dictionaries in this process.
pub(crate) fn translate_local(
    dest: &StringDictionary,
    source_ids: &[StringId],
    source: &StringDictionary,
    dest_generation: usize,
) -> Result<Vec<StringId>> {
    source_ids
        .iter()
        .map(|id| {
            let Some(value) = decode_source(source, *id)? else {
                return Ok(NULL_STRING_ID);
            };
            let dest_id = dest.get_id_of_string(&value)?;
            if dest_id == NULL_STRING_ID || dest_id as usize >= dest_generation {
                return Ok(NULL_STRING_ID);
            }
            Ok(dest_id)
        })
        .collect()
}
