//! Integration tests for persistence: reopen, crash truncation, and file locking.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use strdict_core::{
    DictError, DictionaryOptions, OFFSET_RECORD_SIZE, OFFSETS_FILE_NAME, PAYLOAD_FILE_NAME,
    StringDictionary,
};
use tempfile::TempDir;

fn options() -> DictionaryOptions {
    DictionaryOptions::builder()
        .growth_chunk_bytes(4096)
        .worker_threads(4)
        .build()
}

fn fill(folder: &Path, count: usize) -> Vec<String> {
    let values: Vec<String> = (0..count).map(|i| format!("value-{i:05}")).collect();
    let dict = StringDictionary::open(folder, options()).unwrap();
    let ids: Vec<i32> = dict.get_or_add_bulk(&values).unwrap();
    assert_eq!(ids.len(), count);
    assert!(dict.checkpoint());
    values
}

fn assert_prefix(dict: &StringDictionary, values: &[String], count: usize) {
    assert_eq!(dict.storage_entry_count().unwrap(), count);
    for (id, value) in values.iter().take(count).enumerate() {
        assert_eq!(&dict.get_string(id as i32).unwrap(), value);
        assert_eq!(dict.get_id_of_string(value).unwrap(), id as i32);
    }
}

#[test]
fn reopen_preserves_ids() {
    let dir = TempDir::new().unwrap();
    // Enough records to span several recovery chunks.
    let values = fill(dir.path(), 9_000);

    let dict = StringDictionary::open(dir.path(), options()).unwrap();
    assert_prefix(&dict, &values, 9_000);
    assert!(dict.hash_index_capacity().unwrap() >= 18_000);

    // Appends continue after the recovered tail without clobbering old payloads.
    assert_eq!(dict.get_or_add("fresh").unwrap(), 9_000);
    assert_eq!(dict.get_string(8_999).unwrap(), values[8_999]);
    drop(dict);

    let dict = StringDictionary::open(dir.path(), options()).unwrap();
    assert_eq!(dict.get_id_of_string("fresh").unwrap(), 9_000);
}

#[test]
fn truncated_offsets_tail_is_ignored() {
    let dir = TempDir::new().unwrap();
    let values = fill(dir.path(), 600);

    let offsets = dir.path().join(OFFSETS_FILE_NAME);
    let file = OpenOptions::new().write(true).open(&offsets).unwrap();
    file.set_len((500 * OFFSET_RECORD_SIZE + 7) as u64).unwrap();
    drop(file);

    let dict = StringDictionary::open(dir.path(), options()).unwrap();
    assert_prefix(&dict, &values, 500);
    assert_eq!(dict.get_or_add(&values[550]).unwrap(), 500);
    assert_eq!(dict.get_string(499).unwrap(), values[499]);
}

#[test]
fn canary_record_truncates_the_dictionary() {
    let dir = TempDir::new().unwrap();
    let values = fill(dir.path(), 3_000);

    // Simulate a crash that left record 2_345 uncommitted.
    let offsets = dir.path().join(OFFSETS_FILE_NAME);
    let mut file = OpenOptions::new().write(true).open(&offsets).unwrap();
    file.seek(SeekFrom::Start((2_345 * OFFSET_RECORD_SIZE) as u64))
        .unwrap();
    file.write_all(&[0xFF; OFFSET_RECORD_SIZE]).unwrap();
    drop(file);

    let dict = StringDictionary::open(dir.path(), options()).unwrap();
    assert_prefix(&dict, &values, 2_345);
    assert_eq!(dict.get_id_of_string(&values[2_500]).unwrap(), i32::MIN);
}

#[test]
fn records_past_a_truncated_payload_are_dropped() {
    let dir = TempDir::new().unwrap();
    // Every value is 11 bytes, laid out back to back from offset zero.
    let values = fill(dir.path(), 100);

    // Cut the payload in the middle of value 50.
    let payload = dir.path().join(PAYLOAD_FILE_NAME);
    let file = OpenOptions::new().write(true).open(&payload).unwrap();
    file.set_len(50 * 11 + 5).unwrap();
    drop(file);

    let dict = StringDictionary::open(dir.path(), options()).unwrap();
    assert_prefix(&dict, &values, 50);
    assert_eq!(dict.get_id_of_string(&values[50]).unwrap(), i32::MIN);
    assert_eq!(dict.get_or_add("replacement").unwrap(), 50);
    assert!(dict.checkpoint());
    drop(dict);

    // The dropped records stay dropped once the payload has grown past them again.
    let dict = StringDictionary::open(dir.path(), options()).unwrap();
    assert_eq!(dict.storage_entry_count().unwrap(), 51);
    assert_eq!(dict.get_string(49).unwrap(), values[49]);
    assert_eq!(dict.get_string(50).unwrap(), "replacement");
    assert_eq!(dict.get_id_of_string(&values[60]).unwrap(), i32::MIN);
}

#[test]
fn empty_payload_recovers_nothing() {
    let dir = TempDir::new().unwrap();
    fill(dir.path(), 100);
    let file = OpenOptions::new()
        .write(true)
        .open(dir.path().join(PAYLOAD_FILE_NAME))
        .unwrap();
    file.set_len(0).unwrap();
    drop(file);

    let dict = StringDictionary::open(dir.path(), options()).unwrap();
    assert_eq!(dict.storage_entry_count().unwrap(), 0);
    assert_eq!(dict.get_or_add("value-00042").unwrap(), 0);
    assert_eq!(dict.get_string(0).unwrap(), "value-00042");
}

#[test]
fn open_without_recovery_starts_fresh() {
    let dir = TempDir::new().unwrap();
    fill(dir.path(), 100);
    let dict = StringDictionary::open(
        dir.path(),
        DictionaryOptions::builder().recover(false).build(),
    )
    .unwrap();
    assert_eq!(dict.storage_entry_count().unwrap(), 0);
    assert_eq!(dict.get_or_add("value-00042").unwrap(), 0);
}

#[test]
fn second_handle_is_locked_out() {
    let dir = TempDir::new().unwrap();
    let _first = StringDictionary::open(dir.path(), options()).unwrap();
    assert!(matches!(
        StringDictionary::open(dir.path(), options()),
        Err(DictError::Locked { .. })
    ));
}

#[test]
fn missing_folder_is_payload_unavailable() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(
        StringDictionary::open(&missing, options()),
        Err(DictError::PayloadUnavailable { .. })
    ));
}
