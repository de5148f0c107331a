//! Layout constants shared by the storage files and the engine.

use crate::types::StringId;

/// Sentinel id for NULL and the empty string.
pub const NULL_STRING_ID: StringId = i32::MIN;

/// Longest payload a single entry may carry. One below the canary length.
pub const MAX_STRLEN: usize = (1 << 15) - 1;

/// Upper bound on distinct strings per dictionary.
pub const MAX_STRCOUNT: usize = (1 << 31) - 1;

/// Length value marking an uncommitted offset record.
pub const CANARY_LENGTH: u16 = 0xFFFF;

/// Fill byte for freshly grown storage.
pub const CANARY_BYTE: u8 = 0xFF;

/// Size of one on-disk offset record: `[offset: u64][length: u16][reserved: 6]`.
pub const OFFSET_RECORD_SIZE: usize = 16;

/// Default growth increment for both storage files (1024 pages of 4 KiB).
pub const DEFAULT_GROWTH_CHUNK_BYTES: usize = 1024 * 4096;

/// Default hash index capacity. Must be a power of two.
pub const DEFAULT_INITIAL_CAPACITY: usize = 256;

/// `copy_strings` switches to the worker pool above this many entries.
pub const DEFAULT_COPY_PARALLEL_THRESHOLD: usize = 10_000;

/// Recovery chunk bounds, in ids per task.
pub const RECOVERY_MIN_CHUNK: usize = 2_000;
pub const RECOVERY_MAX_CHUNK: usize = 200_000;

/// File names inside a persistent dictionary folder.
pub const OFFSETS_FILE_NAME: &str = "DictOffsets";
pub const PAYLOAD_FILE_NAME: &str = "DictPayload";
