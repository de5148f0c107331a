//! Storage primitives: the payload arena, the offset index, and their backings.

pub mod arena;
pub(crate) mod backing;
pub mod offsets;

pub use arena::PayloadArena;
pub use offsets::{OffsetIndex, OffsetRecord};
