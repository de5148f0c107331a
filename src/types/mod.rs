//! Public types exposed by the `strdict-core` crate.

pub mod common;
pub mod options;

pub use common::{CompareOp, DictHost, DictRef, EncodedId, StringId};
pub use options::{DictionaryOptions, DictionaryOptionsBuilder};
