#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Lint exceptions allowed crate-wide:
//
// Documentation: contract-violation panics and error variants are described on the
// public types rather than repeated on every method.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Casts: ids are i32 by format, offsets u64 and lengths u16. Every cast is bounded by
// MAX_STRCOUNT, MAX_STRLEN or the mapped file length.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Style
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::similar_names)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::fn_params_excessive_bools)] // LIKE flags mirror the SQL operator variants
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::return_self_not_must_use)] // Builder setters
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::unnecessary_wraps)]

/// The strdict-core crate version (matches `Cargo.toml`).
pub const STRDICT_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

mod cache;
pub mod constants;
pub mod dictionary;
pub mod error;
pub mod hash_index;
pub mod io;
pub mod pattern;
pub mod remote;
pub mod types;

pub use constants::*;
pub use dictionary::{
    StringBytes, StringDictionary, populate_string_array_ids, populate_string_ids,
    translate_string_ids,
};
pub use error::{DictError, Result};
pub use hash_index::rk_hash;
pub use pattern::{DEFAULT_ESCAPE, compile_regexp, string_ilike, string_like};
pub use remote::{DictionaryClient, DictionaryConnector, LoopbackClient, LoopbackServer};
pub use types::{
    CompareOp, DictHost, DictRef, DictionaryOptions, DictionaryOptionsBuilder, EncodedId,
    StringId,
};
