//! SQL `LIKE` and regexp matching over raw payload bytes.
//!
//! `%` matches any run of bytes and `_` exactly one byte. The escape byte makes the
//! following pattern byte literal. Case-insensitive matching folds ASCII only.
//! A "simple" pattern is a bare literal that matches by substring containment, which
//! is how `%literal%` patterns are evaluated once the planner strips the wildcards.

use memchr::memmem;
use regex::bytes::{Regex, RegexBuilder};

use crate::error::{DictError, Result};

/// Default escape byte for both `LIKE` and regexp patterns.
pub const DEFAULT_ESCAPE: u8 = b'\\';

/// A compiled predicate evaluated against every payload in a scan.
pub(crate) enum Matcher<'p> {
    Like {
        pattern: &'p [u8],
        case_insensitive: bool,
        simple: bool,
        escape: u8,
        folded: Option<Vec<u8>>,
    },
    Regexp(Regex),
}

impl<'p> Matcher<'p> {
    pub(crate) fn like(pattern: &'p str, case_insensitive: bool, simple: bool, escape: u8) -> Self {
        let folded = (case_insensitive && simple).then(|| pattern.as_bytes().to_ascii_lowercase());
        Matcher::Like {
            pattern: pattern.as_bytes(),
            case_insensitive,
            simple,
            escape,
            folded,
        }
    }

    pub(crate) fn regexp(pattern: &str, escape: u8) -> Result<Self> {
        compile_regexp(pattern, escape).map(Matcher::Regexp)
    }

    pub(crate) fn is_match(&self, value: &[u8]) -> bool {
        match self {
            Matcher::Like {
                pattern,
                case_insensitive,
                simple,
                escape,
                folded,
            } => match (*simple, folded) {
                (true, Some(folded)) => {
                    memmem::find(&value.to_ascii_lowercase(), folded).is_some()
                }
                (true, None) => memmem::find(value, pattern).is_some(),
                (false, _) if *case_insensitive => string_ilike(value, pattern, *escape),
                (false, _) => string_like(value, pattern, *escape),
            },
            Matcher::Regexp(regex) => regex.is_match(value),
        }
    }
}

/// Case-sensitive `LIKE`.
#[must_use]
pub fn string_like(value: &[u8], pattern: &[u8], escape: u8) -> bool {
    like_match(value, pattern, escape, |a, b| a == b)
}

/// ASCII case-insensitive `LIKE`.
#[must_use]
pub fn string_ilike(value: &[u8], pattern: &[u8], escape: u8) -> bool {
    like_match(value, pattern, escape, |a, b| a.eq_ignore_ascii_case(&b))
}

fn like_match(value: &[u8], pattern: &[u8], escape: u8, eq: impl Fn(u8, u8) -> bool) -> bool {
    let (mut vi, mut pi) = (0usize, 0usize);
    // Resume point after the most recent `%`: (pattern index, value index).
    let mut backtrack: Option<(usize, usize)> = None;

    while vi < value.len() {
        if pi < pattern.len() {
            let c = pattern[pi];
            if c == escape && pi + 1 < pattern.len() {
                if eq(pattern[pi + 1], value[vi]) {
                    pi += 2;
                    vi += 1;
                    continue;
                }
            } else if c == b'%' {
                pi += 1;
                backtrack = Some((pi, vi));
                continue;
            } else if c == b'_' || eq(c, value[vi]) {
                pi += 1;
                vi += 1;
                continue;
            }
        }
        match backtrack {
            Some((resume_p, resume_v)) => {
                pi = resume_p;
                vi = resume_v + 1;
                backtrack = Some((resume_p, resume_v + 1));
            }
            None => return false,
        }
    }
    pattern[pi..].iter().all(|&c| c == b'%')
}

/// Compile a regexp that must match the whole value.
///
/// With a non-default escape byte, that byte takes over the role of `\` and any
/// literal `\` in the pattern matches itself.
pub fn compile_regexp(pattern: &str, escape: u8) -> Result<Regex> {
    let source = if escape == DEFAULT_ESCAPE || !escape.is_ascii() {
        pattern.to_owned()
    } else {
        let escape = char::from(escape);
        let mut rewritten = String::with_capacity(pattern.len() + 4);
        for ch in pattern.chars() {
            match ch {
                '\\' => rewritten.push_str("\\\\"),
                ch if ch == escape => rewritten.push('\\'),
                ch => rewritten.push(ch),
            }
        }
        rewritten
    };
    RegexBuilder::new(&format!("^(?:{source})$"))
        .build()
        .map_err(|err| DictError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })
}
