use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DictError;

/// Dense surrogate id assigned to a distinct string. `NULL_STRING_ID` marks NULL.
pub type StringId = i32;

/// Output width for bulk encoding.
///
/// Each width reserves one value as its NULL marker; ids that do not fit below
/// `max_valid()` are stored as NULL.
pub trait EncodedId: Copy + Send + Sync + fmt::Debug + 'static {
    const BITS: u32;

    fn null() -> Self;

    /// Largest id representable without colliding with NULL.
    fn max_valid() -> usize;

    /// Narrow an id already known to be `<= max_valid()`.
    fn from_id(id: StringId) -> Self;
}

impl EncodedId for u8 {
    const BITS: u32 = 8;

    fn null() -> Self {
        u8::MAX
    }

    fn max_valid() -> usize {
        (u8::MAX - 1) as usize
    }

    fn from_id(id: StringId) -> Self {
        id as u8
    }
}

impl EncodedId for u16 {
    const BITS: u32 = 16;

    fn null() -> Self {
        u16::MAX
    }

    fn max_valid() -> usize {
        (u16::MAX - 1) as usize
    }

    fn from_id(id: StringId) -> Self {
        id as u16
    }
}

impl EncodedId for i32 {
    const BITS: u32 = 32;

    fn null() -> Self {
        i32::MIN
    }

    fn max_valid() -> usize {
        i32::MAX as usize
    }

    fn from_id(id: StringId) -> Self {
        id
    }
}

/// Identifies one dictionary on a dictionary server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DictRef {
    pub db_id: i32,
    pub dict_id: i32,
}

impl DictRef {
    #[must_use]
    pub fn new(db_id: i32, dict_id: i32) -> Self {
        Self { db_id, dict_id }
    }
}

impl fmt::Display for DictRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.db_id, self.dict_id)
    }
}

/// Address of a dictionary server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DictHost {
    pub host: String,
    pub port: u16,
}

impl DictHost {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DictHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Byte-wise comparison operators accepted by `get_compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl FromStr for CompareOp {
    type Err = DictError;

    fn from_str(op: &str) -> Result<Self, Self::Err> {
        match op {
            "=" => Ok(CompareOp::Eq),
            "<>" => Ok(CompareOp::Ne),
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::Le),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::Ge),
            other => Err(DictError::UnsupportedOperator {
                op: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
