//! Node values and their binary dictionary records.

pub mod bincode;
pub mod format;
pub mod node;
pub mod record;

pub use node::{Literal, Node, NodeType};
pub use record::NodeRecord;

/// Error type for encoding operations
#[derive(Debug)]
pub enum EncodingError {
    InvalidFormat(String),
    UnknownType(u8),
    TruncatedData,
    InvalidUtf8,
}

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingError::InvalidFormat(msg) => write!(f, "Invalid encoding format: {}", msg),
            EncodingError::UnknownType(tag) => write!(f, "Unknown node type tag 0x{:02x}", tag),
            EncodingError::TruncatedData => write!(f, "Truncated data"),
            EncodingError::InvalidUtf8 => write!(f, "Invalid UTF-8 sequence"),
        }
    }
}

impl std::error::Error for EncodingError {}

impl From<EncodingError> for crate::Error {
    fn from(err: EncodingError) -> Self {
        crate::Error::InvalidRecord(err.to_string())
    }
}
