//! Formats raw record keys and values for debugging output.

use byteorder::{BigEndian, ByteOrder};
use itertools::Itertools as _;

use super::node::NodeType;

/// Formats encoded keys and values.
pub trait Formatter {
    /// Formats a key.
    fn key(key: &[u8]) -> String;

    /// Formats a value. Also takes the key to determine the kind of value.
    fn value(key: &[u8], value: &[u8]) -> String;

    /// Formats a key/value pair.
    fn key_value(key: &[u8], value: &[u8]) -> String {
        Self::key_maybe_value(key, Some(value))
    }

    /// Formats a key/value pair, where the value may not exist.
    fn key_maybe_value(key: &[u8], value: Option<&[u8]>) -> String {
        let fmtkey = Self::key(key);
        let fmtvalue = value.map_or("None".to_string(), |v| Self::value(key, v));
        format!("{fmtkey} → {fmtvalue}")
    }
}

/// Formats raw byte slices without any decoding.
pub struct Raw;

impl Raw {
    /// Formats raw bytes as escaped ASCII strings.
    pub fn bytes(bytes: &[u8]) -> String {
        let escaped = bytes
            .iter()
            .copied()
            .flat_map(std::ascii::escape_default)
            .collect_vec();
        format!("\"{}\"", String::from_utf8_lossy(&escaped))
    }
}

impl Formatter for Raw {
    fn key(key: &[u8]) -> String {
        Self::bytes(key)
    }

    fn value(_key: &[u8], value: &[u8]) -> String {
        Self::bytes(value)
    }
}

/// Formats dictionary records. The key is the index and content hash, the
/// value is the type tag followed by the payload.
pub struct Record;

impl Formatter for Record {
    fn key(key: &[u8]) -> String {
        if key.len() != 8 {
            return Raw::bytes(key);
        }
        let index = BigEndian::read_i32(&key[0..4]);
        let hash = BigEndian::read_i32(&key[4..8]);
        format!("#{} {:08x}", index, hash as u32)
    }

    fn value(_key: &[u8], value: &[u8]) -> String {
        let Some((&tag, payload)) = value.split_first() else {
            return "<empty>".to_string();
        };
        let kind = match NodeType::try_from(tag) {
            Ok(NodeType::Any) => "any",
            Ok(NodeType::Blank) => "blank",
            Ok(NodeType::Literal) => "literal",
            Ok(NodeType::Uri) => "uri",
            Ok(NodeType::Variable) => "variable",
            Ok(NodeType::CompressedLiteral) => {
                return format!("literal gz[{} bytes]", payload.len());
            }
            Err(_) => return format!("0x{:02x} {}", tag, Raw::bytes(payload)),
        };
        format!("{} {}", kind, Raw::bytes(payload))
    }
}
