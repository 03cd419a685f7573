use std::io::{Read, Write};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Serialize a value into a writer using bincode
pub fn serialize_into<T: Serialize, W: Write>(writer: W, value: &T) -> Result<()> {
    ::bincode::serialize_into(writer, value)
        .map_err(|e| Error::Snapshot(format!("serialization failed: {}", e)))
}

/// Deserialize a value from a reader using bincode
pub fn deserialize_from<T: DeserializeOwned, R: Read>(reader: R) -> Result<T> {
    ::bincode::deserialize_from(reader).map_err(|e| match *e {
        ::bincode::ErrorKind::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            Error::Snapshot("truncated snapshot".to_string())
        }
        _ => Error::Snapshot(format!("deserialization failed: {}", e)),
    })
}
