use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    IoError(io::Error),
    Decode(&'static str, io::Error),
    Encode(&'static str, io::Error),
    /// A coordinate or index outside the accepted domain.
    InvalidArgument(String),
    InvalidState(String),
    /// A dictionary index that was never assigned.
    IndexNotFound(i32),
    InvalidRecord(String),
    Snapshot(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::Decode(field, err) => write!(f, "Failed to decode {}: {}", field, err),
            Error::Encode(field, err) => write!(f, "Failed to encode {}: {}", field, err),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::IndexNotFound(index) => write!(f, "Index {} not found", index),
            Error::InvalidRecord(msg) => write!(f, "Invalid record: {}", msg),
            Error::Snapshot(msg) => write!(f, "Snapshot error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) | Error::Decode(_, err) | Error::Encode(_, err) => Some(err),
            _ => None,
        }
    }
}
