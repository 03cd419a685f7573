use std::fmt;

use crc::{Crc, Digest, CRC_32_ISCSI};

/// Checksum used for the content hash stored in every node record.
pub static CONTENT_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Incremental content hasher over the type tag and payload of a record.
pub struct Hasher {
    digest: Digest<'static, u32>,
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hasher")
    }
}

impl Hasher {
    pub fn new() -> Self {
        Self {
            digest: CONTENT_CRC.digest(),
        }
    }

    pub fn write(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    /// Consumes the hasher, returning the hash as the signed 32-bit value
    /// written into records.
    pub fn finish(self) -> i32 {
        self.digest.finalize() as i32
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hashes a record's type tag followed by its payload.
pub fn content_hash(tag: u8, payload: &[u8]) -> i32 {
    let mut hasher = Hasher::new();
    hasher.write(&[tag]);
    hasher.write(payload);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_hash() {
        let mut hasher1 = Hasher::new();
        hasher1.write(b"http://");
        hasher1.write(b"example/a");

        let mut hasher2 = Hasher::new();
        hasher2.write(b"http://example/a");

        assert_eq!(
            hasher1.finish(),
            hasher2.finish(),
            "Incremental and single-write hashes should match"
        );
    }

    #[test]
    fn test_tag_changes_hash() {
        assert_ne!(
            content_hash(0x03, b"foo"),
            content_hash(0x04, b"foo"),
            "Same payload under different tags should hash differently"
        );
    }

    #[test]
    fn test_stable_hash() {
        assert_eq!(content_hash(0x03, b"abc"), content_hash(0x03, b"abc"));
        assert_eq!(CONTENT_CRC.checksum(b"123456789"), 0xe306_9283);
    }
}
