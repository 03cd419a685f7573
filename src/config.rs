/// Default number of slots (or bits) per page.
pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Literal payloads longer than this many bytes are stored compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 128;

/// Default number of decoded nodes kept by the dictionary.
pub const DEFAULT_DECODE_CACHE_SIZE: usize = 1024;

/// Configuration for a triple store and its dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Page size shared by every sparse container of the cube (default: 4096)
    pub page_size: u32,

    /// Packed literal size above which payloads are gzip compressed (default: 128 bytes)
    pub compression_threshold: usize,

    /// Capacity of the decoded node cache, 0 disables it (default: 1024)
    pub decode_cache_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            decode_cache_size: DEFAULT_DECODE_CACHE_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size. Values below 1 are raised to 1.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Set the literal compression threshold
    pub fn compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = bytes;
        self
    }

    /// Set the decoded node cache capacity
    pub fn decode_cache_size(mut self, entries: usize) -> Self {
        self.decode_cache_size = entries;
        self
    }
}
