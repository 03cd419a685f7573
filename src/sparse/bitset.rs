use std::fmt;
use std::iter::FusedIterator;

use parking_lot::RwLock;

use super::{first_page_from, locate, page_base, split, Paged};
use crate::config::DEFAULT_PAGE_SIZE;

const WORD_BITS: usize = u64::BITS as usize;

struct BitPage {
    offset: u32,
    words: Box<[u64]>,
    /// Number of set bits in `words`.
    ones: u32,
}

impl BitPage {
    fn new(offset: u32, page_size: u32) -> Self {
        let words = (page_size as usize).div_ceil(WORD_BITS);
        BitPage {
            offset,
            words: vec![0; words].into_boxed_slice(),
            ones: 0,
        }
    }

    fn get(&self, slot: usize) -> bool {
        self.words[slot / WORD_BITS] & (1 << (slot % WORD_BITS)) != 0
    }

    /// Sets or clears one bit, returning whether it changed.
    fn assign(&mut self, slot: usize, value: bool) -> bool {
        if self.get(slot) == value {
            return false;
        }
        let mask = 1u64 << (slot % WORD_BITS);
        if value {
            self.words[slot / WORD_BITS] |= mask;
            self.ones += 1;
        } else {
            self.words[slot / WORD_BITS] &= !mask;
            self.ones -= 1;
        }
        true
    }

    /// First set slot `>= from`.
    fn next_set(&self, from: usize) -> Option<usize> {
        let mut word_idx = from / WORD_BITS;
        if word_idx >= self.words.len() {
            return None;
        }
        let mut word = self.words[word_idx] & (u64::MAX << (from % WORD_BITS));
        loop {
            if word != 0 {
                return Some(word_idx * WORD_BITS + word.trailing_zeros() as usize);
            }
            word_idx += 1;
            if word_idx == self.words.len() {
                return None;
            }
            word = self.words[word_idx];
        }
    }
}

impl Paged for BitPage {
    fn offset(&self) -> u32 {
        self.offset
    }
}

/// A sparse set of `u32` indices stored as paged bit vectors.
///
/// Shares the paging scheme of [`SparsePagedMap`](super::SparsePagedMap): a
/// page is a fixed-width bit vector of `page_size` bits, created on the first
/// `set` in its range and dropped when its last bit is cleared.
pub struct SparseBitSet {
    page_size: u32,
    pages: RwLock<Vec<BitPage>>,
}

impl SparseBitSet {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn with_page_size(page_size: u32) -> Self {
        assert!(page_size > 0, "page size must be greater than zero");
        Self {
            page_size,
            pages: RwLock::new(Vec::new()),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Sets the bit at `index`. Returns `true` if it was not already set.
    pub fn set(&self, index: u32) -> bool {
        self.assign(index, true)
    }

    /// Clears the bit at `index`. Returns `true` if it was set.
    pub fn clear(&self, index: u32) -> bool {
        self.assign(index, false)
    }

    pub fn get(&self, index: u32) -> bool {
        let (offset, slot) = split(index, self.page_size);
        let pages = self.pages.read();
        match locate(&pages, offset) {
            Ok(pos) => pages[pos].get(slot),
            Err(_) => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }

    /// Number of set bits.
    pub fn len(&self) -> usize {
        self.pages
            .read()
            .iter()
            .map(|page| page.ones as usize)
            .sum()
    }

    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }

    /// First set index `>= from`.
    pub fn next_set_bit(&self, from: u64) -> Option<u32> {
        let pages = self.pages.read();
        let start = first_page_from(&pages, from, self.page_size);

        pages[start..].iter().find_map(|page| {
            let base = page_base(page.offset, self.page_size);
            page.next_set(from.saturating_sub(base) as usize)
                .map(|slot| (base + slot as u64) as u32)
        })
    }

    /// Lazy ascending sequence of set indices.
    pub fn iter(&self) -> Bits<'_> {
        Bits {
            set: self,
            cursor: Some(0),
        }
    }

    fn assign(&self, index: u32, value: bool) -> bool {
        let (offset, slot) = split(index, self.page_size);
        let mut pages = self.pages.write();

        let pos = match locate(&pages, offset) {
            Ok(pos) => pos,
            Err(_) if !value => return false,
            Err(pos) => {
                tracing::trace!(offset, "creating bit page");
                pages.insert(pos, BitPage::new(offset, self.page_size));
                pos
            }
        };

        let changed = pages[pos].assign(slot, value);
        if pages[pos].ones == 0 {
            tracing::trace!(offset, "dropping empty bit page");
            pages.remove(pos);
        }
        changed
    }
}

impl Default for SparseBitSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SparseBitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseBitSet")
            .field("page_size", &self.page_size)
            .field("pages", &self.pages.read().len())
            .finish()
    }
}

impl<'a> IntoIterator for &'a SparseBitSet {
    type Item = u32;
    type IntoIter = Bits<'a>;

    fn into_iter(self) -> Bits<'a> {
        self.iter()
    }
}

/// Ascending set indices of a [`SparseBitSet`].
pub struct Bits<'a> {
    set: &'a SparseBitSet,
    cursor: Option<u64>,
}

impl Iterator for Bits<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        match self.set.next_set_bit(self.cursor?) {
            Some(index) => {
                self.cursor = Some(u64::from(index) + 1);
                Some(index)
            }
            None => {
                self.cursor = None;
                None
            }
        }
    }
}

impl FusedIterator for Bits<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let bits = SparseBitSet::new();
        for index in [0, 1, 10, 1000, 1_000_000, u32::MAX] {
            assert!(bits.set(index));
        }

        for index in [0, 1, 10, 1000, 1_000_000, u32::MAX] {
            assert!(bits.get(index), "bit {} should be set", index);
        }
        assert!(!bits.get(5));
        assert!(!bits.get(u32::MAX - 1));
        assert_eq!(bits.len(), 6);
    }

    #[test]
    fn test_set_twice_reports_unchanged() {
        let bits = SparseBitSet::with_page_size(8);
        assert!(bits.set(3));
        assert!(!bits.set(3));
        assert!(bits.clear(3));
        assert!(!bits.clear(3));
        assert!(bits.is_empty());
    }

    #[test]
    fn test_iter_ascending() {
        let bits = SparseBitSet::with_page_size(100);
        for index in [u32::MAX, 64, 1_000_000, 63, 0, 65, 99, 100] {
            bits.set(index);
        }

        let collected: Vec<u32> = bits.iter().collect();
        assert_eq!(collected, vec![0, 63, 64, 65, 99, 100, 1_000_000, u32::MAX]);
    }

    #[test]
    fn test_clear_drops_pages() {
        let bits = SparseBitSet::with_page_size(64);
        for index in 0..1000 {
            bits.set(index * 3);
        }
        assert_eq!(bits.page_count(), 47);

        for index in 0..1000 {
            assert!(bits.clear(index * 3));
        }
        assert!(bits.is_empty());
        assert_eq!(bits.page_count(), 0);
        assert_eq!(bits.iter().next(), None);
    }

    #[test]
    fn test_clear_unset_creates_nothing() {
        let bits = SparseBitSet::with_page_size(16);
        assert!(!bits.clear(40));
        assert_eq!(bits.page_count(), 0);
    }

    #[test]
    fn test_odd_page_size() {
        let bits = SparseBitSet::with_page_size(70);
        bits.set(69);
        bits.set(70);
        bits.set(139);
        assert_eq!(bits.page_count(), 2);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![69, 70, 139]);
        assert_eq!(bits.next_set_bit(71), Some(139));
        assert_eq!(bits.next_set_bit(140), None);
    }

    #[test]
    fn test_next_set_bit_past_end() {
        let bits = SparseBitSet::new();
        bits.set(u32::MAX);
        assert_eq!(bits.next_set_bit(u64::from(u32::MAX)), Some(u32::MAX));
        assert_eq!(bits.next_set_bit(u64::from(u32::MAX) + 1), None);
    }
}
