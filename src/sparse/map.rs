use std::fmt;
use std::iter::FusedIterator;

use parking_lot::RwLock;

use super::{first_page_from, locate, page_base, split, Paged};
use crate::config::DEFAULT_PAGE_SIZE;

struct Page<V> {
    offset: u32,
    slots: Box<[Option<V>]>,
    /// Number of occupied slots.
    occupied: usize,
}

impl<V> Page<V> {
    fn new(offset: u32, page_size: u32) -> Self {
        Page {
            offset,
            slots: std::iter::repeat_with(|| None)
                .take(page_size as usize)
                .collect(),
            occupied: 0,
        }
    }

    fn store(&mut self, slot: usize, value: Option<V>) -> Option<V> {
        let now_occupied = value.is_some();
        let previous = std::mem::replace(&mut self.slots[slot], value);
        match (previous.is_some(), now_occupied) {
            (false, true) => self.occupied += 1,
            (true, false) => self.occupied -= 1,
            _ => {}
        }
        previous
    }

    fn is_empty(&self) -> bool {
        self.occupied == 0
    }
}

impl<V> Paged for Page<V> {
    fn offset(&self) -> u32 {
        self.offset
    }
}

/// A sparse, ordered map from `u32` indices to values, stored in fixed-size
/// pages.
///
/// All operations take `&self`; the map owns a read/write lock that is held
/// for the duration of a single call. Values are handed out as clones, so
/// shared payloads are usually stored behind an [`Arc`](std::sync::Arc).
pub struct SparsePagedMap<V> {
    page_size: u32,
    pages: RwLock<Vec<Page<V>>>,
}

impl<V: Clone> SparsePagedMap<V> {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates a map whose pages hold `page_size` slots.
    ///
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

    /// Stores `value` at `index`, or removes the entry when `value` is `None`.
    /// Returns the previous value.
    ///
    /// The covering page is created on demand and dropped once the write
    /// leaves it empty.
    pub fn put(&self, index: u32, value: Option<V>) -> Option<V> {
        let (offset, slot) = split(index, self.page_size);
        let mut pages = self.pages.write();

        let pos = match locate(&pages, offset) {
            Ok(pos) => pos,
            Err(_) if value.is_none() => return None,
            Err(pos) => {
                tracing::trace!(offset, "creating page");
                pages.insert(pos, Page::new(offset, self.page_size));
                pos
            }
        };

        let previous = pages[pos].store(slot, value);
        if pages[pos].is_empty() {
            tracing::trace!(offset, "dropping empty page");
            pages.remove(pos);
        }
        previous
    }

    pub fn insert(&self, index: u32, value: V) -> Option<V> {
        self.put(index, Some(value))
    }

    /// Removes the value at `index`. Does nothing if no value is stored there.
    pub fn remove(&self, index: u32) -> Option<V> {
        self.put(index, None)
    }

    pub fn get(&self, index: u32) -> Option<V> {
        let (offset, slot) = split(index, self.page_size);
        let pages = self.pages.read();
        match locate(&pages, offset) {
            Ok(pos) => pages[pos].slots[slot].clone(),
            Err(_) => None,
        }
    }

    pub fn has(&self, index: u32) -> bool {
        let (offset, slot) = split(index, self.page_size);
        let pages = self.pages.read();
        match locate(&pages, offset) {
            Ok(pos) => pages[pos].slots[slot].is_some(),
            Err(_) => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.pages.read().iter().map(|page| page.occupied).sum()
    }

    /// Number of materialized pages.
    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }

    /// First entry whose index is `>= from`.
    pub fn next_entry(&self, from: u64) -> Option<(u32, V)> {
        self.scan(from, |index, value| (index, value.clone()))
    }

    /// First occupied index `>= from`.
    pub fn next_index(&self, from: u64) -> Option<u32> {
        self.scan(from, |index, _| index)
    }

    /// Lazy ascending `(index, value)` pairs.
    pub fn entries(&self) -> Entries<'_, V> {
        Entries {
            map: self,
            cursor: Some(0),
        }
    }

    /// Lazy ascending values.
    pub fn values(&self) -> Values<'_, V> {
        Values {
            inner: self.entries(),
        }
    }

    /// Lazy ascending indices.
    pub fn indices(&self) -> Indices<'_, V> {
        Indices {
            map: self,
            cursor: Some(0),
        }
    }

    fn scan<T>(&self, from: u64, f: impl FnOnce(u32, &V) -> T) -> Option<T> {
        let pages = self.pages.read();
        let start = first_page_from(&pages, from, self.page_size);

        for page in &pages[start..] {
            let base = page_base(page.offset, self.page_size);
            let first = from.saturating_sub(base) as usize;
            let found = page
                .slots
                .iter()
                .enumerate()
                .skip(first)
                .find_map(|(slot, value)| value.as_ref().map(|value| (slot, value)));

            if let Some((slot, value)) = found {
                return Some(f((base + slot as u64) as u32, value));
            }
        }
        None
    }
}

impl<V: Clone> Default for SparsePagedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for SparsePagedMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparsePagedMap")
            .field("page_size", &self.page_size)
            .field("pages", &self.pages.read().len())
            .finish()
    }
}

/// Ascending `(index, value)` pairs of a [`SparsePagedMap`].
pub struct Entries<'a, V> {
    map: &'a SparsePagedMap<V>,
    /// Next index to inspect; `None` once exhausted.
    cursor: Option<u64>,
}

impl<V: Clone> Iterator for Entries<'_, V> {
    type Item = (u32, V);

    fn next(&mut self) -> Option<Self::Item> {
        match self.map.next_entry(self.cursor?) {
            Some((index, value)) => {
                self.cursor = Some(u64::from(index) + 1);
                Some((index, value))
            }
            None => {
                self.cursor = None;
                None
            }
        }
    }
}

impl<V: Clone> FusedIterator for Entries<'_, V> {}

/// Ascending values of a [`SparsePagedMap`].
pub struct Values<'a, V> {
    inner: Entries<'a, V>,
}

impl<V: Clone> Iterator for Values<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        self.inner.next().map(|(_, value)| value)
    }
}

impl<V: Clone> FusedIterator for Values<'_, V> {}

/// Ascending occupied indices of a [`SparsePagedMap`].
pub struct Indices<'a, V> {
    map: &'a SparsePagedMap<V>,
    cursor: Option<u64>,
}

impl<V: Clone> Iterator for Indices<'_, V> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        match self.map.next_index(self.cursor?) {
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

impl<V: Clone> FusedIterator for Indices<'_, V> {}
