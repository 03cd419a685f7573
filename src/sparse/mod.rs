//! Sparse, paged, integer-indexed containers.
//!
//! The `u32` index space is cut into pages of `page_size` slots. A page is
//! materialized on the first write into its range and dropped as soon as it
//! holds nothing, so memory follows the populated regions only.
//!
//! Pages live in a vector sorted by offset and are located by binary search.
//! Each container guards its pages with a single read/write lock.
//!
//! # Iteration
//!
//! Iterators are lazy and positional: they remember the next global index to
//! look at and take the read lock only for the duration of one step. They are
//! therefore weakly consistent with concurrent writers:
//!
//! - elements inserted ahead of the cursor are observed,
//! - elements inserted behind the cursor are not,
//! - elements removed ahead of the cursor are skipped.
//!
//! Iteration never ends early because a page was unlinked underneath it.

mod bitset;
mod map;

pub use bitset::{Bits, SparseBitSet};
pub use map::{Entries, Indices, SparsePagedMap, Values};

/// A page covering `[offset * page_size, (offset + 1) * page_size)`.
pub(crate) trait Paged {
    fn offset(&self) -> u32;
}

/// Splits a global index into its page offset and in-page slot.
pub(crate) fn split(index: u32, page_size: u32) -> (u32, usize) {
    (index / page_size, (index % page_size) as usize)
}

/// Finds the page for `offset`, or the position at which it would be linked.
pub(crate) fn locate<P: Paged>(pages: &[P], offset: u32) -> Result<usize, usize> {
    pages.binary_search_by_key(&offset, |page| page.offset())
}

/// Position of the first page that may hold an index `>= cursor`.
pub(crate) fn first_page_from<P: Paged>(pages: &[P], cursor: u64, page_size: u32) -> usize {
    let offset = cursor / u64::from(page_size);
    pages.partition_point(|page| u64::from(page.offset()) < offset)
}

/// First global index covered by the page at `offset`.
pub(crate) fn page_base(offset: u32, page_size: u32) -> u64 {
    u64::from(offset) * u64::from(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(u32);

    impl Paged for Stub {
        fn offset(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn test_split() {
        assert_eq!(split(0, 4096), (0, 0));
        assert_eq!(split(4095, 4096), (0, 4095));
        assert_eq!(split(4096, 4096), (1, 0));
        assert_eq!(split(u32::MAX, 4096), (u32::MAX / 4096, 4095));
    }

    #[test]
    fn test_locate() {
        let pages = vec![Stub(1), Stub(4), Stub(9)];
        assert_eq!(locate(&pages, 4), Ok(1));
        assert_eq!(locate(&pages, 0), Err(0));
        assert_eq!(locate(&pages, 5), Err(2));
        assert_eq!(locate(&pages, 10), Err(3));
    }

    #[test]
    fn test_first_page_from() {
        let pages = vec![Stub(1), Stub(4), Stub(9)];
        assert_eq!(first_page_from(&pages, 0, 10), 0);
        assert_eq!(first_page_from(&pages, 19, 10), 0);
        assert_eq!(first_page_from(&pages, 20, 10), 1);
        assert_eq!(first_page_from(&pages, 49, 10), 1);
        assert_eq!(first_page_from(&pages, 50, 10), 2);
        assert_eq!(first_page_from(&pages, 100, 10), 3);
        assert_eq!(first_page_from(&pages, u64::from(u32::MAX) + 1, 10), 3);
    }
}
