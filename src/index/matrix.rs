use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Axis, Idx2};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::Result;
use crate::sparse::{SparseBitSet, SparsePagedMap};

type Rows = SparsePagedMap<Arc<SparseBitSet>>;

/// A sparse two-dimensional boolean matrix.
///
/// Rows are keyed by `y` and hold the set `x` bits. A row exists only while
/// it has at least one bit set.
pub struct BitMatrix {
    page_size: u32,
    rows: Rows,
    /// Serializes row creation and removal against readers of this matrix.
    lock: RwLock<()>,
}

impl BitMatrix {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates a matrix whose rows and bit sets use `page_size`.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_size,
            rows: SparsePagedMap::with_page_size(page_size),
            lock: RwLock::new(()),
        }
    }

    /// Sets `(x, y)`. Returns `true` if the cell was not already set.
    pub fn set(&self, x: i32, y: i32) -> Result<bool> {
        let x = Axis::concrete(x, "x")?;
        let y = Axis::concrete(y, "y")?;

        let _guard = self.lock.write();
        match self.rows.get(y) {
            Some(row) => Ok(row.set(x)),
            None => {
                let row = Arc::new(SparseBitSet::with_page_size(self.page_size));
                row.set(x);
                self.rows.insert(y, row);
                Ok(true)
            }
        }
    }

    /// Clears `(x, y)`, dropping the row if it becomes empty. Returns `true`
    /// if the cell was set.
    pub fn clear(&self, x: i32, y: i32) -> Result<bool> {
        let x = Axis::concrete(x, "x")?;
        let y = Axis::concrete(y, "y")?;

        let _guard = self.lock.write();
        let Some(row) = self.rows.get(y) else {
            return Ok(false);
        };
        let cleared = row.clear(x);
        if row.is_empty() {
            self.rows.remove(y);
        }
        Ok(cleared)
    }

    pub fn has(&self, x: i32, y: i32) -> Result<bool> {
        let x = Axis::concrete(x, "x")?;
        let y = Axis::concrete(y, "y")?;

        let _guard = self.lock.read();
        Ok(self.rows.get(y).is_some_and(|row| row.get(x)))
    }

    pub fn is_empty(&self) -> bool {
        let _guard = self.lock.read();
        self.rows.is_empty()
    }

    /// Number of set cells.
    pub fn len(&self) -> usize {
        let _guard = self.lock.read();
        self.rows.values().map(|row| row.len()).sum()
    }

    /// Number of non-empty rows.
    pub fn row_count(&self) -> usize {
        let _guard = self.lock.read();
        self.rows.len()
    }

    /// Lazily yields the set cells matching `(x, y)`, where either coordinate
    /// may be [`WILD`](super::WILD).
    ///
    /// Cells come in ascending `y`, then ascending `x`. The sequence reads the
    /// live matrix one step at a time; see the module docs of
    /// [`sparse`](crate::sparse) for what concurrent writers can cause.
    pub fn find(&self, x: i32, y: i32) -> Result<MatrixFind<'_>> {
        let cursor = MatrixCursor::new(Axis::pattern(x, "x")?, Axis::pattern(y, "y")?);
        let cursor = if self.is_empty() {
            cursor.exhausted()
        } else {
            cursor
        };
        Ok(MatrixFind {
            matrix: self,
            cursor,
        })
    }

    /// Moves `cursor` to the next matching cell under this matrix's read lock.
    pub(crate) fn advance(&self, cursor: &mut MatrixCursor) -> Option<Idx2> {
        let _guard = self.lock.read();
        cursor.next(&self.rows)
    }
}

impl Default for BitMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BitMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitMatrix")
            .field("page_size", &self.page_size)
            .field("rows", &self.rows)
            .finish()
    }
}

/// Position of a search within a matrix.
///
/// Holds no borrow of the matrix so that it can be carried alongside an owned
/// handle to the matrix, as the cube does for each plane.
#[derive(Debug, Clone)]
pub(crate) struct MatrixCursor {
    x: Axis,
    y: Axis,
    /// Next row index to look for.
    next_row: u64,
    /// Row being scanned, with its `y`.
    row: Option<(u32, Arc<SparseBitSet>)>,
    /// Next bit to look for within `row`.
    next_bit: u64,
    done: bool,
}

impl MatrixCursor {
    pub(crate) fn new(x: Axis, y: Axis) -> Self {
        let next_row = match y {
            Axis::At(y) => u64::from(y),
            Axis::Wild => 0,
        };
        MatrixCursor {
            x,
            y,
            next_row,
            row: None,
            next_bit: 0,
            done: false,
        }
    }

    fn exhausted(mut self) -> Self {
        self.done = true;
        self
    }

    fn next_row(&mut self, rows: &Rows) -> Option<(u32, Arc<SparseBitSet>)> {
        match self.y {
            Axis::At(y) => {
                if self.next_row > u64::from(y) {
                    return None;
                }
                self.next_row = u64::from(y) + 1;
                rows.get(y).map(|row| (y, row))
            }
            Axis::Wild => {
                let (y, row) = rows.next_entry(self.next_row)?;
                self.next_row = u64::from(y) + 1;
                Some((y, row))
            }
        }
    }

    fn next(&mut self, rows: &Rows) -> Option<Idx2> {
        while !self.done {
            let (y, row) = match &self.row {
                Some((y, row)) => (*y, Arc::clone(row)),
                None => {
                    match self.next_row(rows) {
                        Some(next) => {
                            self.row = Some(next);
                            self.next_bit = 0;
                        }
                        None => self.done = true,
                    }
                    continue;
                }
            };

            match self.x {
                Axis::At(x) => {
                    self.row = None;
                    if row.get(x) {
                        return Some(Idx2::new(x as i32, y as i32));
                    }
                }
                Axis::Wild => match row.next_set_bit(self.next_bit) {
                    Some(x) => {
                        self.next_bit = u64::from(x) + 1;
                        return Some(Idx2::new(x as i32, y as i32));
                    }
                    None => self.row = None,
                },
            }
        }
        None
    }
}

/// Lazy result of [`BitMatrix::find`].
pub struct MatrixFind<'a> {
    matrix: &'a BitMatrix,
    cursor: MatrixCursor,
}

impl Iterator for MatrixFind<'_> {
    type Item = Idx2;

    fn next(&mut self) -> Option<Idx2> {
        self.matrix.advance(&mut self.cursor)
    }
}

impl FusedIterator for MatrixFind<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::index::WILD;
    use itertools::Itertools;

    const MAX: i32 = i32::MAX;

    fn cells() -> Vec<(i32, i32)> {
        vec![
            (1, 1),
            (1, 2),
            (10, 10),
            (10, 20),
            (100, 100),
            (100, 200),
            (MAX, 1),
            (MAX, 100),
            (MAX, MAX),
        ]
    }

    fn populated() -> BitMatrix {
        let matrix = BitMatrix::new();
        for (x, y) in cells() {
            matrix.set(x, y).unwrap();
        }
        matrix
    }

    #[test]
    fn test_set_has() {
        let matrix = populated();
        for (x, y) in cells() {
            assert!(matrix.has(x, y).unwrap(), "({}, {}) should be set", x, y);
        }
        assert!(!matrix.has(2, 1).unwrap());
        assert!(!matrix.has(1, 3).unwrap());
        assert!(!matrix.has(11, 10).unwrap());
        assert_eq!(matrix.len(), 9);
    }

    #[test]
    fn test_clear_drops_rows() {
        let matrix = populated();
        assert_eq!(matrix.row_count(), 7);

        assert!(matrix.clear(1, 1).unwrap());
        assert!(!matrix.has(1, 1).unwrap());
        assert!(matrix.has(MAX, 1).unwrap());
        assert_eq!(matrix.row_count(), 7);

        assert!(matrix.clear(MAX, 1).unwrap());
        assert_eq!(matrix.row_count(), 6);

        assert!(!matrix.clear(MAX, 1).unwrap());
        assert!(!matrix.clear(5, 5000).unwrap());

        for (x, y) in cells() {
            matrix.clear(x, y).unwrap();
        }
        assert!(matrix.is_empty());
        assert_eq!(matrix.find(WILD, WILD).unwrap().next(), None);
    }

    #[test]
    fn test_negative_coordinates_rejected() {
        let matrix = BitMatrix::new();
        assert!(matches!(matrix.set(-5, 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(matrix.set(0, WILD), Err(Error::InvalidArgument(_))));
        assert!(matches!(matrix.has(0, -2), Err(Error::InvalidArgument(_))));
        assert!(matches!(matrix.clear(-3, 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(matrix.find(-2, WILD), Err(Error::InvalidArgument(_))));
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_find_concrete() {
        let matrix = populated();
        assert_eq!(
            matrix.find(10, 20).unwrap().collect_vec(),
            vec![Idx2::new(10, 20)]
        );
        assert_eq!(matrix.find(10, 21).unwrap().next(), None);
        assert_eq!(matrix.find(11, 20).unwrap().next(), None);
    }

    #[test]
    fn test_find_wild_x() {
        let matrix = populated();
        assert_eq!(
            matrix.find(WILD, 1).unwrap().collect_vec(),
            vec![Idx2::new(1, 1), Idx2::new(MAX, 1)]
        );
        assert_eq!(
            matrix.find(WILD, 100).unwrap().collect_vec(),
            vec![Idx2::new(100, 100), Idx2::new(MAX, 100)]
        );
        assert_eq!(matrix.find(WILD, 3).unwrap().next(), None);
    }

    #[test]
    fn test_find_wild_y() {
        let matrix = populated();
        assert_eq!(
            matrix.find(MAX, WILD).unwrap().collect_vec(),
            vec![Idx2::new(MAX, 1), Idx2::new(MAX, 100), Idx2::new(MAX, MAX)]
        );
        assert_eq!(
            matrix.find(10, WILD).unwrap().collect_vec(),
            vec![Idx2::new(10, 10), Idx2::new(10, 20)]
        );
    }

    #[test]
    fn test_find_all_ordering() {
        let matrix = populated();
        let found = matrix.find(WILD, WILD).unwrap().collect_vec();

        let mut expected = cells()
            .into_iter()
            .map(|(x, y)| Idx2::new(x, y))
            .collect_vec();
        expected.sort_by_key(|idx| (idx.y, idx.x));
        assert_eq!(found, expected);
    }

    #[test]
    fn test_find_matches_brute_force() {
        let matrix = BitMatrix::with_page_size(8);
        let mut inserted = Vec::new();
        for i in 0..60 {
            let (x, y) = ((i * 7) % 23, (i * 5) % 17);
            matrix.set(x, y).unwrap();
            inserted.push(Idx2::new(x, y));
        }
        inserted.sort_by_key(|idx| (idx.y, idx.x));
        inserted.dedup();

        for x in [WILD, 0, 7, 14, 22] {
            for y in [WILD, 0, 5, 10, 16] {
                let expected = inserted
                    .iter()
                    .copied()
                    .filter(|idx| (x == WILD || idx.x == x) && (y == WILD || idx.y == y))
                    .collect_vec();
                assert_eq!(matrix.find(x, y).unwrap().collect_vec(), expected);
            }
        }
    }

    #[test]
    fn test_find_observes_later_rows() {
        let matrix = BitMatrix::with_page_size(4);
        matrix.set(0, 0).unwrap();
        matrix.set(0, 9).unwrap();

        let mut found = matrix.find(WILD, WILD).unwrap();
        assert_eq!(found.next(), Some(Idx2::new(0, 0)));
        matrix.set(3, 5).unwrap();
        assert_eq!(found.next(), Some(Idx2::new(3, 5)));
        assert_eq!(found.next(), Some(Idx2::new(0, 9)));
        assert_eq!(found.next(), None);
    }

    #[test]
    #[should_panic(expected = "page size must be greater than zero")]
    fn test_zero_page_size_panics() {
        BitMatrix::with_page_size(0);
    }
}
