use std::fmt;
use std::io::{Read, Write};
use std::iter::FusedIterator;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::matrix::MatrixCursor;
use super::{Axis, BitMatrix, Idx3};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::encoding::bincode;
use crate::error::{Error, Result};
use crate::sparse::SparsePagedMap;

type Planes = SparsePagedMap<Arc<BitMatrix>>;

/// A sparse three-dimensional boolean cube.
///
/// Planes are keyed by depth `z`; each plane is a [`BitMatrix`] over
/// `(x, y)` and exists only while it holds at least one cell.
///
/// The cube keeps a running element counter next to its planes. [`set`]
/// always increments it and [`clear`] always decrements it, whether or not
/// the cell changed, so [`size`] drifts from the real content when callers
/// set or clear redundantly. [`insert`] and [`remove`] adjust the counter
/// only on an actual change, and [`cardinality`] recounts the cells.
///
/// [`set`]: BitCube::set
/// [`clear`]: BitCube::clear
/// [`size`]: BitCube::size
/// [`insert`]: BitCube::insert
/// [`remove`]: BitCube::remove
/// [`cardinality`]: BitCube::cardinality
pub struct BitCube {
    page_size: u32,
    planes: Planes,
    /// The cube's lock, guarding the element counter and plane lifecycle.
    size: RwLock<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CubeSnapshot {
    page_size: u32,
    size: i64,
    cells: Vec<Idx3>,
}

impl BitCube {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates a cube whose planes, rows and bit sets all use `page_size`.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_size,
            planes: SparsePagedMap::with_page_size(page_size),
            size: RwLock::new(0),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Sets `(x, y, z)` and increments the element counter unconditionally.
    /// Returns `true` if the cell was not already set.
    pub fn set(&self, x: i32, y: i32, z: i32) -> Result<bool> {
        let mut size = self.size.write();
        let changed = self.set_cell(x, y, z)?;
        *size += 1;
        Ok(changed)
    }

    /// Clears `(x, y, z)` and decrements the element counter unconditionally.
    /// Returns `true` if the cell was set.
    pub fn clear(&self, x: i32, y: i32, z: i32) -> Result<bool> {
        let mut size = self.size.write();
        let changed = self.clear_cell(x, y, z)?;
        *size -= 1;
        Ok(changed)
    }

    /// Sets `(x, y, z)`, counting it only if it was not already set.
    pub fn insert(&self, x: i32, y: i32, z: i32) -> Result<bool> {
        let mut size = self.size.write();
        let changed = self.set_cell(x, y, z)?;
        if changed {
            *size += 1;
        }
        Ok(changed)
    }

    /// Clears `(x, y, z)`, uncounting it only if it was set.
    pub fn remove(&self, x: i32, y: i32, z: i32) -> Result<bool> {
        let mut size = self.size.write();
        let changed = self.clear_cell(x, y, z)?;
        if changed {
            *size -= 1;
        }
        Ok(changed)
    }

    pub fn has(&self, x: i32, y: i32, z: i32) -> Result<bool> {
        Axis::concrete(x, "x")?;
        Axis::concrete(y, "y")?;
        let z = Axis::concrete(z, "z")?;

        let _guard = self.size.read();
        match self.planes.get(z) {
            Some(plane) => plane.has(x, y),
            None => Ok(false),
        }
    }

    pub fn is_empty(&self) -> bool {
        let _guard = self.size.read();
        self.planes.is_empty()
    }

    /// The element counter. See the type docs for how it is maintained.
    pub fn size(&self) -> i64 {
        *self.size.read()
    }

    /// Number of set cells, counted by walking every plane.
    pub fn cardinality(&self) -> usize {
        let _guard = self.size.read();
        self.planes.values().map(|plane| plane.len()).sum()
    }

    /// Number of non-empty planes.
    pub fn plane_count(&self) -> usize {
        let _guard = self.size.read();
        self.planes.len()
    }

    /// Lazily yields the set cells matching `(x, y, z)`, where any coordinate
    /// may be [`WILD`](super::WILD).
    ///
    /// Cells come in ascending `z`, then `y`, then `x`. No lock is held
    /// between steps, so the sequence observes concurrent writes as described
    /// in the [`sparse`](crate::sparse) module docs.
    pub fn find(&self, x: i32, y: i32, z: i32) -> Result<CubeFind<'_>> {
        let x = Axis::pattern(x, "x")?;
        let y = Axis::pattern(y, "y")?;
        let z = Axis::pattern(z, "z")?;

        let next_plane = match z {
            Axis::At(z) => u64::from(z),
            Axis::Wild => 0,
        };
        Ok(CubeFind {
            planes: &self.planes,
            x,
            y,
            z,
            next_plane,
            plane: None,
            done: self.planes.is_empty(),
        })
    }

    /// Writes every cell and the element counter as a bincode snapshot.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let size = self.size.read();
        let snapshot = CubeSnapshot {
            page_size: self.page_size,
            size: *size,
            cells: self.find(super::WILD, super::WILD, super::WILD)?.collect(),
        };
        bincode::serialize_into(writer, &snapshot)?;
        tracing::debug!(
            cells = snapshot.cells.len(),
            size = snapshot.size,
            "wrote cube snapshot"
        );
        Ok(())
    }

    /// Rebuilds a cube from a snapshot written by [`BitCube::write_to`],
    /// restoring its element counter as stored.
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let snapshot: CubeSnapshot = bincode::deserialize_from(reader)?;
        if snapshot.page_size == 0 {
            return Err(Error::Snapshot("page size must be positive".to_string()));
        }

        let cube = Self::with_page_size(snapshot.page_size);
        for cell in &snapshot.cells {
            cube.set_cell(cell.x, cell.y, cell.z)?;
        }
        *cube.size.write() = snapshot.size;

        tracing::debug!(
            cells = snapshot.cells.len(),
            size = snapshot.size,
            "loaded cube snapshot"
        );
        Ok(cube)
    }

    /// Must be called with the cube's write lock held.
    fn set_cell(&self, x: i32, y: i32, z: i32) -> Result<bool> {
        Axis::concrete(x, "x")?;
        Axis::concrete(y, "y")?;
        let z = Axis::concrete(z, "z")?;

        match self.planes.get(z) {
            Some(plane) => plane.set(x, y),
            None => {
                let plane = Arc::new(BitMatrix::with_page_size(self.page_size));
                plane.set(x, y)?;
                self.planes.insert(z, plane);
                Ok(true)
            }
        }
    }

    /// Must be called with the cube's write lock held.
    fn clear_cell(&self, x: i32, y: i32, z: i32) -> Result<bool> {
        Axis::concrete(x, "x")?;
        Axis::concrete(y, "y")?;
        let z = Axis::concrete(z, "z")?;

        let Some(plane) = self.planes.get(z) else {
            return Ok(false);
        };
        let cleared = plane.clear(x, y)?;
        if plane.is_empty() {
            self.planes.remove(z);
        }
        Ok(cleared)
    }
}

impl Default for BitCube {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BitCube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitCube")
            .field("page_size", &self.page_size)
            .field("size", &*self.size.read())
            .field("planes", &self.planes)
            .finish()
    }
}

/// Lazy result of [`BitCube::find`].
pub struct CubeFind<'a> {
    planes: &'a Planes,
    x: Axis,
    y: Axis,
    z: Axis,
    next_plane: u64,
    /// Plane being searched, with its depth and the position inside it.
    plane: Option<(u32, Arc<BitMatrix>, MatrixCursor)>,
    done: bool,
}

impl CubeFind<'_> {
    fn next_plane(&mut self) -> Option<(u32, Arc<BitMatrix>)> {
        match self.z {
            Axis::At(z) => {
                if self.next_plane > u64::from(z) {
                    return None;
                }
                self.next_plane = u64::from(z) + 1;
                self.planes.get(z).map(|plane| (z, plane))
            }
            Axis::Wild => {
                let (z, plane) = self.planes.next_entry(self.next_plane)?;
                self.next_plane = u64::from(z) + 1;
                Some((z, plane))
            }
        }
    }
}

impl Iterator for CubeFind<'_> {
    type Item = Idx3;

    fn next(&mut self) -> Option<Idx3> {
        while !self.done {
            let step = match self.plane.as_mut() {
                Some((z, plane, cursor)) => plane
                    .advance(cursor)
                    .map(|idx| Idx3::on_plane(idx, *z as i32)),
                None => {
                    match self.next_plane() {
                        Some((z, plane)) => {
                            self.plane = Some((z, plane, MatrixCursor::new(self.x, self.y)));
                        }
                        None => self.done = true,
                    }
                    continue;
                }
            };

            match step {
                Some(idx) => return Some(idx),
                None => self.plane = None,
            }
        }
        None
    }
}

impl FusedIterator for CubeFind<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::WILD;
    use itertools::Itertools;
    use std::io::{Seek, SeekFrom};

    const MAX: i32 = i32::MAX;

    fn cells() -> Vec<(i32, i32, i32)> {
        vec![
            (1, 1, 1),
            (1, 1, 2),
            (1, 2, 3),
            (10, 10, 10),
            (10, 10, 20),
            (10, 20, 30),
            (100, 100, 100),
            (100, 100, 200),
            (100, 200, 300),
            (MAX, 1, 1),
            (MAX, 1, 2),
            (MAX, 2, 3),
            (MAX, 10, 10),
            (MAX, 10, 20),
            (MAX, 20, 30),
            (MAX, 100, 100),
            (MAX, 200, 200),
            (MAX, 200, 300),
            (MAX, MAX, MAX),
        ]
    }

    fn populated() -> BitCube {
        let cube = BitCube::new();
        for (x, y, z) in cells() {
            cube.set(x, y, z).unwrap();
        }
        cube
    }

    fn brute_force(cells: &[(i32, i32, i32)], x: i32, y: i32, z: i32) -> Vec<Idx3> {
        cells
            .iter()
            .filter(|&&(cx, cy, cz)| {
                (x == WILD || cx == x) && (y == WILD || cy == y) && (z == WILD || cz == z)
            })
            .map(|&(x, y, z)| Idx3::new(x, y, z))
            .sorted_by_key(|idx| (idx.z, idx.y, idx.x))
            .dedup()
            .collect()
    }

    #[test]
    fn test_set_has() {
        let cube = populated();
        for (x, y, z) in cells() {
            assert!(cube.has(x, y, z).unwrap(), "({}, {}, {}) should be set", x, y, z);
        }
        assert!(!cube.has(11, 11, 1).unwrap());
        assert!(!cube.has(1, 12, 12).unwrap());
        assert!(!cube.has(11, 2, 3).unwrap());
        assert!(!cube.has(110, 10, 10).unwrap());
        assert_eq!(cube.size(), 19);
        assert_eq!(cube.cardinality(), 19);
    }

    #[test]
    fn test_clear() {
        let cube = populated();
        let all = cells();

        for (i, &(x, y, z)) in all.iter().enumerate() {
            assert!(cube.clear(x, y, z).unwrap());
            for &(cx, cy, cz) in &all[..=i] {
                assert!(!cube.has(cx, cy, cz).unwrap());
            }
            for &(cx, cy, cz) in &all[i + 1..] {
                assert!(cube.has(cx, cy, cz).unwrap());
            }
        }

        assert!(cube.is_empty());
        assert_eq!(cube.plane_count(), 0);
        assert_eq!(cube.size(), 0);
    }

    #[test]
    fn test_negative_coordinates_rejected_on_every_axis() {
        let cube = BitCube::new();
        for (x, y, z) in [(-2, 0, 0), (0, -2, 0), (0, 0, -2), (WILD, 0, 0), (0, 0, WILD)] {
            assert!(matches!(cube.set(x, y, z), Err(Error::InvalidArgument(_))));
            assert!(matches!(cube.clear(x, y, z), Err(Error::InvalidArgument(_))));
            assert!(matches!(cube.has(x, y, z), Err(Error::InvalidArgument(_))));
        }
        assert!(matches!(cube.find(0, 0, -7), Err(Error::InvalidArgument(_))));
        assert!(cube.is_empty());
        assert_eq!(cube.size(), 0);
    }

    #[test]
    fn test_find_scenario() {
        let cube = BitCube::new();
        cube.set(1, 1, 1).unwrap();
        cube.set(1, 1, 2).unwrap();
        cube.set(1, 2, 3).unwrap();

        assert_eq!(
            cube.find(1, 1, WILD).unwrap().collect_vec(),
            vec![Idx3::new(1, 1, 1), Idx3::new(1, 1, 2)]
        );
        assert_eq!(
            cube.find(WILD, WILD, WILD).unwrap().collect_vec(),
            vec![Idx3::new(1, 1, 1), Idx3::new(1, 1, 2), Idx3::new(1, 2, 3)]
        );

        cube.clear(1, 1, 1).unwrap();
        assert_eq!(
            cube.find(1, 1, WILD).unwrap().collect_vec(),
            vec![Idx3::new(1, 1, 2)]
        );
    }

    #[test]
    fn test_find_every_pattern() {
        let cube = populated();
        let all = cells();

        let xs = [WILD, 1, 10, 100, MAX, 7];
        let ys = [WILD, 1, 10, 200, MAX, 7];
        let zs = [WILD, 1, 2, 30, 300, MAX, 7];

        for x in xs {
            for y in ys {
                for z in zs {
                    assert_eq!(
                        cube.find(x, y, z).unwrap().collect_vec(),
                        brute_force(&all, x, y, z),
                        "pattern ({}, {}, {})",
                        x,
                        y,
                        z
                    );
                }
            }
        }
    }

    #[test]
    fn test_find_on_empty_cube() {
        let cube = BitCube::new();
        assert_eq!(cube.find(WILD, WILD, WILD).unwrap().next(), None);
        assert_eq!(cube.find(1, 2, 3).unwrap().next(), None);
    }

    #[test]
    fn test_size_counts_every_call() {
        let cube = BitCube::new();
        assert!(cube.set(1, 1, 1).unwrap());
        assert!(!cube.set(1, 1, 1).unwrap());
        assert_eq!(cube.size(), 2);
        assert_eq!(cube.cardinality(), 1);

        assert!(!cube.clear(5, 5, 5).unwrap());
        assert_eq!(cube.size(), 1);

        assert!(cube.clear(1, 1, 1).unwrap());
        assert_eq!(cube.size(), 0);
        assert!(!cube.clear(1, 1, 1).unwrap());
        assert_eq!(cube.size(), -1);
        assert!(cube.is_empty());
    }

    #[test]
    fn test_insert_remove_keep_size_exact() {
        let cube = BitCube::new();
        assert!(cube.insert(1, 2, 3).unwrap());
        assert!(!cube.insert(1, 2, 3).unwrap());
        assert!(cube.insert(4, 5, 6).unwrap());
        assert_eq!(cube.size(), 2);

        assert!(!cube.remove(9, 9, 9).unwrap());
        assert!(cube.remove(1, 2, 3).unwrap());
        assert!(!cube.remove(1, 2, 3).unwrap());
        assert_eq!(cube.size(), 1);
        assert_eq!(cube.size(), cube.cardinality() as i64);
    }

    #[test]
    fn test_find_skips_plane_emptied_ahead() {
        let cube = BitCube::with_page_size(4);
        cube.set(0, 0, 0).unwrap();
        cube.set(0, 0, 5).unwrap();
        cube.set(0, 0, 9).unwrap();

        let mut found = cube.find(WILD, WILD, WILD).unwrap();
        assert_eq!(found.next(), Some(Idx3::new(0, 0, 0)));
        cube.clear(0, 0, 5).unwrap();
        assert_eq!(found.next(), Some(Idx3::new(0, 0, 9)));
        assert_eq!(found.next(), None);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let cube = populated();
        cube.set(1, 1, 1).unwrap(); // redundant set bumps the counter

        let mut file = tempfile::tempfile().unwrap();
        cube.write_to(&mut file).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let restored = BitCube::read_from(&mut file).unwrap();

        assert_eq!(restored.page_size(), cube.page_size());
        assert_eq!(restored.size(), 20);
        assert_eq!(restored.cardinality(), 19);
        assert_eq!(
            restored.find(WILD, WILD, WILD).unwrap().collect_vec(),
            cube.find(WILD, WILD, WILD).unwrap().collect_vec()
        );
    }

    #[test]
    fn test_snapshot_rejects_garbage() {
        let garbage = [0xffu8; 3];
        assert!(BitCube::read_from(&garbage[..]).is_err());
    }

    #[test]
    #[should_panic(expected = "page size must be greater than zero")]
    fn test_zero_page_size_panics() {
        BitCube::with_page_size(0);
    }

    #[test]
    fn test_cardinality_with_concurrent_writers() {
        let cube = std::sync::Arc::new(BitCube::with_page_size(8));
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let cube = std::sync::Arc::clone(&cube);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cube.insert(i, t, i % 7).unwrap();
                    }
                })
            })
            .collect();

        for _ in 0..20 {
            assert!(cube.cardinality() <= 200);
            assert!(cube.plane_count() <= 7);
        }
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(cube.cardinality(), 200);
        assert_eq!(cube.size(), 200);
        assert_eq!(cube.plane_count(), 7);
    }
}
