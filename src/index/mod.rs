//! Sparse boolean matrices and cubes with per-axis wildcard search.

mod cube;
mod matrix;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use cube::{BitCube, CubeFind};
pub use matrix::{BitMatrix, MatrixFind};

/// Coordinate meaning "match any value" on an axis.
pub const WILD: i32 = -1;

/// One axis of a search pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Wild,
    At(u32),
}

impl Axis {
    /// Parses a pattern coordinate, where [`WILD`] is allowed.
    pub fn pattern(value: i32, axis: &'static str) -> Result<Self> {
        match value {
            WILD => Ok(Axis::Wild),
            v if v < 0 => Err(Error::InvalidArgument(format!(
                "{} ({}) must be greater than or equal to 0 or WILD",
                axis, v
            ))),
            v => Ok(Axis::At(v as u32)),
        }
    }

    /// Parses a coordinate that must name a single cell.
    pub fn concrete(value: i32, axis: &'static str) -> Result<u32> {
        match value {
            WILD => Err(Error::InvalidArgument(format!(
                "{} must be a concrete coordinate, not WILD",
                axis
            ))),
            v if v < 0 => Err(Error::InvalidArgument(format!(
                "{} ({}) must be greater than or equal to 0",
                axis, v
            ))),
            v => Ok(v as u32),
        }
    }
}

/// A `(x, y)` cell returned by [`BitMatrix::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Idx2 {
    pub x: i32,
    pub y: i32,
}

impl Idx2 {
    pub fn new(x: i32, y: i32) -> Self {
        Idx2 { x, y }
    }
}

impl fmt::Display for Idx2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A `(x, y, z)` cell returned by [`BitCube::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Idx3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Idx3 {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Idx3 { x, y, z }
    }

    /// Lifts a matrix cell into the plane at depth `z`.
    pub fn on_plane(idx: Idx2, z: i32) -> Self {
        Idx3::new(idx.x, idx.y, z)
    }
}

impl fmt::Display for Idx3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_pattern() {
        assert_eq!(Axis::pattern(WILD, "x").unwrap(), Axis::Wild);
        assert_eq!(Axis::pattern(0, "x").unwrap(), Axis::At(0));
        assert_eq!(Axis::pattern(i32::MAX, "x").unwrap(), Axis::At(i32::MAX as u32));
        assert!(matches!(
            Axis::pattern(-2, "x"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_axis_concrete() {
        assert_eq!(Axis::concrete(5, "y").unwrap(), 5);
        assert!(matches!(
            Axis::concrete(WILD, "y"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Axis::concrete(i32::MIN, "y"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_idx_ordering() {
        let mut cells = vec![Idx3::new(2, 0, 0), Idx3::new(1, 5, 9), Idx3::new(1, 5, 2)];
        cells.sort();
        assert_eq!(
            cells,
            vec![Idx3::new(1, 5, 2), Idx3::new(1, 5, 9), Idx3::new(2, 0, 0)]
        );
        assert!(Idx2::new(0, 9) < Idx2::new(1, 0));
        assert_eq!(Idx3::on_plane(Idx2::new(3, 4), 5).to_string(), "(3, 4, 5)");
    }
}
