//! # Skirmish Grid
//!
//! Spatial substrate for tactical encounters: a square grid addressed with
//! chess-style labels, integer distances, and static terrain cover.
//!
//! - **Cells**: `"A1"` is column 0, row 0; `"C4"` is column 2, row 3
//! - **Distance**: Manhattan distance in grid squares, 5 ft per square
//! - **Cover**: half / three-quarters zones between attacker and target
//!
//! ## Quick Start
//!
//! ```
//! use skirmish_grid::{cover_between, grid_distance, Cell, Cover, CoverClass, CoverZone, Terrain};
//!
//! let archer: Cell = "A1".parse().unwrap();
//! let goblin: Cell = "D1".parse().unwrap();
//! assert_eq!(grid_distance(archer, goblin), 3);
//!
//! let terrain = Terrain::new("crates", vec![CoverZone::cells(CoverClass::Half, ["B1"])]);
//! assert_eq!(cover_between(archer, goblin, terrain.cover_map()), Cover::Half);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cover;
pub mod distance;
pub mod error;
pub mod terrain;

use std::fmt;
use std::str::FromStr;

use glam::IVec2;
use serde::{Deserialize, Serialize};

pub use cover::{cover_between, Cover, CoverClass};
pub use distance::{
    feet, grid_distance, path_between, step_away, step_toward, within_radius, DistanceMetric,
    FEET_PER_SQUARE,
};
pub use error::{GridError, Result};
pub use terrain::{CoverMap, CoverZone, Terrain, ZoneArea};

/// Highest rank accepted in a cell label.
pub const MAX_RANK: i32 = 99;

/// Number of columns addressable by a single file letter.
pub const MAX_FILES: i32 = 26;

/// A square on the battle grid.
///
/// Stored as a zero-indexed `(column, row)` pair. Cells order by row first,
/// then column, so sets of cells iterate in reading order.
///
/// Serialized as its label (`"C4"`), which is what external loaders write.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cell(IVec2);

impl Cell {
    /// Creates a cell from zero-indexed column and row.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self(IVec2::new(x, y))
    }

    /// Column, zero-indexed (`A` = 0).
    #[must_use]
    pub const fn x(self) -> i32 {
        self.0.x
    }

    /// Row, zero-indexed (rank 1 = 0).
    #[must_use]
    pub const fn y(self) -> i32 {
        self.0.y
    }

    /// Underlying vector.
    #[must_use]
    pub const fn as_ivec2(self) -> IVec2 {
        self.0
    }

    /// Parses a chess-style label such as `"A1"` or `"z20"`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if the label is empty, the file is not a letter
    /// A-Z, or the rank is not an integer in `1..=99`.
    pub fn parse(label: &str) -> Result<Self> {
        let label = label.trim();
        let mut chars = label.chars();
        let file = chars
            .next()
            .ok_or_else(|| GridError::MalformedLabel(label.to_string()))?;
        let rank_str = chars.as_str();
        if rank_str.is_empty() {
            return Err(GridError::MalformedLabel(label.to_string()));
        }

        let file = file.to_ascii_uppercase();
        if !file.is_ascii_uppercase() {
            return Err(GridError::InvalidFile(file));
        }

        let rank: i32 = rank_str
            .parse()
            .map_err(|_| GridError::InvalidRank(rank_str.to_string()))?;
        if !(1..=MAX_RANK).contains(&rank) {
            return Err(GridError::InvalidRank(rank_str.to_string()));
        }

        Ok(Self::new(i32::from(file as u8 - b'A'), rank - 1))
    }

    /// Returns true if the cell can be written as a label.
    #[must_use]
    pub fn is_labelable(self) -> bool {
        (0..MAX_FILES).contains(&self.x()) && (0..MAX_RANK).contains(&self.y())
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y(), self.x()).cmp(&(other.y(), other.x()))
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell({self})")
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_labelable() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let file = char::from(b'A' + self.x() as u8);
            write!(f, "{file}{}", self.y() + 1)
        } else {
            write!(f, "({}, {})", self.x(), self.y())
        }
    }
}

impl FromStr for Cell {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Cell {
    type Error = GridError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Cell> for String {
    fn from(cell: Cell) -> Self {
        cell.to_string()
    }
}

impl From<IVec2> for Cell {
    fn from(v: IVec2) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_origin() {
        assert_eq!(Cell::parse("A1").unwrap(), Cell::new(0, 0));
    }

    #[test]
    fn parse_is_case_insensitive_and_trims() {
        assert_eq!(Cell::parse(" c4 ").unwrap(), Cell::new(2, 3));
    }

    #[test]
    fn parse_two_digit_rank() {
        assert_eq!(Cell::parse("Z20").unwrap(), Cell::new(25, 19));
    }

    #[test]
    fn parse_rejects_bad_labels() {
        assert!(matches!(Cell::parse(""), Err(GridError::MalformedLabel(_))));
        assert!(matches!(Cell::parse("A"), Err(GridError::MalformedLabel(_))));
        assert!(matches!(Cell::parse("11"), Err(GridError::InvalidFile('1'))));
        assert!(matches!(Cell::parse("A0"), Err(GridError::InvalidRank(_))));
        assert!(matches!(Cell::parse("A100"), Err(GridError::InvalidRank(_))));
        assert!(matches!(Cell::parse("Ax"), Err(GridError::InvalidRank(_))));
    }

    #[test]
    fn display_renders_label() {
        assert_eq!(Cell::new(2, 3).to_string(), "C4");
        assert_eq!(Cell::new(-1, 3).to_string(), "(-1, 3)");
    }

    #[test]
    fn ordering_is_row_major() {
        let mut cells = vec![Cell::new(1, 1), Cell::new(0, 1), Cell::new(5, 0)];
        cells.sort();
        assert_eq!(cells, vec![Cell::new(5, 0), Cell::new(0, 1), Cell::new(1, 1)]);
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&Cell::new(3, 4)).unwrap();
        assert_eq!(json, "\"D5\"");
        let back: Cell = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Cell::new(3, 4));
        assert!(serde_json::from_str::<Cell>("\"?9\"").is_err());
    }

    proptest! {
        #[test]
        fn label_round_trip(x in 0..MAX_FILES, y in 0..MAX_RANK) {
            let cell = Cell::new(x, y);
            prop_assert_eq!(Cell::parse(&cell.to_string()).unwrap(), cell);
        }
    }
}
