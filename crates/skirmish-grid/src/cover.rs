//! Cover between an attacker and a target.

use serde::{Deserialize, Serialize};

use crate::distance::path_between;
use crate::terrain::CoverMap;
use crate::Cell;

/// Cover class a terrain zone provides.
///
/// Ordered so that the stronger class compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoverClass {
    /// +2 to defense and Dex saves.
    Half,
    /// +5 to defense and Dex saves.
    ThreeQuarters,
}

/// Cover a target has against one attacker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cover {
    /// Nothing in the way.
    #[default]
    None,
    /// Half cover.
    Half,
    /// Three-quarters cover.
    ThreeQuarters,
}

impl Cover {
    /// Numeric bonus added to the target's defense and relevant saves.
    #[must_use]
    pub const fn bonus(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Half => 2,
            Self::ThreeQuarters => 5,
        }
    }
}

impl From<CoverClass> for Cover {
    fn from(class: CoverClass) -> Self {
        match class {
            CoverClass::Half => Self::Half,
            CoverClass::ThreeQuarters => Self::ThreeQuarters,
        }
    }
}

/// Cover the target at `target` has from an attacker at `attacker`.
///
/// Walks the Manhattan path between the two cells (endpoints excluded). Any
/// three-quarters cell on the path wins outright; otherwise any half cell
/// gives half cover.
#[must_use]
pub fn cover_between(attacker: Cell, target: Cell, map: &CoverMap) -> Cover {
    if attacker == target || map.is_empty() {
        return Cover::None;
    }

    let mut best = Cover::None;
    for cell in path_between(attacker, target) {
        match map.get(cell) {
            Some(CoverClass::ThreeQuarters) => return Cover::ThreeQuarters,
            Some(CoverClass::Half) => best = Cover::Half,
            None => {}
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{CoverZone, Terrain};

    fn c(label: &str) -> Cell {
        label.parse().unwrap()
    }

    #[test]
    fn bonus_values() {
        assert_eq!(Cover::None.bonus(), 0);
        assert_eq!(Cover::Half.bonus(), 2);
        assert_eq!(Cover::ThreeQuarters.bonus(), 5);
    }

    #[test]
    fn open_field_has_no_cover() {
        let terrain = Terrain::new("open", vec![]);
        assert_eq!(cover_between(c("A1"), c("F1"), terrain.cover_map()), Cover::None);
    }

    #[test]
    fn half_zone_on_path_gives_half() {
        let terrain = Terrain::new("wall", vec![CoverZone::cells(CoverClass::Half, ["C1"])]);
        assert_eq!(cover_between(c("A1"), c("F1"), terrain.cover_map()), Cover::Half);
    }

    #[test]
    fn three_quarters_beats_half_regardless_of_order() {
        let terrain = Terrain::new(
            "ruins",
            vec![
                CoverZone::cells(CoverClass::ThreeQuarters, ["B1"]),
                CoverZone::cells(CoverClass::Half, ["D1"]),
            ],
        );
        assert_eq!(
            cover_between(c("A1"), c("F1"), terrain.cover_map()),
            Cover::ThreeQuarters
        );
        assert_eq!(
            cover_between(c("F1"), c("A1"), terrain.cover_map()),
            Cover::ThreeQuarters
        );
    }

    #[test]
    fn endpoints_do_not_count() {
        let terrain = Terrain::new(
            "foxholes",
            vec![CoverZone::cells(CoverClass::ThreeQuarters, ["A1", "F1"])],
        );
        assert_eq!(cover_between(c("A1"), c("F1"), terrain.cover_map()), Cover::None);
    }

    #[test]
    fn zone_off_path_is_ignored() {
        let terrain = Terrain::new("hedge", vec![CoverZone::rect(CoverClass::Half, c("A3"), c("F4"))]);
        assert_eq!(cover_between(c("A1"), c("F1"), terrain.cover_map()), Cover::None);
    }

    #[test]
    fn same_cell_has_no_cover() {
        let terrain = Terrain::new("pit", vec![CoverZone::cells(CoverClass::Half, ["B2"])]);
        assert_eq!(cover_between(c("B2"), c("B2"), terrain.cover_map()), Cover::None);
    }
}
