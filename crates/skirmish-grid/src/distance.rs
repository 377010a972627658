//! Grid distance and straight-line stepping.
//!
//! All distances are Manhattan (taxicab) in grid squares. Walks move along the
//! x axis first, then the y axis, which keeps paths deterministic.

use serde::{Deserialize, Serialize};

use crate::Cell;

/// Feet covered by one grid square.
pub const FEET_PER_SQUARE: u32 = 5;

/// Manhattan distance between two cells in grid squares.
#[must_use]
pub fn grid_distance(a: Cell, b: Cell) -> u32 {
    (a.as_ivec2() - b.as_ivec2()).abs().element_sum().unsigned_abs()
}

/// Distance between two cells in feet.
#[must_use]
pub fn feet(a: Cell, b: Cell) -> u32 {
    grid_distance(a, b) * FEET_PER_SQUARE
}

/// One step from `from` toward `to`, x axis first.
fn step(from: Cell, to: Cell) -> Cell {
    let (x, y) = (from.x(), from.y());
    if x != to.x() {
        Cell::new(x + (to.x() - x).signum(), y)
    } else {
        Cell::new(x, y + (to.y() - y).signum())
    }
}

/// Moves up to `squares` steps from `from` toward `to`.
///
/// Stops early on arrival.
#[must_use]
pub fn step_toward(from: Cell, to: Cell, squares: u32) -> Cell {
    let mut current = from;
    for _ in 0..squares {
        if current == to {
            break;
        }
        current = step(current, to);
    }
    current
}

/// Moves up to `squares` steps directly away from `threat`.
///
/// Coordinates are clamped at zero so the result stays labelable on the
/// near edges of the map.
#[must_use]
pub fn step_away(from: Cell, threat: Cell, squares: u32) -> Cell {
    let mut current = from;
    for _ in 0..squares {
        let dx = (current.x() - threat.x()).signum();
        let dy = (current.y() - threat.y()).signum();
        let next = if dx != 0 || dy == 0 {
            // Standing on the threat pushes along +x.
            let dx = if dx == 0 { 1 } else { dx };
            Cell::new((current.x() + dx).max(0), current.y())
        } else {
            Cell::new(current.x(), (current.y() + dy).max(0))
        };
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Cells strictly between `a` and `b` on the x-first Manhattan walk.
///
/// Endpoints are excluded; identical or adjacent cells give an empty path.
#[must_use]
pub fn path_between(a: Cell, b: Cell) -> Vec<Cell> {
    let mut out = Vec::new();
    let mut current = a;
    while current != b {
        current = step(current, b);
        if current != b {
            out.push(current);
        }
    }
    out
}

/// How a radius is measured for area effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Grid (taxicab) distance, the table-top simplification.
    #[default]
    Manhattan,
    /// Straight-line distance in grid units.
    Euclidean,
}

/// Returns true if `cell` lies within `radius` squares of `center`.
#[must_use]
pub fn within_radius(center: Cell, cell: Cell, radius: u32, metric: DistanceMetric) -> bool {
    match metric {
        DistanceMetric::Manhattan => grid_distance(center, cell) <= radius,
        DistanceMetric::Euclidean => {
            let d = (center.as_ivec2() - cell.as_ivec2()).as_i64vec2();
            let r = i64::from(radius);
            d.length_squared() <= r * r
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn c(label: &str) -> Cell {
        label.parse().unwrap()
    }

    mod distance_tests {
        use super::*;

        #[test]
        fn same_cell_is_zero() {
            assert_eq!(grid_distance(c("B2"), c("B2")), 0);
        }

        #[test]
        fn manhattan_sums_axes() {
            assert_eq!(grid_distance(c("A1"), c("C4")), 5);
            assert_eq!(feet(c("A1"), c("C4")), 25);
        }

        #[test]
        fn diagonal_neighbour_is_two_squares() {
            assert_eq!(grid_distance(c("A1"), c("B2")), 2);
        }

        proptest! {
            #[test]
            fn symmetric(ax in 0..26, ay in 0..99, bx in 0..26, by in 0..99) {
                let (a, b) = (Cell::new(ax, ay), Cell::new(bx, by));
                prop_assert_eq!(grid_distance(a, b), grid_distance(b, a));
            }

            #[test]
            fn triangle_inequality(
                ax in 0..26, ay in 0..99, bx in 0..26, by in 0..99, cx in 0..26, cy in 0..99
            ) {
                let (a, b, m) = (Cell::new(ax, ay), Cell::new(bx, by), Cell::new(cx, cy));
                prop_assert!(grid_distance(a, b) <= grid_distance(a, m) + grid_distance(m, b));
            }
        }
    }

    mod step_tests {
        use super::*;

        #[test]
        fn step_toward_moves_x_first() {
            assert_eq!(step_toward(c("A1"), c("C3"), 2), c("C1"));
            assert_eq!(step_toward(c("A1"), c("C3"), 3), c("C2"));
        }

        #[test]
        fn step_toward_stops_on_arrival() {
            assert_eq!(step_toward(c("A1"), c("B1"), 6), c("B1"));
        }

        #[test]
        fn step_away_increases_distance() {
            let from = c("C3");
            let threat = c("B3");
            let to = step_away(from, threat, 2);
            assert_eq!(to, c("E3"));
            assert!(grid_distance(to, threat) > grid_distance(from, threat));
        }

        #[test]
        fn step_away_clamps_at_edge() {
            assert_eq!(step_away(c("A1"), c("B1"), 3), c("A1"));
        }
    }

    mod path_tests {
        use super::*;

        #[test]
        fn path_excludes_endpoints() {
            assert_eq!(path_between(c("A1"), c("D1")), vec![c("B1"), c("C1")]);
        }

        #[test]
        fn path_turns_after_x() {
            assert_eq!(path_between(c("A1"), c("B3")), vec![c("B1"), c("B2")]);
        }

        #[test]
        fn adjacent_and_same_cells_have_empty_path() {
            assert!(path_between(c("A1"), c("A2")).is_empty());
            assert!(path_between(c("A1"), c("A1")).is_empty());
        }
    }

    mod radius_tests {
        use super::*;

        #[test]
        fn manhattan_radius_is_a_diamond() {
            let center = c("E5");
            assert!(within_radius(center, c("E7"), 2, DistanceMetric::Manhattan));
            assert!(!within_radius(center, c("F7"), 2, DistanceMetric::Manhattan));
        }

        #[test]
        fn euclidean_radius_is_rounder() {
            let center = c("E5");
            // (1, 2) is sqrt(5) away: outside 2 for both metrics.
            assert!(!within_radius(center, c("F7"), 2, DistanceMetric::Euclidean));
            // (2, 2) is sqrt(8) < 3 but 4 squares by grid distance.
            assert!(within_radius(center, c("G7"), 3, DistanceMetric::Euclidean));
            assert!(!within_radius(center, c("G7"), 3, DistanceMetric::Manhattan));
        }

        #[test]
        fn boundary_is_inclusive() {
            assert!(within_radius(c("A1"), c("A4"), 3, DistanceMetric::Manhattan));
            assert!(within_radius(c("A1"), c("A4"), 3, DistanceMetric::Euclidean));
        }
    }
}
