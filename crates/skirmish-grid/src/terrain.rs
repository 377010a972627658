//! Terrain: static cover zones.
//!
//! A [`Terrain`] is read-only for the lifetime of a batch. On construction it
//! flattens its zones into a [`CoverMap`] so cover lookups during resolution
//! are a single `BTreeMap` probe per path cell.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cover::CoverClass;
use crate::error::{GridError, Result};
use crate::Cell;

/// The cells a zone covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneArea {
    /// An explicit list of cells.
    Cells(Vec<Cell>),
    /// An inclusive rectangle; corner order does not matter.
    Rect {
        /// One corner.
        from: Cell,
        /// The opposite corner.
        to: Cell,
    },
}

impl ZoneArea {
    /// Iterates the cells of this area.
    pub fn cells(&self) -> Box<dyn Iterator<Item = Cell> + '_> {
        match self {
            Self::Cells(cells) => Box::new(cells.iter().copied()),
            Self::Rect { from, to } => {
                let (x_lo, x_hi) = (from.x().min(to.x()), from.x().max(to.x()));
                let (y_lo, y_hi) = (from.y().min(to.y()), from.y().max(to.y()));
                Box::new((y_lo..=y_hi).flat_map(move |y| (x_lo..=x_hi).map(move |x| Cell::new(x, y))))
            }
        }
    }
}

/// A zone granting half or three-quarters cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverZone {
    /// Cover class granted by every cell of the zone.
    pub cover: CoverClass,
    /// Cells belonging to the zone.
    pub area: ZoneArea,
}

impl CoverZone {
    /// A zone from labels. Unparseable labels are skipped.
    ///
    /// Loaders that need to report bad labels should parse with
    /// [`Cell::parse`] and build [`ZoneArea::Cells`] themselves.
    pub fn cells<'a>(cover: CoverClass, labels: impl IntoIterator<Item = &'a str>) -> Self {
        let cells = labels.into_iter().filter_map(|l| Cell::parse(l).ok()).collect();
        Self {
            cover,
            area: ZoneArea::Cells(cells),
        }
    }

    /// A rectangular zone.
    #[must_use]
    pub fn rect(cover: CoverClass, from: Cell, to: Cell) -> Self {
        Self {
            cover,
            area: ZoneArea::Rect { from, to },
        }
    }
}

/// Flattened cell-to-cover lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverMap(BTreeMap<Cell, CoverClass>);

impl CoverMap {
    /// Builds the map; the strongest class wins where zones overlap.
    #[must_use]
    pub fn from_zones(zones: &[CoverZone]) -> Self {
        let mut map = BTreeMap::new();
        for zone in zones {
            for cell in zone.area.cells() {
                map.entry(cell)
                    .and_modify(|c: &mut CoverClass| *c = (*c).max(zone.cover))
                    .or_insert(zone.cover);
            }
        }
        Self(map)
    }

    /// Cover class of a single cell.
    #[must_use]
    pub fn get(&self, cell: Cell) -> Option<CoverClass> {
        self.0.get(&cell).copied()
    }

    /// Number of cells granting cover.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no cell grants cover.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Named terrain with cover zones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TerrainRepr", into = "TerrainRepr")]
pub struct Terrain {
    name: String,
    description: String,
    zones: Vec<CoverZone>,
    cover_map: CoverMap,
}

/// Serialized form of [`Terrain`]; the cover map is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct TerrainRepr {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    zones: Vec<CoverZone>,
}

impl From<TerrainRepr> for Terrain {
    fn from(repr: TerrainRepr) -> Self {
        Self::new(repr.name, repr.zones).with_description(repr.description)
    }
}

impl From<Terrain> for TerrainRepr {
    fn from(t: Terrain) -> Self {
        Self {
            name: t.name,
            description: t.description,
            zones: t.zones,
        }
    }
}

impl Terrain {
    /// Creates terrain from zones.
    pub fn new(name: impl Into<String>, zones: Vec<CoverZone>) -> Self {
        let cover_map = CoverMap::from_zones(&zones);
        Self {
            name: name.into(),
            description: String::new(),
            zones,
            cover_map,
        }
    }

    /// Creates terrain, rejecting zones that cover no cells.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::EmptyZone`] if any zone is an empty cell list.
    pub fn try_new(name: impl Into<String>, zones: Vec<CoverZone>) -> Result<Self> {
        if zones.iter().any(|z| z.area.cells().next().is_none()) {
            return Err(GridError::EmptyZone);
        }
        Ok(Self::new(name, zones))
    }

    /// Open field: no cover anywhere.
    #[must_use]
    pub fn open() -> Self {
        Self::new("open field", Vec::new())
    }

    /// Sets a free-form description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Terrain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The zones as given.
    #[must_use]
    pub fn zones(&self) -> &[CoverZone] {
        &self.zones
    }

    /// Flattened cover lookup.
    #[must_use]
    pub fn cover_map(&self) -> &CoverMap {
        &self.cover_map
    }
}

impl Default for Terrain {
    fn default() -> Self {
        Self::open()
    }
}
