//! Named hex layouts, as published in HexJSON.

use crate::geometry::{GridIndex, RowOffset};
use itertools::Itertools;
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};
use thiserror::Error;

/// Identifier of an administrative unit, e.g. a LAD code like `E06000001`.
pub type UnitId = String;

/// Geographic centroid of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, serde::Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// One named unit of a hex layout.
#[derive(Clone, Debug, PartialEq)]
pub struct HexUnit {
    pub id: UnitId,
    pub name: Option<String>,
    pub index: GridIndex,
    pub centroid: Option<LatLon>,
}

impl HexUnit {
    pub fn new(id: impl Into<UnitId>, q: i32, r: i32) -> Self {
        HexUnit {
            id: id.into(),
            name: None,
            index: GridIndex::new(q, r),
            centroid: None,
        }
    }
}

/// A set of named units placed on a hex grid.
///
/// Construction guarantees that no two units share a [`GridIndex`] or an id.
#[derive(Clone, Debug)]
pub struct NamedHexLayout {
    offset: RowOffset,
    units: Vec<HexUnit>,
    by_index: HashMap<GridIndex, usize>,
    by_id: HashMap<UnitId, usize>,
}

#[serde_as]
#[derive(Deserialize)]
struct HexJson {
    #[serde_as(as = "DisplayFromStr")]
    layout: RowOffset,
    hexes: BTreeMap<UnitId, HexJsonEntry>,
}

#[derive(Deserialize)]
struct HexJsonEntry {
    q: i32,
    r: i32,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

impl NamedHexLayout {
    /// Build a layout, validating that grid indices and ids are unique.
    pub fn new(offset: RowOffset, units: Vec<HexUnit>) -> Result<Self, Error> {
        let mut by_index = HashMap::with_capacity(units.len());
        let mut by_id = HashMap::with_capacity(units.len());

        for (idx, unit) in units.iter().enumerate() {
            if let Some(prior) = by_index.insert(unit.index, idx) {
                return Err(Error::DuplicateIndex {
                    index: unit.index,
                    first: units[prior].id.clone(),
                    second: unit.id.clone(),
                });
            }
            if by_id.insert(unit.id.clone(), idx).is_some() {
                return Err(Error::DuplicateId(unit.id.clone()));
            }
        }

        Ok(NamedHexLayout {
            offset,
            units,
            by_index,
            by_id,
        })
    }

    /// Parse a HexJSON document.
    ///
    /// Units are ordered by id. Keys other than `q`, `r`, `n`, `lat` and `lon` are ignored.
    pub fn from_hexjson(data: &str) -> Result<Self, Error> {
        let hexjson: HexJson = serde_json::from_str(data)?;
        let units = hexjson
            .hexes
            .into_iter()
            .map(|(id, entry)| HexUnit {
                id,
                name: entry.n,
                index: GridIndex::new(entry.q, entry.r),
                centroid: entry.lat.zip(entry.lon).map(|(lat, lon)| LatLon { lat, lon }),
            })
            .collect();
        Self::new(hexjson.layout, units)
    }

    /// Load a HexJSON file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path)?;
        let layout = Self::from_hexjson(&data)?;
        tracing::debug!(
            path = %path.display(),
            units = layout.len(),
            offset = %layout.offset,
            "loaded hex layout"
        );
        Ok(layout)
    }

    #[inline]
    pub fn offset(&self) -> RowOffset {
        self.offset
    }

    #[inline]
    pub fn units(&self) -> &[HexUnit] {
        &self.units
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The unit placed at this grid index, if any.
    pub fn at(&self, index: GridIndex) -> Option<&HexUnit> {
        self.by_index.get(&index).map(|&idx| &self.units[idx])
    }

    /// The unit with this id, if any.
    pub fn unit(&self, id: &str) -> Option<&HexUnit> {
        self.by_id.get(id).map(|&idx| &self.units[idx])
    }

    /// Distinct rows, ascending.
    pub fn rows(&self) -> Vec<i32> {
        self.units.iter().map(|unit| unit.index.r).sorted().dedup().collect()
    }

    /// Distinct columns, ascending.
    pub fn columns(&self) -> Vec<i32> {
        self.units.iter().map(|unit| unit.index.q).sorted().dedup().collect()
    }

    /// `(min, max)` row, or `None` for an empty layout.
    pub fn row_range(&self) -> Option<(i32, i32)> {
        self.units.iter().map(|unit| unit.index.r).minmax().into_option()
    }

    /// `(min, max)` column, or `None` for an empty layout.
    pub fn column_range(&self) -> Option<(i32, i32)> {
        self.units.iter().map(|unit| unit.index.q).minmax().into_option()
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("reading layout")]
    Io(#[from] std::io::Error),
    #[error("malformed HexJSON")]
    Malformed(#[from] serde_json::Error),
    #[error("units {first} and {second} share grid index {index}")]
    DuplicateIndex {
        index: GridIndex,
        first: UnitId,
        second: UnitId,
    },
    #[error("unit id {0} appears more than once")]
    DuplicateId(UnitId),
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r##"{
        "layout": "odd-r",
        "hexes": {
            "E06000002": {"q": 1, "r": 0, "n": "Middlesbrough"},
            "E06000001": {"q": 0, "r": 0, "n": "Hartlepool", "lat": 54.67, "lon": -1.27},
            "E06000003": {"q": 0, "r": 1, "colour": "#ff0000"}
        }
    }"##;

    #[test]
    fn test_parse_hexjson() {
        let layout = NamedHexLayout::from_hexjson(EXAMPLE).unwrap();
        assert_eq!(layout.offset(), RowOffset::OddR);
        assert_eq!(layout.len(), 3);
        let ids: Vec<_> = layout.units().iter().map(|unit| unit.id.as_str()).collect();
        assert_eq!(ids, ["E06000001", "E06000002", "E06000003"]);

        let hartlepool = layout.unit("E06000001").unwrap();
        assert_eq!(hartlepool.name.as_deref(), Some("Hartlepool"));
        assert_eq!(
            hartlepool.centroid,
            Some(LatLon {
                lat: 54.67,
                lon: -1.27
            })
        );
        assert_eq!(layout.at(GridIndex::new(0, 1)).unwrap().id, "E06000003");
        assert!(layout.at(GridIndex::new(1, 1)).is_none());
    }

    #[test]
    fn test_ranges() {
        let layout = NamedHexLayout::from_hexjson(EXAMPLE).unwrap();
        assert_eq!(layout.rows(), [0, 1]);
        assert_eq!(layout.columns(), [0, 1]);
        assert_eq!(layout.row_range(), Some((0, 1)));
        assert_eq!(layout.column_range(), Some((0, 1)));
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let units = vec![HexUnit::new("a", 2, 3), HexUnit::new("b", 2, 3)];
        match NamedHexLayout::new(RowOffset::OddR, units) {
            Err(Error::DuplicateIndex { index, first, second }) => {
                assert_eq!(index, GridIndex::new(2, 3));
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("expected duplicate index, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let units = vec![HexUnit::new("a", 0, 0), HexUnit::new("a", 1, 0)];
        assert!(matches!(
            NamedHexLayout::new(RowOffset::EvenR, units),
            Err(Error::DuplicateId(id)) if id == "a"
        ));
    }

    #[test]
    fn test_unknown_offset_is_malformed() {
        let data = r#"{"layout": "sideways", "hexes": {}}"#;
        assert!(matches!(
            NamedHexLayout::from_hexjson(data),
            Err(Error::Malformed(_))
        ));
    }
}
