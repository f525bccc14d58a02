//! Hexagonal tessellations of a planar extent.

use crate::{
    geometry::{BoundingBox, Centroid},
    input::{self, Header},
};
use std::{collections::HashSet, path::Path};
use thiserror::Error;

/// Synthetic identifier of a tessellation cell.
pub type CellId = u32;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// One hexagonal cell.
#[derive(Clone, Debug, PartialEq)]
pub struct HexCell {
    pub id: CellId,
    pub centroid: Centroid,
    /// Vertices, counterclockwise, not closed. Empty when the cell was loaded
    /// without geometry.
    pub polygon: Vec<Centroid>,
}

/// A single line of a tessellation file: `id,east,north`.
#[derive(Clone, Copy, Debug, PartialEq, parse_display::Display, parse_display::FromStr)]
#[display("{id},{east},{north}")]
pub struct CellRecord {
    pub id: CellId,
    pub east: f64,
    pub north: f64,
}

impl From<&HexCell> for CellRecord {
    fn from(cell: &HexCell) -> Self {
        CellRecord {
            id: cell.id,
            east: cell.centroid.east,
            north: cell.centroid.north,
        }
    }
}

/// Vertices of a pointy-topped hexagon whose flat-to-flat width is `cell_size`.
pub fn hexagon(center: Centroid, cell_size: f64) -> Vec<Centroid> {
    let radius = cell_size / SQRT_3;
    (0..6)
        .map(|corner| {
            let angle = (30.0 + 60.0 * corner as f64).to_radians();
            Centroid::new(
                center.east + radius * angle.cos(),
                center.north + radius * angle.sin(),
            )
        })
        .collect()
}

/// Distance between the centroids of adjacent rows of pointy-topped hexagons.
#[inline]
pub fn row_spacing(cell_size: f64) -> f64 {
    cell_size * SQRT_3 / 2.0
}

/// Most cells a generated grid may hold.
pub const MAX_CELLS: usize = 1 << 22;

/// Dense ranks of a sequence of values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ranking {
    /// Rank of each input value, in input order. Equal values share a rank.
    pub ranks: Vec<usize>,
    /// Number of distinct values, i.e. one more than the highest rank.
    pub distinct: usize,
}

/// Dense-rank `values` ascending.
///
/// Values within `tolerance` of the lowest value of their group are treated as equal.
/// Ordering among equal values follows input order.
pub fn dense_rank(values: &[f64], tolerance: f64) -> Ranking {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0; values.len()];
    let mut distinct = 0;
    let mut group_start = None;
    for idx in order {
        let value = values[idx];
        match group_start {
            Some(start) if value - start <= tolerance => {}
            _ => {
                group_start = Some(value);
                distinct += 1;
            }
        }
        ranks[idx] = distinct - 1;
    }

    Ranking { ranks, distinct }
}

/// An ordered sequence of hexagonal cells.
#[derive(Clone, Debug, Default)]
pub struct HexTessellation {
    cells: Vec<HexCell>,
    cell_size: Option<f64>,
}

impl HexTessellation {
    /// A `columns` by `rows` grid of pointy-topped hexagons.
    ///
    /// The first cell is centered on `origin`. Rows run south to north; each odd row
    /// (counting from zero at the south) is shifted east by half a cell. Cells are
    /// numbered from 1 in row-major order.
    pub fn grid(
        origin: Centroid,
        cell_size: f64,
        columns: usize,
        rows: usize,
    ) -> Result<Self, Error> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::InvalidCellSize(cell_size));
        }
        let count = columns
            .checked_mul(rows)
            .filter(|&count| count <= MAX_CELLS)
            .ok_or(Error::TooManyCells { columns, rows })?;
        let spacing = row_spacing(cell_size);
        let mut cells = Vec::with_capacity(count);
        for row in 0..rows {
            let shift = if row % 2 == 1 { cell_size / 2.0 } else { 0.0 };
            for column in 0..columns {
                let centroid = Centroid::new(
                    origin.east + column as f64 * cell_size + shift,
                    origin.north + row as f64 * spacing,
                );
                cells.push(HexCell {
                    id: cells.len() as CellId + 1,
                    centroid,
                    polygon: hexagon(centroid, cell_size),
                });
            }
        }
        Ok(HexTessellation {
            cells,
            cell_size: Some(cell_size),
        })
    }

    /// The smallest [`grid`][Self::grid] anchored at the south-west corner of `bbox`
    /// whose centroids reach its north and east edges.
    pub fn covering(bbox: BoundingBox, cell_size: f64) -> Result<Self, Error> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::InvalidCellSize(cell_size));
        }
        let finite = [bbox.min_east, bbox.min_north, bbox.max_east, bbox.max_north]
            .iter()
            .all(|value| value.is_finite());
        if !(finite && bbox.width() >= 0.0 && bbox.height() >= 0.0) {
            return Err(Error::InvalidExtent(bbox));
        }
        let columns = (bbox.width() / cell_size).ceil() + 1.0;
        let rows = (bbox.height() / row_spacing(cell_size)).ceil() + 1.0;
        if !(columns * rows <= MAX_CELLS as f64) {
            return Err(Error::TooManyCells {
                columns: columns as usize,
                rows: rows as usize,
            });
        }
        let (columns, rows) = (columns as usize, rows as usize);
        tracing::debug!(columns, rows, cell_size, "tessellating bounding box");
        Self::grid(
            Centroid::new(bbox.min_east, bbox.min_north),
            cell_size,
            columns,
            rows,
        )
    }

    /// Wrap externally produced cells, checking that ids are unique.
    pub fn from_cells(cells: Vec<HexCell>, cell_size: Option<f64>) -> Result<Self, Error> {
        let mut seen = HashSet::with_capacity(cells.len());
        if let Some(duplicate) = cells.iter().find(|cell| !seen.insert(cell.id)) {
            return Err(Error::DuplicateCell(duplicate.id));
        }
        Ok(HexTessellation { cells, cell_size })
    }

    /// Load cells from an `id,east,north` file with a header line.
    ///
    /// When `cell_size` is known, polygons are reconstructed around each centroid.
    pub fn load(path: &Path, cell_size: Option<f64>) -> Result<Self, Error> {
        let cells = input::parse::<CellRecord>(path, Header::Skip)?
            .map(|record| {
                let centroid = Centroid::new(record.east, record.north);
                HexCell {
                    id: record.id,
                    centroid,
                    polygon: cell_size
                        .map(|size| hexagon(centroid, size))
                        .unwrap_or_default(),
                }
            })
            .collect();
        let tessellation = Self::from_cells(cells, cell_size)?;
        tracing::debug!(path = %path.display(), cells = tessellation.len(), "loaded tessellation");
        Ok(tessellation)
    }

    #[inline]
    pub fn cells(&self) -> &[HexCell] {
        &self.cells
    }

    #[inline]
    pub fn cell_size(&self) -> Option<f64> {
        self.cell_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Dense rank of each cell by north coordinate.
    pub fn row_ranks(&self, tolerance: f64) -> Ranking {
        let norths: Vec<f64> = self.cells.iter().map(|cell| cell.centroid.north).collect();
        dense_rank(&norths, tolerance)
    }

    /// Dense rank of each cell by east coordinate.
    pub fn east_ranks(&self, tolerance: f64) -> Ranking {
        let easts: Vec<f64> = self.cells.iter().map(|cell| cell.centroid.east).collect();
        dense_rank(&easts, tolerance)
    }

    /// Bounding box of all cell centroids.
    pub fn extent(&self) -> Option<BoundingBox> {
        BoundingBox::around(self.cells.iter().map(|cell| cell.centroid))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("reading tessellation")]
    Io(#[from] std::io::Error),
    #[error("cell size must be positive and finite; got {0}")]
    InvalidCellSize(f64),
    #[error("bounding box {0} has negative or non-finite extent")]
    InvalidExtent(BoundingBox),
    #[error("a {columns} by {rows} grid exceeds the limit of {} cells", MAX_CELLS)]
    TooManyCells { columns: usize, rows: usize },
    #[error("cell id {0} appears more than once")]
    DuplicateCell(CellId),
}
