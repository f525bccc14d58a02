//! Aligning a blank hex tessellation with a named hex layout.
//!
//! The tessellation's cells are ranked by north and east coordinate, those ranks are
//! rescaled onto the layout's row and column ranges, and the resulting [`GridIndex`]
//! is joined against the layout's units.
//!
//! ## Rows
//!
//! Row ranks are first stretched onto `min_row ..= min_row + row_count - 1`. Cells
//! falling outside the configured [`RowBand`] are excluded. The survivors are then
//! stretched onto `min_row ..= max_row` and rounded (ties to even).
//!
//! ## Columns
//!
//! Adjacent tessellation rows sit half a cell apart, so the distinct east values
//! alternate between the two row parities. Their ranks are rescaled onto half-column
//! steps starting half a column before `min_col`. Whichever layout rows receive the
//! half-step values round up; the other rows round to nearest. Those rows are found
//! from the tessellation itself, so an exact-span grid matches one to one whatever
//! the parity of `min_row`.

use crate::{
    geometry::{GridIndex, HalfStep, Parity, RowOffset},
    layout::{NamedHexLayout, UnitId},
    scale::{map_scale, round_half_even},
    tessellation::{CellId, HexTessellation, Ranking},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Inclusive range of first-pass rescaled rows which are kept.
///
/// These bounds depend on the particular layout being targeted. The published
/// UK local authority layout, for example, uses `-3 ..= 31`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowBand {
    pub min: f64,
    pub max: f64,
}

/// Slack allowed at the band edges, so rows which land on a bound by arithmetic are kept.
const BAND_EPSILON: f64 = 1e-9;

impl RowBand {
    pub fn contains(&self, row: f64) -> bool {
        self.min - BAND_EPSILON <= row && row <= self.max + BAND_EPSILON
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Valid row band. Defaults to the layout's own row extent.
    pub row_band: Option<RowBand>,
    /// Which rows round their column up.
    ///
    /// Defaults to the parity of the rows the tessellation's half-step columns land on,
    /// falling back to the rows the layout's offset leaves unshifted.
    pub half_step_rows: Option<Parity>,
    /// Coordinates closer than this are treated as the same row or column.
    pub tolerance: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        AlignConfig {
            row_band: None,
            half_step_rows: None,
            tolerance: 1e-6,
        }
    }
}

/// Where a single tessellation cell lands in layout space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Placement {
    /// The cell resolved to this grid index.
    Placed(GridIndex),
    /// The cell's first-pass row fell outside the row band.
    Excluded { rescaled_row: f64 },
}

/// The affine re-indexing from tessellation ranks to layout grid indices.
///
/// Built once per alignment by [`HexGridAligner::mapping`].
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentMapping {
    max_row_rank: f64,
    min_row: i32,
    max_row: i32,
    first_pass_max: f64,
    band: RowBand,
    survivor_min: f64,
    survivor_max: f64,
    max_east_rank: f64,
    column_low: f64,
    column_high: f64,
    half_step_rows: Parity,
}

impl AlignmentMapping {
    /// First-pass rescale of a row rank onto `min_row ..= min_row + row_count - 1`.
    pub fn rescaled_row(&self, row_rank: usize) -> f64 {
        map_scale(
            row_rank as f64,
            0.0,
            self.max_row_rank,
            self.min_row as f64,
            self.first_pass_max,
        )
    }

    /// Final layout row for a rescaled row which survived the band.
    pub fn final_row(&self, rescaled_row: f64) -> i32 {
        round_half_even(map_scale(
            rescaled_row,
            self.survivor_min,
            self.survivor_max,
            self.min_row as f64,
            self.max_row as f64,
        )) as i32
    }

    /// Column value, on the half-column lattice, of an east rank.
    pub fn column_value(&self, east_rank: usize) -> HalfStep {
        HalfStep::from_f64(map_scale(
            east_rank as f64,
            0.0,
            self.max_east_rank,
            self.column_low,
            self.column_high,
        ))
    }

    /// Map a cell's `(east_rank, row_rank)` into layout space.
    pub fn place(&self, east_rank: usize, row_rank: usize) -> Placement {
        let rescaled_row = self.rescaled_row(row_rank);
        if !self.band.contains(rescaled_row) {
            return Placement::Excluded { rescaled_row };
        }
        let r = self.final_row(rescaled_row);
        let q = self
            .column_value(east_rank)
            .column_on_row(r, self.half_step_rows) as i32;
        Placement::Placed(GridIndex { q, r })
    }

    /// Which row parity carries the half-column values, judged from the lowest
    /// surviving tessellation row.
    ///
    /// The first cell of that row decides: if its column value is a half step, the
    /// layout row it lands on rounds up, otherwise the rows either side of it do.
    /// `None` when every cell falls outside the band.
    fn observed_half_step_rows(&self, row_ranks: &[usize], east_ranks: &[usize]) -> Option<Parity> {
        let (row_rank, east_rank) = row_ranks
            .iter()
            .copied()
            .zip(east_ranks.iter().copied())
            .filter(|&(row_rank, _)| self.band.contains(self.rescaled_row(row_rank)))
            .min_by_key(|&(row_rank, _)| row_rank)?;
        let row = Parity::of(self.final_row(self.rescaled_row(row_rank)));
        if self.column_value(east_rank).is_half() {
            Some(row)
        } else {
            Some(row.flip())
        }
    }

    #[inline]
    pub fn band(&self) -> RowBand {
        self.band
    }

    #[inline]
    pub fn half_step_rows(&self) -> Parity {
        self.half_step_rows
    }
}

/// A unit of the layout paired with the tessellation cell placed at its index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Match {
    pub unit_id: UnitId,
    pub cell_id: CellId,
    pub index: GridIndex,
}

/// A cell dropped because its rescaled row fell outside the row band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExcludedCell {
    pub cell_id: CellId,
    pub rescaled_row: f64,
}

/// A cell that was placed, but no unit claimed it.
///
/// Either the layout has no unit at its index, or an earlier cell already took that unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnclaimedCell {
    pub cell_id: CellId,
    pub index: GridIndex,
}

/// Outcome of aligning a tessellation with a layout.
///
/// Nothing is dropped silently: every layout unit is either in `matches` or in
/// `unmatched_units`, and every cell is in exactly one of `matches`, `excluded_cells`
/// or `unclaimed_cells`.
#[derive(Clone, Debug, PartialEq)]
pub struct Alignment {
    pub mapping: AlignmentMapping,
    /// In tessellation order.
    pub matches: Vec<Match>,
    /// In layout order.
    pub unmatched_units: Vec<UnitId>,
    pub excluded_cells: Vec<ExcludedCell>,
    pub unclaimed_cells: Vec<UnclaimedCell>,
}

impl Alignment {
    /// `true` when every layout unit found a cell.
    pub fn is_complete(&self) -> bool {
        self.unmatched_units.is_empty()
    }
}

/// Aligns hexagonal tessellations with named hex layouts.
#[derive(Clone, Debug, Default)]
pub struct HexGridAligner {
    config: AlignConfig,
}

impl HexGridAligner {
    pub fn new(config: AlignConfig) -> Self {
        HexGridAligner { config }
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Compute the rank-to-index mapping for this layout and tessellation.
    pub fn mapping(
        &self,
        layout: &NamedHexLayout,
        tessellation: &HexTessellation,
    ) -> Result<AlignmentMapping, AlignError> {
        self.plan(layout, tessellation).map(|(mapping, _, _)| mapping)
    }

    /// The mapping together with the row and east rankings it was built from.
    fn plan(
        &self,
        layout: &NamedHexLayout,
        tessellation: &HexTessellation,
    ) -> Result<(AlignmentMapping, Ranking, Ranking), AlignError> {
        let shifted_rows = layout
            .offset()
            .shifted_rows()
            .ok_or(AlignError::ColumnOffset(layout.offset()))?;

        let rows = layout.rows();
        let columns = layout.columns();
        let (min_row, max_row, min_col) = match (rows.as_slice(), columns.as_slice()) {
            ([min_row, .., max_row], [min_col, _, ..]) => (*min_row, *max_row, *min_col),
            _ => {
                return Err(AlignError::DegenerateLayout {
                    rows: rows.len(),
                    columns: columns.len(),
                })
            }
        };

        let tolerance = self.config.tolerance;
        let row_ranking = tessellation.row_ranks(tolerance);
        let east_ranking = tessellation.east_ranks(tolerance);
        if row_ranking.distinct < 2 || east_ranking.distinct < 2 {
            return Err(AlignError::DegenerateTessellation {
                rows: row_ranking.distinct,
                easts: east_ranking.distinct,
            });
        }

        let band = self.config.row_band.unwrap_or(RowBand {
            min: min_row as f64,
            max: max_row as f64,
        });

        let mut mapping = AlignmentMapping {
            max_row_rank: (row_ranking.distinct - 1) as f64,
            min_row,
            max_row,
            first_pass_max: (min_row + rows.len() as i32 - 1) as f64,
            band,
            survivor_min: min_row as f64,
            survivor_max: max_row as f64,
            max_east_rank: (east_ranking.distinct - 1) as f64,
            column_low: min_col as f64 - 0.5,
            column_high: min_col as f64 - 0.5 + (east_ranking.distinct - 1) as f64 / 2.0,
            half_step_rows: shifted_rows.flip(),
        };

        // the second pass stretches whatever survived the band back over the full row range
        let survivors = (0..row_ranking.distinct)
            .map(|rank| mapping.rescaled_row(rank))
            .filter(|row| band.contains(*row));
        let (survivor_min, survivor_max) =
            survivors.fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), row| {
                (low.min(row), high.max(row))
            });
        if survivor_min.is_finite() {
            mapping.survivor_min = survivor_min;
            mapping.survivor_max = survivor_max;
        }

        if let Some(configured) = self.config.half_step_rows {
            mapping.half_step_rows = configured;
        } else if let Some(observed) =
            mapping.observed_half_step_rows(&row_ranking.ranks, &east_ranking.ranks)
        {
            if observed != shifted_rows.flip() {
                tracing::warn!(
                    offset = %layout.offset(),
                    half_step_rows = %observed,
                    "tessellation rows are shifted opposite to the layout; neighbours will differ"
                );
            }
            mapping.half_step_rows = observed;
        }

        tracing::debug!(?mapping, "computed alignment mapping");
        Ok((mapping, row_ranking, east_ranking))
    }

    /// Align `tessellation` with `layout`.
    ///
    /// Cells are joined to units where their computed grid index equals the unit's.
    /// Units without a cell, cells outside the row band, and cells without a unit are
    /// all reported in the returned [`Alignment`].
    pub fn align(
        &self,
        layout: &NamedHexLayout,
        tessellation: &HexTessellation,
    ) -> Result<Alignment, AlignError> {
        let (mapping, row_ranking, east_ranking) = self.plan(layout, tessellation)?;

        let mut matches = Vec::new();
        let mut excluded_cells = Vec::new();
        let mut unclaimed_cells = Vec::new();
        let mut claimed = HashSet::with_capacity(layout.len());

        let ranked = tessellation
            .cells()
            .iter()
            .zip(row_ranking.ranks)
            .zip(east_ranking.ranks);
        for ((cell, row_rank), east_rank) in ranked {
            match mapping.place(east_rank, row_rank) {
                Placement::Excluded { rescaled_row } => excluded_cells.push(ExcludedCell {
                    cell_id: cell.id,
                    rescaled_row,
                }),
                Placement::Placed(index) => match layout.at(index) {
                    Some(unit) if claimed.insert(index) => matches.push(Match {
                        unit_id: unit.id.clone(),
                        cell_id: cell.id,
                        index,
                    }),
                    Some(unit) => {
                        tracing::warn!(
                            cell = cell.id,
                            unit = %unit.id,
                            %index,
                            "unit already claimed by an earlier cell"
                        );
                        unclaimed_cells.push(UnclaimedCell {
                            cell_id: cell.id,
                            index,
                        });
                    }
                    None => unclaimed_cells.push(UnclaimedCell {
                        cell_id: cell.id,
                        index,
                    }),
                },
            }
        }

        let unmatched_units: Vec<UnitId> = layout
            .units()
            .iter()
            .filter(|unit| !claimed.contains(&unit.index))
            .map(|unit| unit.id.clone())
            .collect();

        tracing::info!(
            matched = matches.len(),
            unmatched = unmatched_units.len(),
            excluded = excluded_cells.len(),
            unclaimed = unclaimed_cells.len(),
            "aligned tessellation with layout"
        );
        if !unmatched_units.is_empty() {
            tracing::warn!(
                count = unmatched_units.len(),
                "some layout units found no tessellation cell"
            );
            for unit in &unmatched_units {
                tracing::debug!(%unit, "unmatched unit");
            }
        }

        Ok(Alignment {
            mapping,
            matches,
            unmatched_units,
            excluded_cells,
            unclaimed_cells,
        })
    }
}

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("layout uses column offsets ({0}); only row-offset layouts can be aligned")]
    ColumnOffset(RowOffset),
    #[error("layout needs at least two distinct rows and columns; found {rows} rows and {columns} columns")]
    DegenerateLayout { rows: usize, columns: usize },
    #[error("tessellation needs at least two distinct north and east values; found {rows} and {easts}")]
    DegenerateTessellation { rows: usize, easts: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::Centroid,
        layout::HexUnit,
        tessellation::{HexCell, HexTessellation},
    };
    use std::ops::Range;

    fn square_layout(offset: RowOffset, columns: Range<i32>, rows: Range<i32>) -> NamedHexLayout {
        let units = rows
            .flat_map(|r| {
                columns
                    .clone()
                    .map(move |q| HexUnit::new(format!("{}:{}", q, r), q, r))
            })
            .collect();
        NamedHexLayout::new(offset, units).unwrap()
    }

    fn grid(columns: usize, rows: usize) -> HexTessellation {
        HexTessellation::grid(Centroid::new(500.0, 1000.0), 20.0, columns, rows).unwrap()
    }

    #[test]
    fn test_four_by_four() {
        let layout = square_layout(RowOffset::OddR, 0..4, 0..4);
        let alignment = HexGridAligner::default().align(&layout, &grid(4, 4)).unwrap();
        assert_eq!(alignment.matches.len(), 16);
        assert!(alignment.unmatched_units.is_empty());
        assert!(alignment.excluded_cells.is_empty());
        assert!(alignment.unclaimed_cells.is_empty());
        assert!(alignment.is_complete());
    }

    #[test]
    fn test_cells_land_on_their_own_offsets() {
        let layout = square_layout(RowOffset::OddR, 0..4, 0..4);
        let alignment = HexGridAligner::default().align(&layout, &grid(4, 4)).unwrap();
        // grid ids run row-major from the south, so cell n sits at ((n-1) % 4, (n-1) / 4)
        for m in &alignment.matches {
            let n = m.cell_id as i32 - 1;
            assert_eq!(m.index, GridIndex::new(n % 4, n / 4), "cell {}", m.cell_id);
            assert_eq!(m.unit_id, format!("{}:{}", n % 4, n / 4));
        }
    }

    #[test]
    fn test_shifted_extent() {
        let layout = square_layout(RowOffset::OddR, 3..8, -2..4);
        let alignment = HexGridAligner::default().align(&layout, &grid(5, 6)).unwrap();
        assert_eq!(alignment.matches.len(), 30);
        assert!(alignment.is_complete());
    }

    #[test]
    fn test_idempotent() {
        let layout = square_layout(RowOffset::OddR, 0..6, 0..5);
        let tessellation = grid(7, 5);
        let aligner = HexGridAligner::default();
        let first = aligner.align(&layout, &tessellation).unwrap();
        let second = aligner.align(&layout, &tessellation).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_row_below_band_is_excluded() {
        let layout = square_layout(RowOffset::OddR, 0..4, 0..4);
        let aligner = HexGridAligner::new(AlignConfig {
            row_band: Some(RowBand { min: 1.0, max: 3.0 }),
            ..AlignConfig::default()
        });
        let alignment = aligner.align(&layout, &grid(4, 4)).unwrap();

        assert_eq!(alignment.excluded_cells.len(), 4);
        for excluded in &alignment.excluded_cells {
            assert_eq!(excluded.rescaled_row, 0.0);
            assert!(excluded.cell_id <= 4);
        }
        assert_eq!(alignment.matches.len(), 16 - 4);
        assert_eq!(alignment.unmatched_units.len(), 4);
        assert!(alignment.unclaimed_cells.is_empty());
    }

    #[test]
    fn test_narrow_tessellation_reports_unmatched() {
        let layout = square_layout(RowOffset::OddR, 0..4, 0..4);
        let alignment = HexGridAligner::default().align(&layout, &grid(3, 4)).unwrap();
        assert_eq!(alignment.matches.len(), 12);
        let mut unmatched = alignment.unmatched_units.clone();
        unmatched.sort();
        assert_eq!(unmatched, ["3:0", "3:1", "3:2", "3:3"]);
    }

    #[test]
    fn test_sparse_layout_leaves_cells_unclaimed() {
        let units = vec![
            HexUnit::new("a", 0, 0),
            HexUnit::new("b", 1, 0),
            HexUnit::new("c", 0, 1),
            HexUnit::new("d", 1, 2),
        ];
        let layout = NamedHexLayout::new(RowOffset::OddR, units).unwrap();
        let alignment = HexGridAligner::default().align(&layout, &grid(2, 3)).unwrap();
        assert_eq!(alignment.matches.len(), 4);
        assert_eq!(alignment.unclaimed_cells.len(), 2);
        assert_eq!(
            alignment.unclaimed_cells.iter().map(|c| c.index).collect::<Vec<_>>(),
            [GridIndex::new(1, 1), GridIndex::new(0, 2)]
        );
    }

    #[test]
    fn test_duplicate_placement_is_unclaimed() {
        let layout = square_layout(RowOffset::OddR, 0..2, 0..2);
        let mut cells = grid(2, 2).cells().to_vec();
        let mut twin = cells[0].clone();
        twin.id = 99;
        cells.push(twin);
        let tessellation = HexTessellation::from_cells(cells, None).unwrap();
        let alignment = HexGridAligner::default().align(&layout, &tessellation).unwrap();
        assert_eq!(alignment.matches.len(), 4);
        assert_eq!(
            alignment.unclaimed_cells,
            [UnclaimedCell {
                cell_id: 99,
                index: GridIndex::new(0, 0)
            }]
        );
    }

    #[test]
    fn test_half_step_override() {
        let mapping_for = |half_step_rows| {
            let layout = square_layout(RowOffset::OddR, 0..4, 0..4);
            HexGridAligner::new(AlignConfig {
                half_step_rows,
                ..AlignConfig::default()
            })
            .mapping(&layout, &grid(4, 4))
            .unwrap()
        };
        assert_eq!(mapping_for(None).half_step_rows(), Parity::Even);
        assert_eq!(mapping_for(Some(Parity::Odd)).half_step_rows(), Parity::Odd);
    }

    #[test]
    fn test_half_step_rows_follow_tessellation() {
        let observed = |offset, rows| {
            HexGridAligner::default()
                .mapping(&square_layout(offset, 0..4, rows), &grid(4, 4))
                .unwrap()
                .half_step_rows()
        };
        assert_eq!(observed(RowOffset::OddR, 0..4), Parity::Even);
        assert_eq!(observed(RowOffset::EvenR, 0..4), Parity::Even);
        assert_eq!(observed(RowOffset::OddR, 1..5), Parity::Odd);
        assert_eq!(observed(RowOffset::EvenR, -3..1), Parity::Odd);
    }

    #[test]
    fn test_any_offset_or_first_row_matches_one_to_one() {
        let cases = [
            (RowOffset::EvenR, 0..4),
            (RowOffset::OddR, 1..5),
            (RowOffset::EvenR, -3..1),
        ];
        for (offset, rows) in cases {
            let layout = square_layout(offset, 0..4, rows.clone());
            let alignment = HexGridAligner::default().align(&layout, &grid(4, 4)).unwrap();
            assert_eq!(alignment.matches.len(), 16, "{} rows {:?}", offset, rows);
            assert!(alignment.unclaimed_cells.is_empty(), "{} rows {:?}", offset, rows);
        }
    }

    #[test]
    fn test_column_offset_layout_rejected() {
        let layout = square_layout(RowOffset::OddQ, 0..2, 0..2);
        assert!(matches!(
            HexGridAligner::default().align(&layout, &grid(2, 2)),
            Err(AlignError::ColumnOffset(RowOffset::OddQ))
        ));
    }

    #[test]
    fn test_single_row_layout_rejected() {
        let layout = square_layout(RowOffset::OddR, 0..4, 0..1);
        assert!(matches!(
            HexGridAligner::default().align(&layout, &grid(4, 4)),
            Err(AlignError::DegenerateLayout { rows: 1, columns: 4 })
        ));
    }

    #[test]
    fn test_single_row_tessellation_rejected() {
        let layout = square_layout(RowOffset::OddR, 0..2, 0..2);
        let cells = (1..=3)
            .map(|id| HexCell {
                id,
                centroid: Centroid::new(id as f64, 0.0),
                polygon: Vec::new(),
            })
            .collect();
        let tessellation = HexTessellation::from_cells(cells, None).unwrap();
        assert!(matches!(
            HexGridAligner::default().align(&layout, &tessellation),
            Err(AlignError::DegenerateTessellation { rows: 1, easts: 3 })
        ));
    }
}
