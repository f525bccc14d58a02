use super::offset::Parity;

/// Offset hex coordinates, as used by HexJSON layouts.
///
/// `q` is the column and `r` the row. Whether odd or even rows are shifted
/// is a property of the layout, not of the coordinate; see [`RowOffset`][super::RowOffset].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Hash,
    parse_display::Display,
    parse_display::FromStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[display("({q}, {r})")]
pub struct GridIndex {
    pub q: i32,
    pub r: i32,
}

impl GridIndex {
    pub fn new(q: i32, r: i32) -> Self {
        GridIndex { q, r }
    }
}

/// A value on the half-integer lattice, stored exactly as twice its value.
///
/// Tessellation columns on alternate rows sit half a cell apart, so after rescaling
/// every column value is either a whole or a half column. Snapping to this type once
/// means the later rounding never sees floating-point drift.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HalfStep(i64);

impl HalfStep {
    /// Snap a floating-point value to the nearest half step.
    pub fn from_f64(value: f64) -> Self {
        HalfStep((value * 2.0).round() as i64)
    }

    /// Construct from a count of halves, i.e. `HalfStep::from_halves(5)` is `2.5`.
    pub fn from_halves(halves: i64) -> Self {
        HalfStep(halves)
    }

    pub fn halves(self) -> i64 {
        self.0
    }

    /// `true` when this value sits exactly halfway between two integers.
    pub fn is_half(self) -> bool {
        self.0.rem_euclid(2) == 1
    }

    /// Smallest integer not less than this value.
    pub fn ceil(self) -> i64 {
        (self.0 + 1).div_euclid(2)
    }

    /// Nearest integer, with ties going to the even neighbour.
    pub fn nearest(self) -> i64 {
        let floor = self.0.div_euclid(2);
        if !self.is_half() || floor.rem_euclid(2) == 0 {
            floor
        } else {
            floor + 1
        }
    }

    /// Resolve this column value to an integer column on the given row.
    ///
    /// Rows whose parity is `half_step_rows` carry the half-column shift and round up;
    /// all other rows round to the nearest integer.
    pub fn column_on_row(self, row: i32, half_step_rows: Parity) -> i64 {
        if Parity::of(row) == half_step_rows {
            self.ceil()
        } else {
            self.nearest()
        }
    }
}
