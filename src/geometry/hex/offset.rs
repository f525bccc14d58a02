/// Parity of a row or column index.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    parse_display::Display,
    parse_display::FromStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[display(style = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn of(index: i32) -> Parity {
        if index.rem_euclid(2) == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    pub fn flip(self) -> Parity {
        match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        }
    }
}

/// Offset convention of a hex layout, as named in the HexJSON `layout` field.
///
/// In `odd-r`, odd rows are pushed right by half a hex relative to even rows;
/// `even-r` is the reverse. The `-q` variants shift columns instead.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    parse_display::Display,
    parse_display::FromStr,
)]
pub enum RowOffset {
    #[display("odd-r")]
    #[default]
    OddR,
    #[display("even-r")]
    EvenR,
    #[display("odd-q")]
    OddQ,
    #[display("even-q")]
    EvenQ,
}

impl RowOffset {
    /// Rows pushed right by half a hex.
    ///
    /// `None` for column-offset layouts, which cannot be aligned row-wise.
    pub fn shifted_rows(self) -> Option<Parity> {
        match self {
            RowOffset::OddR => Some(Parity::Odd),
            RowOffset::EvenR => Some(Parity::Even),
            RowOffset::OddQ | RowOffset::EvenQ => None,
        }
    }
}
