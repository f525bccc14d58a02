//! Hexagonal grid indexing.
//!
//! Uses the offset-coordinate conventions from [this reference](https://www.redblobgames.com/grids/hexagons/#coordinates-offset),
//! as published in [HexJSON](https://odileeds.org/projects/hexmaps/hexjson.html) layouts.

pub mod coordinate;
pub mod offset;

pub use coordinate::{GridIndex, HalfStep};
pub use offset::{Parity, RowOffset};
