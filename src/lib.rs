//! Align blank hexagonal tessellations with published hex cartogram layouts, and
//! draw crash-rate risk ratios on the result.
//!
//! The entry point is [`HexGridAligner::align`]. Everything else loads its inputs,
//! writes its outputs, or colors the cells.

pub mod align;
pub mod config;
pub mod geometry;
pub mod input;
pub mod layout;
pub mod logging;
pub mod output;
pub mod rate;
pub mod render;
pub mod scale;
pub mod tessellation;

pub use align::{AlignConfig, Alignment, HexGridAligner, RowBand};
pub use input::{parse, parse_str, Header};
pub use layout::{HexUnit, NamedHexLayout, UnitId};
pub use scale::map_scale;
pub use tessellation::{HexCell, HexTessellation};
