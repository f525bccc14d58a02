pub mod hex;
pub mod planar;

pub use hex::{GridIndex, HalfStep, Parity, RowOffset};
pub use planar::{BoundingBox, Centroid};
