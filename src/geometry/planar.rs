//! Planar (projected) coordinates.

use serde::{Deserialize, Serialize};

/// A point in a projected planar coordinate system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub east: f64,
    pub north: f64,
}

impl Centroid {
    pub fn new(east: f64, north: f64) -> Self {
        Centroid { east, north }
    }
}

/// An axis-aligned rectangle in planar coordinates.
///
/// Parses from and displays as `min_east,min_north,max_east,max_north`.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    parse_display::Display,
    parse_display::FromStr,
    Serialize,
    Deserialize,
)]
#[display("{min_east},{min_north},{max_east},{max_north}")]
pub struct BoundingBox {
    pub min_east: f64,
    pub min_north: f64,
    pub max_east: f64,
    pub max_north: f64,
}

impl BoundingBox {
    /// Smallest bounding box containing every point.
    ///
    /// `None` if there are no points.
    pub fn around(points: impl IntoIterator<Item = Centroid>) -> Option<BoundingBox> {
        points.into_iter().fold(None, |bbox, point| {
            Some(match bbox {
                None => BoundingBox {
                    min_east: point.east,
                    min_north: point.north,
                    max_east: point.east,
                    max_north: point.north,
                },
                Some(bbox) => bbox.including(point),
            })
        })
    }

    /// Expand this box to include the given point.
    pub fn including(self, point: Centroid) -> BoundingBox {
        BoundingBox {
            min_east: self.min_east.min(point.east),
            min_north: self.min_north.min(point.north),
            max_east: self.max_east.max(point.east),
            max_north: self.max_north.max(point.north),
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_east - self.min_east
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_north - self.min_north
    }
}
