//! Static SVG rendering of aligned hex cartograms.
//!
//! Every call takes an explicit [`Style`]; nothing is configured globally.

use crate::{
    align::Alignment,
    geometry::{BoundingBox, Centroid},
    layout::{NamedHexLayout, UnitId},
    rate::RiskRatio,
    scale::map_scale,
    tessellation::{CellId, HexCell, HexTessellation},
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::{
    collections::HashMap,
    fmt::{self, Write},
    str::FromStr,
};
use thiserror::Error;

/// A type implementing `ToRgb` can be converted to a single color.
pub trait ToRgb {
    fn to_rgb(&self) -> [u8; 3];
}

/// An sRGB color, written `#rrggbb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

impl ToRgb for Rgb {
    fn to_rgb(&self) -> [u8; 3] {
        self.0
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').ok_or_else(|| ParseColorError(s.into()))?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ParseColorError(s.into()));
        }
        let channel = |idx: usize| {
            u8::from_str_radix(&hex[idx * 2..idx * 2 + 2], 16).map_err(|_| ParseColorError(s.into()))
        };
        Ok(Rgb([channel(0)?, channel(1)?, channel(2)?]))
    }
}

/// Color strings must look like `#1f77b4`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("malformed color {0:?}; expected #rrggbb")]
pub struct ParseColorError(String);

/// How a cartogram is drawn.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    /// Label and legend font size, in pixels.
    pub base_font_size: f64,
    /// Fill colors from lowest to highest risk ratio.
    #[serde_as(as = "Vec<DisplayFromStr>")]
    pub accent_palette: Vec<Rgb>,
    /// Fill for units without an estimate.
    #[serde_as(as = "DisplayFromStr")]
    pub no_data: Rgb,
    #[serde_as(as = "DisplayFromStr")]
    pub stroke: Rgb,
    pub stroke_width: f64,
    #[serde_as(as = "DisplayFromStr")]
    pub background: Rgb,
    /// Image width in pixels. Height follows from the aspect ratio of the cells.
    pub width: f64,
    pub margin: f64,
    /// Risk ratios at the ends of the palette. Mapped on a log scale.
    pub ratio_range: [f64; 2],
    /// Opacity of cells whose interval includes 1.
    pub uncertain_opacity: f64,
    /// Write each unit's id on its cell.
    pub labels: bool,
}

impl Default for Style {
    fn default() -> Self {
        Style {
            base_font_size: 10.0,
            accent_palette: vec![
                Rgb([0x21, 0x66, 0xac]),
                Rgb([0x67, 0xa9, 0xcf]),
                Rgb([0xd1, 0xe5, 0xf0]),
                Rgb([0xf7, 0xf7, 0xf7]),
                Rgb([0xfd, 0xdb, 0xc7]),
                Rgb([0xef, 0x8a, 0x62]),
                Rgb([0xb2, 0x18, 0x2b]),
            ],
            no_data: Rgb([0xbd, 0xbd, 0xbd]),
            stroke: Rgb([0xff, 0xff, 0xff]),
            stroke_width: 0.5,
            background: Rgb([0xff, 0xff, 0xff]),
            width: 800.0,
            margin: 20.0,
            ratio_range: [0.5, 2.0],
            uncertain_opacity: 0.35,
            labels: false,
        }
    }
}

impl Style {
    /// Palette entry for a risk ratio.
    ///
    /// `None` if the palette is empty or the ratio is not positive.
    pub fn color_for(&self, ratio: f64) -> Option<Rgb> {
        if self.accent_palette.is_empty() || !(ratio > 0.0) {
            return None;
        }
        let [low, high] = self.ratio_range;
        let top = (self.accent_palette.len() - 1) as f64;
        let position = map_scale(ratio.log2(), low.log2(), high.log2(), 0.0, top);
        let idx = position.round().clamp(0.0, top) as usize;
        Some(self.accent_palette[idx])
    }
}

/// Pure mapping from planar coordinates into image pixels.
///
/// North is up: the y axis is flipped. Aspect ratio is preserved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    bbox: BoundingBox,
    width: f64,
    height: f64,
    margin: f64,
}

impl Transform {
    /// Fit `bbox` into an image `width` pixels wide with `margin` on every side.
    pub fn fit(bbox: BoundingBox, width: f64, margin: f64) -> Self {
        let inner = (width - 2.0 * margin).max(1.0);
        let scale = inner / bbox.width().max(f64::EPSILON);
        let height = bbox.height() * scale + 2.0 * margin;
        Transform {
            bbox,
            width,
            height,
            margin,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn apply(&self, point: Centroid) -> (f64, f64) {
        let x = map_scale(
            point.east,
            self.bbox.min_east,
            self.bbox.max_east,
            self.margin,
            self.width - self.margin,
        );
        let y = map_scale(
            point.north,
            self.bbox.min_north,
            self.bbox.max_north,
            self.height - self.margin,
            self.margin,
        );
        (x, y)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn points(transform: &Transform, polygon: &[Centroid]) -> String {
    polygon
        .iter()
        .map(|vertex| {
            let (x, y) = transform.apply(*vertex);
            format!("{:.2},{:.2}", x, y)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render the matched cells of an alignment, filled by each unit's risk ratio.
///
/// Units whose interval includes 1 are drawn at `style.uncertain_opacity`.
pub fn render_svg(
    layout: &NamedHexLayout,
    tessellation: &HexTessellation,
    alignment: &Alignment,
    estimates: &HashMap<UnitId, RiskRatio>,
    style: &Style,
) -> Result<String, Error> {
    let cells: HashMap<CellId, &HexCell> = tessellation
        .cells()
        .iter()
        .map(|cell| (cell.id, cell))
        .collect();

    let mut drawn = Vec::with_capacity(alignment.matches.len());
    for m in &alignment.matches {
        let cell = *cells.get(&m.cell_id).ok_or(Error::UnknownCell(m.cell_id))?;
        if cell.polygon.is_empty() {
            return Err(Error::MissingGeometry(cell.id));
        }
        drawn.push((m, cell));
    }

    let bbox = BoundingBox::around(
        drawn
            .iter()
            .flat_map(|(_, cell)| cell.polygon.iter().copied()),
    )
    .ok_or(Error::NothingToDraw)?;
    let transform = Transform::fit(bbox, style.width, style.margin);
    let legend_height = if style.accent_palette.is_empty() {
        0.0
    } else {
        style.base_font_size * 3.0
    };
    let height = transform.height() + legend_height;

    let mut svg = String::new();
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.2} {:.2}" font-family="sans-serif">"#,
        transform.width(),
        height,
        transform.width(),
        height,
    )?;
    writeln!(
        svg,
        r#"<rect width="100%" height="100%" fill="{}"/>"#,
        style.background
    )?;

    writeln!(
        svg,
        r#"<g stroke="{}" stroke-width="{}">"#,
        style.stroke, style.stroke_width
    )?;
    for (m, cell) in &drawn {
        let estimate = estimates.get(&m.unit_id);
        let fill = estimate
            .and_then(|estimate| style.color_for(estimate.ratio))
            .unwrap_or(style.no_data);
        let opacity = match estimate {
            Some(estimate) if !estimate.is_distinct() => style.uncertain_opacity,
            _ => 1.0,
        };
        let name = layout
            .unit(&m.unit_id)
            .and_then(|unit| unit.name.as_deref())
            .unwrap_or(m.unit_id.as_str());
        let title = match estimate {
            Some(estimate) => format!(
                "{}: {:.2} ({:.2} to {:.2})",
                name, estimate.ratio, estimate.lower, estimate.upper
            ),
            None => format!("{}: no data", name),
        };
        writeln!(
            svg,
            r#"<polygon points="{}" fill="{}" fill-opacity="{}"><title>{}</title></polygon>"#,
            points(&transform, &cell.polygon),
            fill,
            opacity,
            escape(&title),
        )?;
    }
    writeln!(svg, "</g>")?;

    if style.labels {
        writeln!(
            svg,
            r#"<g font-size="{}" text-anchor="middle" dominant-baseline="central">"#,
            style.base_font_size
        )?;
        for (m, cell) in &drawn {
            let (x, y) = transform.apply(cell.centroid);
            writeln!(
                svg,
                r#"<text x="{:.2}" y="{:.2}">{}</text>"#,
                x,
                y,
                escape(&m.unit_id)
            )?;
        }
        writeln!(svg, "</g>")?;
    }

    if !style.accent_palette.is_empty() {
        write_legend(&mut svg, style, transform.height())?;
    }

    writeln!(svg, "</svg>")?;
    Ok(svg)
}

fn write_legend(svg: &mut String, style: &Style, top: f64) -> fmt::Result {
    let swatch = style.base_font_size * 1.5;
    let [low, high] = style.ratio_range;
    let top_idx = (style.accent_palette.len() - 1) as f64;
    writeln!(svg, r#"<g font-size="{}">"#, style.base_font_size)?;
    for (idx, color) in style.accent_palette.iter().enumerate() {
        let x = style.margin + idx as f64 * swatch * 2.0;
        let ratio = map_scale(idx as f64, 0.0, top_idx, low.log2(), high.log2()).exp2();
        writeln!(
            svg,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
            x, top, swatch, swatch, color
        )?;
        writeln!(
            svg,
            r#"<text x="{:.2}" y="{:.2}">{:.2}</text>"#,
            x,
            top + swatch + style.base_font_size,
            ratio
        )?;
    }
    writeln!(svg, "</g>")
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cell {0} is not part of the tessellation")]
    UnknownCell(CellId),
    #[error("cell {0} has no polygon; supply a cell size when loading the tessellation")]
    MissingGeometry(CellId),
    #[error("alignment has no matched cells to draw")]
    NothingToDraw,
    #[error("formatting svg")]
    Format(#[from] fmt::Error),
}
