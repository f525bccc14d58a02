//! Writers for derived tables and geometry.

use crate::{
    align::Alignment,
    layout::NamedHexLayout,
    rate::RiskRatio,
    tessellation::{CellId, CellRecord, HexCell, HexTessellation},
};
use serde_json::{json, Value};
use std::{collections::HashMap, io::Write};
use thiserror::Error;

pub const MAPPING_HEADER: &str = "unit_id,cell_id,q,r,east,north";
pub const CELLS_HEADER: &str = "id,east,north";

/// Write every cell as `id,east,north`, with a header.
pub fn write_cells(mut writer: impl Write, tessellation: &HexTessellation) -> Result<(), Error> {
    writeln!(writer, "{}", CELLS_HEADER)?;
    for cell in tessellation.cells() {
        writeln!(writer, "{}", CellRecord::from(cell))?;
    }
    writer.flush()?;
    Ok(())
}

fn cell_index(tessellation: &HexTessellation) -> HashMap<CellId, &HexCell> {
    tessellation
        .cells()
        .iter()
        .map(|cell| (cell.id, cell))
        .collect()
}

/// Write one row per match: `unit_id,cell_id,q,r,east,north`, with a header.
pub fn write_mapping(
    mut writer: impl Write,
    tessellation: &HexTessellation,
    alignment: &Alignment,
) -> Result<(), Error> {
    let cells = cell_index(tessellation);
    writeln!(writer, "{}", MAPPING_HEADER)?;
    for m in &alignment.matches {
        let cell = cells.get(&m.cell_id).ok_or(Error::UnknownCell(m.cell_id))?;
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            m.unit_id, m.cell_id, m.index.q, m.index.r, cell.centroid.east, cell.centroid.north
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Build a GeoJSON `FeatureCollection` of the matched cells.
///
/// Cells without polygons are written as points at their centroid.
pub fn geojson(
    layout: &NamedHexLayout,
    tessellation: &HexTessellation,
    alignment: &Alignment,
) -> Result<Value, Error> {
    let cells = cell_index(tessellation);
    let features = alignment
        .matches
        .iter()
        .map(|m| {
            let cell = cells.get(&m.cell_id).ok_or(Error::UnknownCell(m.cell_id))?;
            let geometry = if cell.polygon.is_empty() {
                json!({
                    "type": "Point",
                    "coordinates": [cell.centroid.east, cell.centroid.north],
                })
            } else {
                let ring: Vec<[f64; 2]> = cell
                    .polygon
                    .iter()
                    .chain(cell.polygon.first())
                    .map(|vertex| [vertex.east, vertex.north])
                    .collect();
                json!({
                    "type": "Polygon",
                    "coordinates": [ring],
                })
            };
            let name = layout.unit(&m.unit_id).and_then(|unit| unit.name.clone());
            Ok(json!({
                "type": "Feature",
                "geometry": geometry,
                "properties": {
                    "unit_id": m.unit_id,
                    "name": name,
                    "cell_id": m.cell_id,
                    "q": m.index.q,
                    "r": m.index.r,
                },
            }))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(json!({
        "type": "FeatureCollection",
        "features": features,
    }))
}

/// Write the GeoJSON of [`geojson`].
pub fn write_geojson(
    mut writer: impl Write,
    layout: &NamedHexLayout,
    tessellation: &HexTessellation,
    alignment: &Alignment,
) -> Result<(), Error> {
    let value = geojson(layout, tessellation, alignment)?;
    serde_json::to_writer_pretty(&mut writer, &value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write the ids of units which found no cell, one per line.
pub fn write_unmatched(mut writer: impl Write, alignment: &Alignment) -> Result<(), Error> {
    for unit in &alignment.unmatched_units {
        writeln!(writer, "{}", unit)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write risk ratio estimates with a header.
pub fn write_risk_ratios(mut writer: impl Write, estimates: &[RiskRatio]) -> Result<(), Error> {
    writeln!(writer, "{}", RiskRatio::HEADER)?;
    for estimate in estimates {
        writeln!(writer, "{}", estimate)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("writing output")]
    Io(#[from] std::io::Error),
    #[error("serializing geojson")]
    Json(#[from] serde_json::Error),
    #[error("matched cell {0} is not part of the tessellation")]
    UnknownCell(CellId),
}
