//! hexcarto - command-line interface
//!
//! Tessellates an extent, aligns the tessellation with a HexJSON layout, computes
//! crash-rate risk ratios, and renders the result.

use clap::{Parser, Subcommand};
use hexcarto::{
    config::{self, Config},
    geometry::BoundingBox,
    layout, logging, output, rate, render, tessellation, HexGridAligner,
    HexTessellation, NamedHexLayout, RowBand,
};
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    process,
};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "hexcarto")]
#[command(about = "Align hex tessellations with hex cartogram layouts", long_about = None)]
struct Args {
    /// Configuration file (default: the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the effective configuration to the configuration file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate a hexagonal tessellation covering a bounding box
    Tessellate {
        /// Extent as min_east,min_north,max_east,max_north
        #[arg(long, allow_hyphen_values = true)]
        bbox: BoundingBox,

        /// Flat-to-flat hexagon width (default: from configuration)
        #[arg(long)]
        cell_size: Option<f64>,

        /// Output CSV of id,east,north
        #[arg(long)]
        output: PathBuf,
    },
    /// Align a tessellation with a HexJSON layout
    Align {
        /// HexJSON layout
        #[arg(long)]
        layout: PathBuf,

        /// Tessellation CSV of id,east,north
        #[arg(long)]
        cells: PathBuf,

        /// Output CSV of unit_id,cell_id,q,r,east,north
        #[arg(long)]
        output: PathBuf,

        /// Also write matched cells as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,

        /// Write ids of units which found no cell, one per line
        #[arg(long)]
        unmatched: Option<PathBuf>,

        /// Flat-to-flat hexagon width, used to rebuild polygons
        #[arg(long)]
        cell_size: Option<f64>,

        /// Lowest first-pass row kept (default: from configuration, else the layout's extent)
        #[arg(long, requires = "row_band_max", allow_hyphen_values = true)]
        row_band_min: Option<f64>,

        /// Highest first-pass row kept
        #[arg(long, requires = "row_band_min", allow_hyphen_values = true)]
        row_band_max: Option<f64>,
    },
    /// Compute risk ratios with bootstrap intervals
    Risk {
        /// Crash CSV of unit_id,severity
        #[arg(long)]
        crashes: PathBuf,

        /// Exposure CSV of unit_id,population
        #[arg(long)]
        exposure: PathBuf,

        /// Output CSV of risk ratio estimates
        #[arg(long)]
        output: PathBuf,

        /// Count only killed-or-seriously-injured crashes
        #[arg(long)]
        ksi: bool,

        /// Bootstrap resamples (default: from configuration)
        #[arg(long)]
        iterations: Option<usize>,

        /// Random seed (default: from configuration)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Render aligned cells as an SVG cartogram colored by risk ratio
    Render {
        /// HexJSON layout
        #[arg(long)]
        layout: PathBuf,

        /// Tessellation CSV of id,east,north
        #[arg(long)]
        cells: PathBuf,

        /// Risk ratio CSV as written by `risk`
        #[arg(long)]
        risk: PathBuf,

        /// Output SVG
        #[arg(long)]
        output: PathBuf,

        /// Flat-to-flat hexagon width, used to rebuild polygons
        #[arg(long)]
        cell_size: Option<f64>,

        /// Label each cell with its unit id
        #[arg(long)]
        labels: bool,
    },
}

#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Layout(#[from] layout::Error),
    #[error(transparent)]
    Tessellation(#[from] tessellation::Error),
    #[error(transparent)]
    Align(#[from] hexcarto::align::AlignError),
    #[error(transparent)]
    Rate(#[from] rate::Error),
    #[error(transparent)]
    Output(#[from] output::Error),
    #[error(transparent)]
    Render(#[from] render::Error),
    #[error("creating {}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no cell size given; pass --cell-size or set tessellation.cell_size")]
    NoCellSize,
    #[error("no configuration directory on this platform; pass --config")]
    NoConfigPath,
    #[error("{} already exists; pass --force to replace it", .0.display())]
    ConfigExists(PathBuf),
}

fn create(path: &Path) -> Result<BufWriter<File>, Error> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| Error::Create {
            path: path.to_owned(),
            source,
        })
}

fn align(
    config: &Config,
    layout_path: &Path,
    cells_path: &Path,
    cell_size: Option<f64>,
) -> Result<(NamedHexLayout, HexTessellation, hexcarto::Alignment), Error> {
    let layout = NamedHexLayout::load(layout_path)?;
    let cell_size = cell_size.or(config.tessellation.cell_size);
    let tessellation = HexTessellation::load(cells_path, cell_size)?;
    let alignment = HexGridAligner::new(config.align.clone()).align(&layout, &tessellation)?;
    Ok((layout, tessellation, alignment))
}

fn run(args: Args) -> Result<(), Error> {
    let mut config = Config::resolve(args.config.as_deref())?;

    match args.command {
        Command::InitConfig { force } => {
            let path = args
                .config
                .or_else(config::path)
                .ok_or(Error::NoConfigPath)?;
            if path.exists() && !force {
                return Err(Error::ConfigExists(path));
            }
            config.save(&path)?;
            tracing::info!(path = %path.display(), "wrote configuration");
        }
        Command::Tessellate {
            bbox,
            cell_size,
            output: path,
        } => {
            let cell_size = cell_size
                .or(config.tessellation.cell_size)
                .ok_or(Error::NoCellSize)?;
            let tessellation = HexTessellation::covering(bbox, cell_size)?;
            output::write_cells(create(&path)?, &tessellation)?;
            tracing::info!(cells = tessellation.len(), path = %path.display(), "wrote tessellation");
        }
        Command::Align {
            layout,
            cells,
            output: path,
            geojson,
            unmatched,
            cell_size,
            row_band_min,
            row_band_max,
        } => {
            if let (Some(min), Some(max)) = (row_band_min, row_band_max) {
                config.align.row_band = Some(RowBand { min, max });
            }
            let (layout, tessellation, alignment) = align(&config, &layout, &cells, cell_size)?;

            output::write_mapping(create(&path)?, &tessellation, &alignment)?;
            tracing::info!(matches = alignment.matches.len(), path = %path.display(), "wrote mapping");
            if let Some(geojson) = geojson {
                output::write_geojson(create(&geojson)?, &layout, &tessellation, &alignment)?;
            }
            if let Some(unmatched) = unmatched {
                output::write_unmatched(create(&unmatched)?, &alignment)?;
            }
        }
        Command::Risk {
            crashes,
            exposure,
            output: path,
            ksi,
            iterations,
            seed,
        } => {
            let mut bootstrap = config.bootstrap.clone();
            bootstrap.ksi_only |= ksi;
            if let Some(iterations) = iterations {
                bootstrap.iterations = iterations;
            }
            if let Some(seed) = seed {
                bootstrap.seed = seed;
            }
            let records = rate::load_crashes(&crashes)?;
            let exposure = rate::Exposure::load(&exposure)?;
            let report = rate::risk_ratios(&records, &exposure, &bootstrap)?;
            output::write_risk_ratios(create(&path)?, &report.estimates)?;
            tracing::info!(
                units = report.estimates.len(),
                unmatched_records = report.unmatched_records,
                filtered_records = report.filtered_records,
                path = %path.display(),
                "wrote risk ratios"
            );
        }
        Command::Render {
            layout,
            cells,
            risk,
            output: path,
            cell_size,
            labels,
        } => {
            let (layout, tessellation, alignment) = align(&config, &layout, &cells, cell_size)?;
            let estimates = rate::load_estimates(&risk)?;
            let style = render::Style {
                labels: labels || config.style.labels,
                ..config.style.clone()
            };
            let svg = render::render_svg(&layout, &tessellation, &alignment, &estimates, &style)?;
            std::fs::write(&path, svg).map_err(|source| Error::Create {
                path: path.clone(),
                source,
            })?;
            tracing::info!(path = %path.display(), "wrote cartogram");
        }
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(err) = run(args) {
        eprintln!("Error: {}", err);
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        process::exit(1);
    }
}
