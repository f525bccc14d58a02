use crate::{align::AlignConfig, rate::BootstrapConfig, render::Style};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the configuration file.
///
/// `None` if the platform has no configuration directory.
pub fn path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("hexcarto").join("config.toml"))
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub align: AlignConfig,
    pub tessellation: TessellationConfig,
    pub bootstrap: BootstrapConfig,
    pub style: Style,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationConfig {
    /// Flat-to-flat width of each hexagon, in the planar units of the input.
    ///
    /// Needed to rebuild polygons for tessellations loaded from centroids alone.
    pub cell_size: Option<f64>,
}

impl Config {
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let serialized = toml::to_string_pretty(self)?;
        std::fs::write(path, serialized.as_bytes()).map_err(Into::into)
    }

    /// Load configuration from `path`.
    ///
    /// A missing file is not an error; it yields the default configuration.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no configuration file; using defaults");
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        toml::from_str(&data).map_err(Into::into)
    }

    /// Load from `explicit` if given, otherwise from the default [`path`].
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, Error> {
        match explicit.map(Path::to_owned).or_else(path) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration could not be loaded")]
    CouldNotLoad(#[from] std::io::Error),
    #[error("malformed configuration")]
    Malformed(#[from] toml::de::Error),
    #[error("failed to serialize")]
    CouldNotSerialize(#[from] toml::ser::Error),
}
