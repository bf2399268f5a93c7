//! Optional `pyramid.json` describing how a pyramid was
//! rendered.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::geometry::Pyramid;
use crate::{Error, Result};

/// Name of the metadata file at a pyramid root.
pub const METADATA_FILE: &str = "pyramid.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidMetadata {
    pub projection: String,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl PyramidMetadata {
    pub fn for_geometry(geometry: &dyn Pyramid) -> Self {
        let (tile_width, tile_height) = geometry.tile_size();
        PyramidMetadata {
            projection: geometry.projection().to_owned(),
            tile_width,
            tile_height,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(Error::io(path))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Metadata {
            path: path.to_owned(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(Error::io(path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| Error::Metadata {
            path: path.to_owned(),
            source,
        })?;
        writer.flush().map_err(Error::io(path))
    }

    /// Fail if tiles described by `self` can't be mixed into
    /// `geometry`.
    pub fn check(&self, geometry: &dyn Pyramid, root: &Path) -> Result<()> {
        geometry.check_projection(&self.projection, root)?;
        let found = (self.tile_width, self.tile_height);
        let expected = geometry.tile_size();
        if found != expected {
            return Err(Error::TileSizeMismatch {
                path: root.to_owned(),
                expected,
                found,
            });
        }
        Ok(())
    }
}
