//! Error type shared by all stages of a merge run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::geometry::TileAddress;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("input directory {} doesn't exist", .0.display())]
    MissingInput(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("output directory {} is not empty", .0.display())]
    OutputNotEmpty(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{}: projection {found:?} doesn't match target {expected:?}", .path.display())]
    ProjectionMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("{}: tile size {found:?} doesn't match target {expected:?}", .path.display())]
    TileSizeMismatch {
        path: PathBuf,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("tile {0} is outside the pyramid")]
    OutOfBounds(TileAddress),

    #[error("tile {0} panicked: {1}")]
    Panicked(TileAddress, String),

    #[error("couldn't start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("worker pool didn't drain within {0:?}")]
    DrainTimeout(Duration),
}

impl Error {
    /// Whether the error must abort the whole run. Errors
    /// raised while processing a single tile are not fatal.
    pub fn is_fatal(&self) -> bool {
        use Error::*;
        match self {
            Io { .. } | Codec { .. } | OutOfBounds(_) | Panicked(..) => false,
            _ => true,
        }
    }

    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
        move |source| Error::Io {
            path: path.to_owned(),
            source,
        }
    }

    pub(crate) fn codec(path: &Path) -> impl FnOnce(image::ImageError) -> Error + '_ {
        move |source| Error::Codec {
            path: path.to_owned(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
