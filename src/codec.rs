//! Reading and writing tile images.

use std::ffi::OsString;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageResult, RgbImage, RgbaImage};

use crate::{Error, Result};

/// Suffix of a tile file while it is being written.
const PARTIAL_SUFFIX: &str = ".part";

/// Decodes source tiles and encodes merged tiles.
pub trait TileCodec: Send + Sync {
    /// Extension of the encoded files, without the dot.
    fn extension(&self) -> &str;

    fn decode(&self, path: &Path) -> Result<RgbaImage> {
        Ok(image::open(path).map_err(Error::codec(path))?.into_rgba8())
    }

    /// Encode `image` at `quality` (in `[0, 1]`) in memory.
    fn encode(&self, image: &RgbImage, quality: f32) -> ImageResult<Vec<u8>>;

    /// Encode `image` and write it at `path`. Nothing is left
    /// at `path` if encoding or writing fails.
    fn write(&self, image: &RgbImage, quality: f32, path: &Path) -> Result<()> {
        let bytes = self.encode(image, quality).map_err(Error::codec(path))?;
        write_replacing(path, &bytes)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JpegCodec;

impl TileCodec for JpegCodec {
    fn extension(&self) -> &str {
        "jpg"
    }

    fn encode(&self, image: &RgbImage, quality: f32) -> ImageResult<Vec<u8>> {
        let mut bytes = vec![];
        JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality)).encode_image(image)?;
        Ok(bytes)
    }
}

/// Lossless output. Ignores the quality.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngCodec;

impl TileCodec for PngCodec {
    fn extension(&self) -> &str {
        "png"
    }

    fn encode(&self, image: &RgbImage, _quality: f32) -> ImageResult<Vec<u8>> {
        let mut bytes = vec![];
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// Map a `[0, 1]` quality onto the encoder's `1..=100`.
fn jpeg_quality(quality: f32) -> u8 {
    (quality.max(0.).min(1.) * 100.).round().max(1.) as u8
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Write `bytes` next to `path` and move them into place.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    let partial = partial_path(path);
    let written = fs::write(&partial, bytes)
        .map_err(Error::io(&partial))
        .and_then(|_| fs::rename(&partial, path).map_err(Error::io(path)));
    if written.is_err() {
        let _ = fs::remove_file(&partial);
    }
    written
}
