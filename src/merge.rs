//! Merge several source pyramids into one.
//!
//! The [`MergedTree`] holds one [`MergedTile`] for every
//! address at which at least one source has a tile. Each
//! merged tile is rendered independently by the
//! [`Compositor`]:
//!
//! 1. The contributing source tiles are sorted by the
//! [`Priority`] policy, so that preferred pyramids are
//! drawn last.
//!
//! 1. If every source contributes, the images are
//! alpha-blended in that order.
//!
//! 1. Otherwise, every missing source is asked for its
//! [best ancestor](SourcePyramid::best_ancestor). The
//! region of each ancestor covering the tile is stretched
//! over the canvas first and the contributing images are
//! drawn over it. Back-filling is skipped when there is no
//! ancestor, or when a single contributing image is fully
//! opaque.
//!
//! 1. The result is flattened over an opaque background
//! and encoded at `<output>/<level>/<column>/<row>.<ext>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use image::{imageops, Rgb, RgbaImage};
use log::debug;

use crate::codec::TileCodec;
use crate::exec::DirectoryGuard;
use crate::geometry::{GeoSector, Pyramid, TileAddress};
use crate::options::MergeOptions;
use crate::source::{SourcePyramid, SourceTile};
use crate::{Error, Result};

pub mod compose;
mod priority;
pub use priority::{ByInputOrder, ByMaxLevel, Priority};

use compose::{flatten, is_fully_opaque, overlay_all, stretch_over, uv_window};

/// Processing state of a merged tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        use TaskState::*;
        match v {
            0 => Pending,
            1 => Running,
            2 => Done,
            _ => Failed,
        }
    }
}

/// One output tile and the source tiles drawn into it, at
/// most one per source pyramid.
#[derive(Debug)]
pub struct MergedTile {
    address: TileAddress,
    sources: Vec<SourceTile>,
    state: AtomicU8,
}

impl MergedTile {
    fn new(first: SourceTile) -> Self {
        MergedTile {
            address: first.address(),
            sources: vec![first],
            state: AtomicU8::new(TaskState::Pending as u8),
        }
    }

    #[inline]
    pub fn address(&self) -> TileAddress {
        self.address
    }

    #[inline]
    pub fn sources(&self) -> &[SourceTile] {
        &self.sources
    }

    pub fn has_source(&self, pyramid: usize) -> bool {
        self.sources.iter().any(|s| s.pyramid() == pyramid)
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

type Columns = BTreeMap<u32, BTreeMap<u32, Arc<MergedTile>>>;

/// `level -> column -> row` map of the tiles to produce.
#[derive(Debug, Default)]
pub struct MergedTree {
    levels: BTreeMap<u32, Columns>,
    len: usize,
}

impl MergedTree {
    pub fn build(sources: &[SourcePyramid]) -> Self {
        let mut staging: BTreeMap<u32, BTreeMap<u32, BTreeMap<u32, MergedTile>>> = BTreeMap::new();
        for tile in sources.iter().flat_map(|s| s.tiles()) {
            let addr = tile.address();
            let rows = staging
                .entry(addr.level)
                .or_default()
                .entry(addr.column)
                .or_default();
            match rows.get_mut(&addr.row) {
                Some(merged) => merged.sources.push(tile.clone()),
                None => {
                    rows.insert(addr.row, MergedTile::new(tile.clone()));
                }
            }
        }

        let mut len = 0;
        let levels = staging
            .into_iter()
            .map(|(level, columns)| {
                let columns: Columns = columns
                    .into_iter()
                    .map(|(column, rows)| {
                        len += rows.len();
                        let rows: BTreeMap<_, _> =
                            rows.into_iter().map(|(r, t)| (r, Arc::new(t))).collect();
                        (column, rows)
                    })
                    .collect();
                (level, columns)
            })
            .collect();
        MergedTree { levels, len }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tile_at(&self, address: TileAddress) -> Option<&Arc<MergedTile>> {
        self.levels
            .get(&address.level)?
            .get(&address.column)?
            .get(&address.row)
    }

    /// Iterate tiles by ascending level, then column, then
    /// row.
    pub fn tiles(&self) -> impl Iterator<Item = &Arc<MergedTile>> {
        self.levels
            .values()
            .flat_map(|columns| columns.values())
            .flat_map(|rows| rows.values())
    }
}

/// How a merged tile was composited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Every source has the tile.
    FullCoverage,
    /// No missing source has an ancestor to back-fill with.
    NoAncestors,
    /// A lone fully opaque source covers the tile.
    OpaqueShortcut,
    /// Ancestors were drawn under the sources.
    Backfilled { ancestors: usize },
}

/// Output path of the tile at `address`.
pub fn output_path(root: &Path, address: TileAddress, extension: &str) -> PathBuf {
    root.join(address.level.to_string())
        .join(address.column.to_string())
        .join(format!("{}.{}", address.row, extension))
}

/// Renders and writes merged tiles. Shared read-only by all
/// workers.
pub struct Compositor {
    geometry: Arc<dyn Pyramid>,
    sources: Vec<SourcePyramid>,
    priority: Arc<dyn Priority>,
    codec: Arc<dyn TileCodec>,
    quality: f32,
    background: Rgb<u8>,
}

impl Compositor {
    pub fn new(geometry: Arc<dyn Pyramid>, sources: Vec<SourcePyramid>, options: &MergeOptions) -> Self {
        Compositor {
            geometry,
            sources,
            priority: options.priority.clone(),
            codec: options.format.codec(),
            quality: options.quality,
            background: Rgb(options.background),
        }
    }

    /// Read and write tiles with `codec` instead of the one
    /// picked by the output format.
    pub fn with_codec(mut self, codec: Arc<dyn TileCodec>) -> Self {
        self.codec = codec;
        self
    }

    #[inline]
    pub fn sources(&self) -> &[SourcePyramid] {
        &self.sources
    }

    #[inline]
    pub fn extension(&self) -> &str {
        self.codec.extension()
    }

    fn sort_by_priority(&self, tiles: &mut [&SourceTile]) {
        let sources = &self.sources;
        tiles.sort_by(|a, b| {
            self.priority
                .compare(&sources[a.pyramid()], &sources[b.pyramid()])
        });
    }

    fn decode_all(&self, tiles: &[&SourceTile]) -> Result<Vec<RgbaImage>> {
        tiles.iter().map(|t| self.codec.decode(t.image())).collect()
    }

    fn overlay_sources(&self, tiles: &[&SourceTile]) -> Result<RgbaImage> {
        let mut images = self.decode_all(tiles)?.into_iter();
        match images.next() {
            Some(first) => Ok(overlay_all(first, images)),
            None => Err(Error::Config("merged tile without sources".into())),
        }
    }

    /// Composite the image of `tile`. The result may carry
    /// transparency.
    pub fn compose(&self, tile: &MergedTile) -> Result<(RgbaImage, Decision)> {
        let mut sources: Vec<_> = tile.sources().iter().collect();
        self.sort_by_priority(&mut sources);

        if sources.len() == self.sources.len() {
            return Ok((self.overlay_sources(&sources)?, Decision::FullCoverage));
        }

        let address = tile.address();
        let mut ancestors: Vec<_> = self
            .sources
            .iter()
            .filter(|p| !tile.has_source(p.index()))
            .filter_map(|p| p.best_ancestor(address))
            .collect();
        if ancestors.is_empty() {
            return Ok((self.overlay_sources(&sources)?, Decision::NoAncestors));
        }

        let mut images = self.decode_all(&sources)?;
        if images.len() == 1 && is_fully_opaque(&images[0]) {
            return Ok((images.remove(0), Decision::OpaqueShortcut));
        }

        self.sort_by_priority(&mut ancestors);
        let sector = self
            .geometry
            .sector_for(address)
            .ok_or(Error::OutOfBounds(address))?;
        let (width, height) = images[0].dimensions();
        let mut canvas = RgbaImage::new(width, height);
        for ancestor in &ancestors {
            self.draw_ancestor(&mut canvas, &sector, ancestor)?;
        }
        for image in &images {
            imageops::overlay(&mut canvas, image, 0, 0);
        }
        Ok((
            canvas,
            Decision::Backfilled {
                ancestors: ancestors.len(),
            },
        ))
    }

    /// Stretch the part of `ancestor` covering `sector` over
    /// `canvas`.
    fn draw_ancestor(&self, canvas: &mut RgbaImage, sector: &GeoSector, ancestor: &SourceTile) -> Result<()> {
        let image = self.codec.decode(ancestor.image())?;
        let ancestor_sector = self
            .geometry
            .sector_for(ancestor.address())
            .ok_or_else(|| Error::OutOfBounds(ancestor.address()))?;

        let lower = self.geometry.uv_coordinates(&ancestor_sector, sector.lower());
        let upper = self.geometry.uv_coordinates(&ancestor_sector, sector.upper());
        let window = uv_window(lower, upper, image.dimensions());
        stretch_over(canvas, &image, window);
        Ok(())
    }

    /// Composite, flatten and write `tile` under `root`.
    /// Returns the path written.
    pub fn render(&self, tile: &MergedTile, root: &Path, dirs: &DirectoryGuard) -> Result<PathBuf> {
        let (image, decision) = self.compose(tile)?;
        debug!("tile {}: {:?}", tile.address(), decision);

        let path = output_path(root, tile.address(), self.extension());
        dirs.ensure_parent(&path)?;
        self.codec
            .write(&flatten(&image, self.background), self.quality, &path)?;
        Ok(path)
    }
}
