//! Quad-tree geometry of a tile pyramid.
//!
//! A pyramid starts from one or more top tiles at level `0`
//! and each tile splits into four children at the next
//! level. How a sector is split, and how geographic points
//! map into a tile's pixel frame, is decided by the
//! implementation of [`Pyramid`]; see
//! [`WebMercatorPyramid`] for the spherical mercator
//! pyramid.
//!
//! The tree is never materialized. Tiles are produced on
//! demand by descending from a top tile, so only the path
//! to the requested address is ever computed.

use std::fmt;
use std::sync::Arc;

use geo::Rect;
use nalgebra::Point2;

use crate::Result;

mod web_mercator;
pub use web_mercator::{RowOrder, WebMercatorPyramid};

/// Deepest level any pyramid may address. Keeps row and
/// column indices within `u32`.
pub const MAX_LEVEL: u32 = 30;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodetic {
    pub latitude: f64,
    pub longitude: f64,
}

impl Geodetic {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Geodetic {
            latitude,
            longitude,
        }
    }
}

/// A rectangular region in geographic coordinates. Stored
/// as a [`Rect`] with longitude along `x` and latitude
/// along `y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoSector(Rect<f64>);

impl GeoSector {
    pub fn new(lower: Geodetic, upper: Geodetic) -> Self {
        GeoSector(Rect::new(
            (lower.longitude, lower.latitude),
            (upper.longitude, upper.latitude),
        ))
    }

    pub fn full_sphere() -> Self {
        GeoSector::new(Geodetic::new(-90., -180.), Geodetic::new(90., 180.))
    }

    /// South-west corner.
    #[inline]
    pub fn lower(&self) -> Geodetic {
        let min = self.0.min();
        Geodetic::new(min.y, min.x)
    }

    /// North-east corner.
    #[inline]
    pub fn upper(&self) -> Geodetic {
        let max = self.0.max();
        Geodetic::new(max.y, max.x)
    }

    #[inline]
    pub fn center(&self) -> Geodetic {
        let c = self.0.center();
        Geodetic::new(c.y, c.x)
    }

    #[inline]
    pub fn delta_latitude(&self) -> f64 {
        self.0.height()
    }

    #[inline]
    pub fn delta_longitude(&self) -> f64 {
        self.0.width()
    }
}

/// Address of a node in a pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileAddress {
    pub level: u32,
    pub column: u32,
    pub row: u32,
}

impl TileAddress {
    pub fn new(level: u32, column: u32, row: u32) -> Self {
        TileAddress { level, column, row }
    }

    /// The address of the tile at `level` containing this
    /// one, or `None` if `level` is deeper than `self`.
    pub fn ancestor_at(&self, level: u32) -> Option<TileAddress> {
        if level > self.level {
            return None;
        }
        let shift = self.level - level;
        Some(TileAddress::new(
            level,
            self.column.checked_shr(shift).unwrap_or(0),
            self.row.checked_shr(shift).unwrap_or(0),
        ))
    }

    pub fn parent(&self) -> Option<TileAddress> {
        self.level.checked_sub(1).and_then(|l| self.ancestor_at(l))
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.column, self.row)
    }
}

/// A node of the pyramid: its address, the sector it
/// covers and the tile it was subdivided from.
#[derive(Debug)]
pub struct Tile {
    address: TileAddress,
    sector: GeoSector,
    parent: Option<Arc<Tile>>,
}

impl Tile {
    pub fn new(address: TileAddress, sector: GeoSector, parent: Option<Arc<Tile>>) -> Self {
        Tile {
            address,
            sector,
            parent,
        }
    }

    #[inline]
    pub fn address(&self) -> TileAddress {
        self.address
    }

    #[inline]
    pub fn sector(&self) -> &GeoSector {
        &self.sector
    }

    #[inline]
    pub fn parent(&self) -> Option<&Arc<Tile>> {
        self.parent.as_ref()
    }
}

/// Angular size of one pixel at a level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub latitude: f64,
    pub longitude: f64,
}

/// Geometry of a quad-tree tile pyramid.
pub trait Pyramid: Send + Sync {
    /// Pixel dimensions `(width, height)` of every tile.
    fn tile_size(&self) -> (u32, u32);

    /// Name of the projection the tiles are rendered in.
    fn projection(&self) -> &str;

    /// Fails with [`Error::ProjectionMismatch`] if tiles
    /// stated to be in `projection` can't be mixed with
    /// this pyramid. `origin` names where the statement
    /// came from.
    ///
    /// [`Error::ProjectionMismatch`]: crate::Error::ProjectionMismatch
    fn check_projection(&self, projection: &str, origin: &std::path::Path) -> Result<()>;

    fn top_tiles(&self) -> Vec<Arc<Tile>>;

    fn number_of_rows(&self, level: u32) -> u64 {
        1u64 << level
    }

    fn number_of_columns(&self, level: u32) -> u64 {
        1u64 << level
    }

    /// Split a tile into its four children.
    fn subdivide(&self, tile: &Arc<Tile>) -> [Arc<Tile>; 4];

    fn resolution_for(&self, level: u32) -> Resolution;

    /// Map `point` into the local frame of `sector`: `u`
    /// grows eastwards from the west edge and `v` grows
    /// southwards from the north edge, so that `(u, v)`
    /// scaled by the tile size gives pixel coordinates.
    fn uv_coordinates(&self, sector: &GeoSector, point: Geodetic) -> Point2<f64>;

    /// Whether `address` is a valid tile of this pyramid.
    /// Doesn't build any tile.
    fn contains(&self, address: TileAddress) -> bool {
        let level = address.level;
        level <= MAX_LEVEL
            && u64::from(address.row) < self.number_of_rows(level)
            && u64::from(address.column) < self.number_of_columns(level)
    }

    /// Locate the tile at `address` by descending from the
    /// top tile containing it.
    fn tile_for(&self, address: TileAddress) -> Option<Arc<Tile>> {
        if !self.contains(address) {
            return None;
        }
        let level = address.level;

        let top = address.ancestor_at(0)?;
        let mut tile = self
            .top_tiles()
            .into_iter()
            .find(|t| t.address() == top)?;

        for l in 1..=level {
            let next = address.ancestor_at(l)?;
            tile = self
                .subdivide(&tile)
                .iter()
                .find(|c| c.address() == next)?
                .clone();
        }
        Some(tile)
    }

    fn sector_for(&self, address: TileAddress) -> Option<GeoSector> {
        self.tile_for(address).map(|t| *t.sector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_addresses() {
        let addr = TileAddress::new(5, 4, 4);
        assert_eq!(addr.ancestor_at(3), Some(TileAddress::new(3, 1, 1)));
        assert_eq!(addr.ancestor_at(0), Some(TileAddress::new(0, 0, 0)));
        assert_eq!(addr.ancestor_at(5), Some(addr));
        assert_eq!(addr.ancestor_at(6), None);
        assert_eq!(addr.parent(), Some(TileAddress::new(4, 2, 2)));
        assert_eq!(TileAddress::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn sector_corners() {
        let sector = GeoSector::new(Geodetic::new(-10., 20.), Geodetic::new(30., 60.));
        assert_eq!(sector.lower(), Geodetic::new(-10., 20.));
        assert_eq!(sector.upper(), Geodetic::new(30., 60.));
        assert_eq!(sector.center(), Geodetic::new(10., 40.));
        assert_eq!(sector.delta_latitude(), 40.);
        assert_eq!(sector.delta_longitude(), 40.);
    }

    #[test]
    fn address_display() {
        assert_eq!(TileAddress::new(3, 2, 1).to_string(), "3/2/1");
    }
}
