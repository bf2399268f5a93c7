//! Spherical (web) mercator pyramid.
//!
//! Longitude splits at the arithmetic center of a sector.
//! Latitude splits at the midpoint of the projected
//! mercator `V` coordinate, so that every child is square
//! in projected pixel space.
//!
//! `V` is normalized: `0` at [`UPPER_LIMIT_DEGREES`] and `1`
//! at [`LOWER_LIMIT_DEGREES`]. Latitudes beyond the limits
//! are clamped before projecting.

use std::f64::consts::PI;
use std::path::Path;
use std::sync::Arc;

use nalgebra::Point2;

use super::{GeoSector, Geodetic, Pyramid, Resolution, Tile, TileAddress};
use crate::{Error, Result};

/// Northern latitude limit of the projection.
pub const UPPER_LIMIT_DEGREES: f64 = 85.0511287798;
/// Southern latitude limit of the projection.
pub const LOWER_LIMIT_DEGREES: f64 = -85.0511287798;

/// Projection names accepted as web mercator.
const PROJECTION_NAMES: &[&str] = &["EPSG:3857", "WGS 84 / Pseudo-Mercator", "EPSG:900913"];

/// Order in which rows are numbered at each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// Row `0` is the southernmost row (TMS convention).
    SouthToNorth,
    /// Row `0` is the northernmost row (XYZ convention).
    NorthToSouth,
}

impl Default for RowOrder {
    fn default() -> Self {
        RowOrder::SouthToNorth
    }
}

#[derive(Debug)]
pub struct WebMercatorPyramid {
    tile_width: u32,
    tile_height: u32,
    row_order: RowOrder,
    top: Arc<Tile>,
}

impl Default for WebMercatorPyramid {
    fn default() -> Self {
        WebMercatorPyramid::unchecked(256, 256, RowOrder::default())
    }
}

impl WebMercatorPyramid {
    pub fn with_tile_size(tile_width: u32, tile_height: u32, row_order: RowOrder) -> Result<Self> {
        if tile_width == 0 || tile_height == 0 {
            return Err(Error::Config(format!(
                "tile size must be non-zero: got {}x{}",
                tile_width, tile_height
            )));
        }
        Ok(WebMercatorPyramid::unchecked(tile_width, tile_height, row_order))
    }

    fn unchecked(tile_width: u32, tile_height: u32, row_order: RowOrder) -> Self {
        let top = Arc::new(Tile::new(
            TileAddress::new(0, 0, 0),
            GeoSector::full_sphere(),
            None,
        ));
        WebMercatorPyramid {
            tile_width,
            tile_height,
            row_order,
            top,
        }
    }

    #[inline]
    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }
}

/// Project a latitude (degrees) into normalized mercator
/// `V`.
pub fn mercator_v(latitude: f64) -> f64 {
    if latitude >= UPPER_LIMIT_DEGREES {
        return 0.;
    }
    if latitude <= LOWER_LIMIT_DEGREES {
        return 1.;
    }
    let sin = latitude.to_radians().sin();
    1. - (((1. + sin) / (1. - sin)).ln() / (4. * PI) + 0.5)
}

/// Inverse of [`mercator_v`].
pub fn latitude_from_v(v: f64) -> f64 {
    let exp = (-2. * PI * (0.5 - v)).exp();
    (PI / 2. - 2. * exp.atan()).to_degrees()
}

/// Latitude that halves the sector in projected space.
fn split_latitude(lower: f64, upper: f64) -> f64 {
    latitude_from_v((mercator_v(lower) + mercator_v(upper)) / 2.)
}

impl Pyramid for WebMercatorPyramid {
    fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    fn projection(&self) -> &str {
        PROJECTION_NAMES[0]
    }

    fn check_projection(&self, projection: &str, origin: &Path) -> Result<()> {
        let projection = projection.trim();
        if PROJECTION_NAMES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(projection))
        {
            Ok(())
        } else {
            Err(Error::ProjectionMismatch {
                path: origin.to_owned(),
                expected: self.projection().to_owned(),
                found: projection.to_owned(),
            })
        }
    }

    fn top_tiles(&self) -> Vec<Arc<Tile>> {
        vec![self.top.clone()]
    }

    fn subdivide(&self, tile: &Arc<Tile>) -> [Arc<Tile>; 4] {
        let sector = tile.sector();
        let (lower, upper) = (sector.lower(), sector.upper());
        let split_lat = split_latitude(lower.latitude, upper.latitude);
        let split_lon = sector.center().longitude;

        let addr = tile.address();
        let level = addr.level + 1;
        let (south_row, north_row) = match self.row_order {
            RowOrder::SouthToNorth => (2 * addr.row, 2 * addr.row + 1),
            RowOrder::NorthToSouth => (2 * addr.row + 1, 2 * addr.row),
        };
        let (west_col, east_col) = (2 * addr.column, 2 * addr.column + 1);

        let child = |column, row, lower_lat, lower_lon, upper_lat, upper_lon| {
            Arc::new(Tile::new(
                TileAddress::new(level, column, row),
                GeoSector::new(
                    Geodetic::new(lower_lat, lower_lon),
                    Geodetic::new(upper_lat, upper_lon),
                ),
                Some(tile.clone()),
            ))
        };

        [
            child(
                west_col,
                south_row,
                lower.latitude,
                lower.longitude,
                split_lat,
                split_lon,
            ),
            child(
                east_col,
                south_row,
                lower.latitude,
                split_lon,
                split_lat,
                upper.longitude,
            ),
            child(
                west_col,
                north_row,
                split_lat,
                lower.longitude,
                upper.latitude,
                split_lon,
            ),
            child(
                east_col,
                north_row,
                split_lat,
                split_lon,
                upper.latitude,
                upper.longitude,
            ),
        ]
    }

    fn resolution_for(&self, level: u32) -> Resolution {
        let splits = (1u64 << level) as f64;
        Resolution {
            latitude: 180. / splits / self.tile_height as f64,
            longitude: 360. / splits / self.tile_width as f64,
        }
    }

    fn uv_coordinates(&self, sector: &GeoSector, point: Geodetic) -> Point2<f64> {
        let (lower, upper) = (sector.lower(), sector.upper());
        let u = (point.longitude - lower.longitude) / sector.delta_longitude();

        let top_v = mercator_v(upper.latitude);
        let bottom_v = mercator_v(lower.latitude);
        let v = (mercator_v(point.latitude) - top_v) / (bottom_v - top_v);
        Point2::new(u, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const EPS: f64 = 1e-9;

    fn pyramid() -> WebMercatorPyramid {
        WebMercatorPyramid::default()
    }

    #[test]
    fn v_round_trip() {
        assert_abs_diff_eq!(mercator_v(0.), 0.5, epsilon = EPS);
        assert_eq!(mercator_v(90.), 0.);
        assert_eq!(mercator_v(-90.), 1.);
        assert_abs_diff_eq!(latitude_from_v(0.), UPPER_LIMIT_DEGREES, epsilon = 1e-6);
        assert_abs_diff_eq!(latitude_from_v(1.), LOWER_LIMIT_DEGREES, epsilon = 1e-6);

        for &lat in &[-80., -45.5, -1., 0.25, 33.3, 66.6, 84.] {
            assert_abs_diff_eq!(latitude_from_v(mercator_v(lat)), lat, epsilon = EPS);
        }
    }

    #[test]
    fn first_split_is_equator() {
        let children = pyramid().subdivide(&pyramid().top_tiles()[0]);
        let south = children[0].sector();
        assert_abs_diff_eq!(south.upper().latitude, 0., epsilon = EPS);
        assert_eq!(south.lower().longitude, -180.);
        assert_eq!(south.upper().longitude, 0.);
        assert_eq!(children[0].address(), TileAddress::new(1, 0, 0));
        assert_eq!(children[3].address(), TileAddress::new(1, 1, 1));
    }

    /// Children of any tile are equally high in projected
    /// space and tile the parent exactly.
    #[test]
    fn children_are_square_in_v() {
        let pyramid = pyramid();
        let addresses = [
            TileAddress::new(0, 0, 0),
            TileAddress::new(1, 1, 0),
            TileAddress::new(3, 2, 1),
            TileAddress::new(5, 4, 4),
            TileAddress::new(7, 127, 127),
            TileAddress::new(12, 100, 3000),
        ];
        for &addr in &addresses {
            let tile = pyramid.tile_for(addr).expect("valid address");
            let parent = tile.sector();
            let parent_top = mercator_v(parent.upper().latitude);
            let parent_bottom = mercator_v(parent.lower().latitude);

            let children = pyramid.subdivide(&tile);
            let height = |s: &GeoSector| mercator_v(s.lower().latitude) - mercator_v(s.upper().latitude);
            let h = height(children[0].sector());
            assert_abs_diff_eq!(h, (parent_bottom - parent_top) / 2., epsilon = EPS);
            for c in &children {
                assert_abs_diff_eq!(height(c.sector()), h, epsilon = EPS);
                assert!(Arc::ptr_eq(c.parent().unwrap(), &tile));
            }

            // south pair + north pair reconstruct the parent
            let south = children[0].sector();
            let north = children[2].sector();
            assert_abs_diff_eq!(mercator_v(south.lower().latitude), parent_bottom, epsilon = EPS);
            assert_abs_diff_eq!(mercator_v(north.upper().latitude), parent_top, epsilon = EPS);
            assert_eq!(south.upper().latitude, north.lower().latitude);
            assert_eq!(children[0].sector().upper().longitude, children[1].sector().lower().longitude);
            assert_eq!(children[1].sector().upper().longitude, parent.upper().longitude);
        }
    }

    #[test]
    fn sector_for_matches_row_order() {
        let tms = pyramid();
        let xyz = WebMercatorPyramid::with_tile_size(256, 256, RowOrder::NorthToSouth).unwrap();

        let s = tms.sector_for(TileAddress::new(2, 0, 0)).unwrap();
        assert_eq!(s.lower().latitude, -90.);
        let n = xyz.sector_for(TileAddress::new(2, 0, 0)).unwrap();
        assert_eq!(n.upper().latitude, 90.);
        assert_abs_diff_eq!(n.lower().latitude, latitude_from_v(0.25), epsilon = EPS);
    }

    #[test]
    fn sector_for_out_of_range() {
        let pyramid = pyramid();
        assert!(pyramid.sector_for(TileAddress::new(0, 0, 0)).is_some());
        assert!(pyramid.sector_for(TileAddress::new(0, 1, 0)).is_none());
        assert!(pyramid.sector_for(TileAddress::new(3, 8, 0)).is_none());
        assert!(pyramid.sector_for(TileAddress::new(3, 0, 8)).is_none());
        assert!(pyramid.sector_for(TileAddress::new(3, 7, 7)).is_some());
        assert!(pyramid.sector_for(TileAddress::new(40, 0, 0)).is_none());

        assert!(pyramid.contains(TileAddress::new(30, (1 << 30) - 1, 0)));
        assert!(!pyramid.contains(TileAddress::new(30, 1 << 30, 0)));
        assert!(!pyramid.contains(TileAddress::new(31, 0, 0)));
        assert!(!pyramid.contains(TileAddress::new(2, 0, 4)));
    }

    #[test]
    fn uv_of_descendant() {
        let pyramid = pyramid();
        let ancestor = pyramid.sector_for(TileAddress::new(3, 1, 1)).unwrap();
        let tile = pyramid.sector_for(TileAddress::new(5, 4, 4)).unwrap();

        let lower = pyramid.uv_coordinates(&ancestor, tile.lower());
        let upper = pyramid.uv_coordinates(&ancestor, tile.upper());
        assert_abs_diff_eq!(lower.x, 0., epsilon = EPS);
        assert_abs_diff_eq!(upper.x, 0.25, epsilon = EPS);
        // southernmost quarter of the ancestor
        assert_abs_diff_eq!(lower.y, 1., epsilon = EPS);
        assert_abs_diff_eq!(upper.y, 0.75, epsilon = EPS);
    }

    #[test]
    fn resolution() {
        let res = pyramid().resolution_for(1);
        assert_abs_diff_eq!(res.latitude, 90. / 256., epsilon = EPS);
        assert_abs_diff_eq!(res.longitude, 180. / 256., epsilon = EPS);
    }

    #[test]
    fn projection_names() {
        let pyramid = pyramid();
        let origin = Path::new("pyramid.json");
        assert!(pyramid.check_projection("epsg:3857", origin).is_ok());
        assert!(pyramid.check_projection("WGS 84 / Pseudo-Mercator", origin).is_ok());
        match pyramid.check_projection("EPSG:4326", origin) {
            Err(Error::ProjectionMismatch { found, .. }) => assert_eq!(found, "EPSG:4326"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn zero_tile_size_rejected() {
        assert!(WebMercatorPyramid::with_tile_size(0, 256, RowOrder::SouthToNorth).is_err());
    }
}
