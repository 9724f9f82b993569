use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::core::types::{BoundingBox, LonLat, Viewport, ViewportQuery};
use crate::error::{MapError, MapResult};

/// Raster tile edge in pixels at zoom 0.
pub const TILE_SIZE_PX: f64 = 256.0;
/// Latitude bound of the square Web Mercator world.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Longitude to unit Web Mercator x in `[0, 1]`.
#[must_use]
pub fn lon_to_unit_x(lon: f64) -> f64 {
    lon / 360.0 + 0.5
}

/// Latitude to unit Web Mercator y in `[0, 1]` (north at 0).
#[must_use]
pub fn lat_to_unit_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    if y.is_nan() {
        return if lat > 0.0 { 0.0 } else { 1.0 };
    }
    y.clamp(0.0, 1.0)
}

#[must_use]
pub fn unit_x_to_lon(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

#[must_use]
pub fn unit_y_to_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}

/// Camera over the Web Mercator world: center, fractional zoom and surface size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapViewport {
    pub center: LonLat,
    pub zoom: f64,
    pub size: Viewport,
}

impl MapViewport {
    pub fn new(center: LonLat, zoom: f64, size: Viewport) -> MapResult<Self> {
        size.validate()?;
        if !center.is_valid() {
            return Err(MapError::InvalidData(
                "viewport center must be a valid coordinate".to_owned(),
            ));
        }
        if !zoom.is_finite() || zoom < 0.0 {
            return Err(MapError::InvalidData(
                "viewport zoom must be finite and >= 0".to_owned(),
            ));
        }
        Ok(Self { center, zoom, size })
    }

    /// World edge length in pixels at the current zoom.
    #[must_use]
    pub fn world_size_px(self) -> f64 {
        TILE_SIZE_PX * 2f64.powf(self.zoom)
    }

    fn center_unit(self) -> (f64, f64) {
        (
            lon_to_unit_x(self.center.lon),
            lat_to_unit_y(self.center.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT)),
        )
    }

    /// Projects a coordinate to surface pixels (origin top-left).
    #[must_use]
    pub fn project(self, position: LonLat) -> (f64, f64) {
        let world = self.world_size_px();
        let (cx, cy) = self.center_unit();
        let x = (lon_to_unit_x(position.lon) - cx) * world + f64::from(self.size.width) / 2.0;
        let y = (lat_to_unit_y(position.lat) - cy) * world + f64::from(self.size.height) / 2.0;
        (x, y)
    }

    /// Inverse of [`MapViewport::project`]. Latitude is clamped to the Mercator world.
    #[must_use]
    pub fn unproject(self, x: f64, y: f64) -> LonLat {
        let world = self.world_size_px();
        let (cx, cy) = self.center_unit();
        let unit_x = cx + (x - f64::from(self.size.width) / 2.0) / world;
        let unit_y = (cy + (y - f64::from(self.size.height) / 2.0) / world).clamp(0.0, 1.0);
        LonLat::new(unit_x_to_lon(unit_x), unit_y_to_lat(unit_y))
    }

    /// Visible geographic box. Longitudes are left unwrapped so a zoomed-out
    /// camera can span more than one world.
    #[must_use]
    pub fn bounding_box(self) -> BoundingBox {
        let north_west = self.unproject(0.0, 0.0);
        let south_east = self.unproject(
            f64::from(self.size.width),
            f64::from(self.size.height),
        );
        BoundingBox::new(
            north_west.lon,
            south_east.lat,
            south_east.lon,
            north_west.lat,
        )
    }

    /// Cluster query for this camera, zoom floored to an integer level.
    #[must_use]
    pub fn query(self) -> ViewportQuery {
        let zoom = self.zoom.floor().clamp(0.0, f64::from(u8::MAX)) as u8;
        ViewportQuery::new(self.bounding_box(), zoom)
    }

    /// Returns a camera shifted by a pixel delta (content follows the pointer).
    #[must_use]
    pub fn panned_by_pixels(self, dx: f64, dy: f64) -> Self {
        let world = self.world_size_px();
        let (cx, cy) = self.center_unit();
        let unit_x = cx - dx / world;
        let unit_y = (cy - dy / world).clamp(0.0, 1.0);
        let lon = crate::core::types::normalize_lon(unit_x_to_lon(unit_x));
        let lat = unit_y_to_lat(unit_y).clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        Self {
            center: LonLat::new(lon, lat),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::{MapViewport, lat_to_unit_y, lon_to_unit_x, unit_x_to_lon, unit_y_to_lat};
    use crate::core::types::{LonLat, Viewport};

    #[test]
    fn unit_mercator_round_trip() {
        for (lon, lat) in [(-75.0, 40.0), (0.0, 0.0), (139.7, 35.6), (-179.0, -60.0)] {
            assert_abs_diff_eq!(unit_x_to_lon(lon_to_unit_x(lon)), lon, epsilon = 1e-9);
            assert_abs_diff_eq!(unit_y_to_lat(lat_to_unit_y(lat)), lat, epsilon = 1e-9);
        }
    }

    #[test]
    fn poles_clamp_to_unit_square() {
        assert_eq!(lat_to_unit_y(90.0), 0.0);
        assert_eq!(lat_to_unit_y(-90.0), 1.0);
    }

    #[test]
    fn center_projects_to_surface_middle() {
        let viewport =
            MapViewport::new(LonLat::new(-75.0, 40.0), 6.0, Viewport::new(800, 600)).expect("vp");
        let (x, y) = viewport.project(LonLat::new(-75.0, 40.0));
        assert_abs_diff_eq!(x, 400.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 300.0, epsilon = 1e-6);

        let back = viewport.unproject(x, y);
        assert_abs_diff_eq!(back.lon, -75.0, epsilon = 1e-9);
        assert_abs_diff_eq!(back.lat, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn bounding_box_surrounds_center() {
        let viewport =
            MapViewport::new(LonLat::new(10.0, 20.0), 4.0, Viewport::new(1024, 768)).expect("vp");
        let bbox = viewport.bounding_box();
        assert!(bbox.west < 10.0 && bbox.east > 10.0);
        assert!(bbox.south < 20.0 && bbox.north > 20.0);
        assert_eq!(viewport.query().zoom, 4);
    }

    #[test]
    fn pan_moves_center_against_drag_direction() {
        let viewport =
            MapViewport::new(LonLat::new(0.0, 0.0), 3.0, Viewport::new(800, 600)).expect("vp");
        let panned = viewport.panned_by_pixels(100.0, 0.0);
        assert!(panned.center.lon < 0.0);
        assert_abs_diff_eq!(panned.center.lat, 0.0, epsilon = 1e-9);
    }
}
