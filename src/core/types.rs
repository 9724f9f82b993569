use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

/// Pixel size of the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn validate(self) -> MapResult<Self> {
        if !self.is_valid() {
            return Err(MapError::InvalidViewport {
                width: self.width,
                height: self.height,
            });
        }
        Ok(self)
    }
}

/// Geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// One geolocated event record of the active point set.
///
/// Wire aliases match the point-set endpoint (`latitude`, `longitude`,
/// `shape`, `occurred`, `location`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub id: i64,
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude")]
    pub lon: f64,
    #[serde(default, alias = "shape")]
    pub category: Option<String>,
    #[serde(default, alias = "occurred")]
    pub timestamp: Option<String>,
    #[serde(default, alias = "location")]
    pub location_label: Option<String>,
}

impl GeoPoint {
    #[must_use]
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            lat,
            lon,
            category: None,
            timestamp: None,
            location_label: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    #[must_use]
    pub fn with_location_label(mut self, label: impl Into<String>) -> Self {
        self.location_label = Some(label.into());
        self
    }

    #[must_use]
    pub fn position(&self) -> LonLat {
        LonLat::new(self.lon, self.lat)
    }

    /// `true` when the coordinate is finite and inside the geographic range.
    #[must_use]
    pub fn has_valid_geometry(&self) -> bool {
        self.position().is_valid()
    }
}

/// Geographic box as `[west, south, east, north]`.
///
/// `west > east` describes a box crossing the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    #[must_use]
    pub const fn world() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }

    pub fn validate(self) -> MapResult<Self> {
        if ![self.west, self.south, self.east, self.north]
            .iter()
            .all(|value| value.is_finite())
        {
            return Err(MapError::InvalidData(
                "bounding box edges must be finite".to_owned(),
            ));
        }
        if self.south > self.north {
            return Err(MapError::InvalidData(
                "bounding box south edge must be <= north edge".to_owned(),
            ));
        }
        Ok(self)
    }

    /// Inclusive containment, honoring antimeridian-crossing boxes.
    #[must_use]
    pub fn contains(self, position: LonLat) -> bool {
        if position.lat < self.south || position.lat > self.north {
            return false;
        }
        if self.east - self.west >= 360.0 {
            return true;
        }
        let west = normalize_lon(self.west);
        let east = normalize_lon(self.east);
        let lon = normalize_lon(position.lon);
        if west <= east {
            lon >= west && lon <= east
        } else {
            lon >= west || lon <= east
        }
    }
}

/// Wraps a longitude into `[-180, 180)`.
#[must_use]
pub fn normalize_lon(lon: f64) -> f64 {
    let wrapped = ((lon + 180.0) % 360.0 + 360.0) % 360.0 - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Cluster lookup issued for each settled viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportQuery {
    pub bbox: BoundingBox,
    pub zoom: u8,
}

impl ViewportQuery {
    #[must_use]
    pub const fn new(bbox: BoundingBox, zoom: u8) -> Self {
        Self { bbox, zoom }
    }
}
