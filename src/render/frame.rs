use serde::Serialize;

use crate::core::projection::MapViewport;
use crate::error::{MapError, MapResult};
use crate::render::{DensityLayer, MarkerLayer};

pub const NO_DATA_TITLE: &str = "NO SIGNALS DETECTED";
pub const NO_DATA_SUBTITLE: &str = "No recorded events for this year";

/// The single materialized layer of a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MapLayer {
    Markers(MarkerLayer),
    Density(DensityLayer),
}

impl MapLayer {
    pub fn validate(&self) -> MapResult<()> {
        match self {
            Self::Markers(layer) => layer.validate(),
            Self::Density(layer) => layer.validate(),
        }
    }

    #[must_use]
    pub fn is_density(&self) -> bool {
        matches!(self, Self::Density(_))
    }
}

/// Overlay shown when the active point set is empty or unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyStateOverlay {
    pub title: String,
    pub subtitle: String,
}

impl Default for EmptyStateOverlay {
    fn default() -> Self {
        Self {
            title: NO_DATA_TITLE.to_owned(),
            subtitle: NO_DATA_SUBTITLE.to_owned(),
        }
    }
}

/// Backend-agnostic scene for one map draw pass.
///
/// At most one layer is present, so marker and density content can never be
/// composited together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub camera: MapViewport,
    pub year: i32,
    pub layer: Option<MapLayer>,
    pub overlay: Option<EmptyStateOverlay>,
}

impl RenderFrame {
    #[must_use]
    pub fn new(camera: MapViewport, year: i32) -> Self {
        Self {
            camera,
            year,
            layer: None,
            overlay: None,
        }
    }

    #[must_use]
    pub fn with_layer(mut self, layer: MapLayer) -> Self {
        self.layer = Some(layer);
        self
    }

    #[must_use]
    pub fn with_overlay(mut self, overlay: EmptyStateOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn validate(&self) -> MapResult<()> {
        let size = self.camera.size;
        if !size.is_valid() {
            return Err(MapError::InvalidViewport {
                width: size.width,
                height: size.height,
            });
        }
        if let Some(MapLayer::Density(layer)) = &self.layer {
            if layer.width != size.width || layer.height != size.height {
                return Err(MapError::InvalidData(
                    "density raster does not match the surface size".to_owned(),
                ));
            }
        }
        match &self.layer {
            Some(layer) => layer.validate(),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layer.is_none()
    }
}
