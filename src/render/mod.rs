mod density;
mod frame;
mod markers;
mod null_renderer;
pub mod palette;
mod primitives;

pub use density::{
    DensityConfig, DensityFieldRenderer, DensityLayer, FadeDirection, LayerFade, ProfileParams,
    RenderProfile,
};
pub use frame::{EmptyStateOverlay, MapLayer, NO_DATA_SUBTITLE, NO_DATA_TITLE, RenderFrame};
pub use markers::{
    BadgeTier, ClusterMarker, LeafMarker, MarkerLayer, MarkerPrimitive, abbreviate_count,
    clean_location_label, format_thousands,
};
pub use null_renderer::NullRenderer;
pub use primitives::{CirclePrimitive, Color, TextPrimitive};

use crate::error::MapResult;

/// Contract implemented by any rendering backend.
///
/// Backends receive a fully materialized, deterministic `RenderFrame` so
/// drawing code remains isolated from clustering and interaction logic.
pub trait Renderer {
    fn render(&mut self, frame: &RenderFrame) -> MapResult<()>;
}
