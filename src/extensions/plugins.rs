use serde::{Deserialize, Serialize};

use crate::api::{DataStatus, RebuildReason, RenderMode};
use crate::core::cluster_index::ClusterId;
use crate::core::projection::MapViewport;
use crate::interaction::InteractionMode;
use crate::render::RenderProfile;

/// Read-only state snapshot passed to plugin hooks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PluginContext {
    pub camera: MapViewport,
    pub year: i32,
    pub is_playing: bool,
    pub render_mode: RenderMode,
    pub render_profile: RenderProfile,
    pub point_count: usize,
    pub data_status: DataStatus,
    pub interaction_mode: InteractionMode,
}

/// Event stream exposed to plugins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MapEvent {
    PointSetReplaced { year: i32, count: usize },
    DataUnavailable { year: i32 },
    YearChanged { year: i32 },
    PlaybackChanged { is_playing: bool },
    RenderModeChanged { mode: RenderMode },
    RenderProfileChanged { profile: RenderProfile },
    LayerRebuilt { reason: RebuildReason },
    ViewportSettled { zoom: f64 },
    ClusterExpanded { cluster: ClusterId, zoom: u8 },
    /// A leaf marker was clicked; the host fetches and shows the record.
    DetailRequested { id: i64 },
    PanStarted,
    PanEnded,
    Rendered,
}

/// Extension hook interface for bounded custom logic.
///
/// Plugins can observe events and read engine context without mutating core
/// internals directly.
pub trait MapPlugin {
    fn id(&self) -> &str;
    fn on_event(&mut self, event: MapEvent, context: PluginContext);
}
