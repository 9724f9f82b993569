use serde::{Deserialize, Serialize};

use crate::core::projection::MapViewport;
use crate::error::{MapError, MapResult};
use crate::interaction::InteractionMode;
use crate::render::{MapLayer, RenderProfile, Renderer};

use super::engine::DataStatus;
use super::playback::TimelineState;
use super::viewport_controller::RenderMode;
use super::MapEngine;

/// Serializable deterministic state snapshot used by regression tests and
/// debugging tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub camera: MapViewport,
    pub timeline: TimelineState,
    pub timeline_progress: f64,
    pub render_mode: RenderMode,
    pub render_profile: RenderProfile,
    pub data_status: DataStatus,
    pub category_filter: Option<String>,
    pub point_count: usize,
    pub layer: LayerSummary,
    pub interaction_mode: InteractionMode,
}

/// Compact description of the visible layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LayerSummary {
    None,
    Markers { clusters: usize, leaves: usize },
    Density { cells: usize, opacity: f64 },
}

impl<R: Renderer> MapEngine<R> {
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        let layer = match self.controller.visible_layer() {
            None => LayerSummary::None,
            Some(MapLayer::Markers(markers)) => LayerSummary::Markers {
                clusters: markers.cluster_count(),
                leaves: markers.leaf_count(),
            },
            Some(MapLayer::Density(density)) => LayerSummary::Density {
                cells: density.cell_count,
                opacity: density.opacity,
            },
        };
        EngineSnapshot {
            camera: self.camera,
            timeline: self.playback.state(),
            timeline_progress: self.timeline_progress(),
            render_mode: self.controller.mode(),
            render_profile: self.controller.profile(),
            data_status: self.data_status,
            category_filter: self.category_filter.clone(),
            point_count: self.point_set.len(),
            layer,
            interaction_mode: self.interaction.mode(),
        }
    }

    pub fn snapshot_json_pretty(&self) -> MapResult<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| MapError::InvalidData(format!("failed to serialize snapshot: {e}")))
    }
}
