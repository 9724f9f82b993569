use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::projection::MapViewport;
use crate::core::timeline::TimelineMapper;
use crate::core::timer::TimestampMs;
use crate::error::MapResult;
use crate::extensions::MapPlugin;
use crate::interaction::{InteractionMode, InteractionState, SettleDebouncer};
use crate::render::{EmptyStateOverlay, RenderFrame, RenderProfile, Renderer};

use super::data_source::PointSetSource;
use super::playback::{PlaybackScheduler, TimelineState};
use super::point_set::ActivePointSet;
use super::viewport_controller::{RenderMode, ViewportRenderController};
use super::{MapEngineConfig, MapEvent};

/// Load state of the active point set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataStatus {
    Ready,
    /// The source answered with no records for the active year/filter.
    NoData,
    /// The source failed; an empty set is shown instead.
    Unavailable,
}

/// Main orchestration facade consumed by host applications.
///
/// `MapEngine` coordinates the camera, the active point set and its cluster
/// index, the layer state machine, timeline playback and renderer calls.
/// Every time-dependent call takes the host's monotonic clock in milliseconds.
pub struct MapEngine<R: Renderer> {
    pub(super) renderer: R,
    pub(super) config: MapEngineConfig,
    pub(super) camera: MapViewport,
    pub(super) timeline: TimelineMapper,
    pub(super) playback: PlaybackScheduler,
    pub(super) controller: ViewportRenderController,
    pub(super) settle: SettleDebouncer,
    pub(super) interaction: InteractionState,
    pub(super) point_set: ActivePointSet,
    pub(super) data_status: DataStatus,
    pub(super) category_filter: Option<String>,
    pub(super) source: Option<Box<dyn PointSetSource>>,
    pub(super) plugins: Vec<Box<dyn MapPlugin>>,
    pub(super) now_ms: TimestampMs,
}

impl<R: Renderer> MapEngine<R> {
    #[must_use]
    pub fn config(&self) -> &MapEngineConfig {
        &self.config
    }

    #[must_use]
    pub fn camera(&self) -> MapViewport {
        self.camera
    }

    #[must_use]
    pub fn timeline(&self) -> &TimelineMapper {
        &self.timeline
    }

    #[must_use]
    pub fn timeline_state(&self) -> TimelineState {
        self.playback.state()
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.playback.year()
    }

    #[must_use]
    pub fn render_mode(&self) -> RenderMode {
        self.controller.mode()
    }

    #[must_use]
    pub fn render_profile(&self) -> RenderProfile {
        self.controller.profile()
    }

    #[must_use]
    pub fn layer_controller(&self) -> &ViewportRenderController {
        &self.controller
    }

    #[must_use]
    pub fn point_set(&self) -> &ActivePointSet {
        &self.point_set
    }

    #[must_use]
    pub fn data_status(&self) -> DataStatus {
        self.data_status
    }

    #[must_use]
    pub fn category_filter(&self) -> Option<&str> {
        self.category_filter.as_deref()
    }

    #[must_use]
    pub fn interaction_mode(&self) -> InteractionMode {
        self.interaction.mode()
    }

    /// `true` while a viewport change is waiting for its settle deadline.
    #[must_use]
    pub fn settle_pending(&self) -> bool {
        self.settle.is_pending()
    }

    /// Last clock value the engine has observed.
    #[must_use]
    pub fn now_ms(&self) -> TimestampMs {
        self.now_ms
    }

    /// Builds the frame for the current state without drawing it.
    #[must_use]
    pub fn build_frame(&self) -> RenderFrame {
        let mut frame = RenderFrame::new(self.camera, self.year());
        if let Some(layer) = self.controller.visible_layer() {
            frame = frame.with_layer(layer);
        }
        if self.data_status != DataStatus::Ready {
            frame = frame.with_overlay(EmptyStateOverlay::default());
        }
        frame
    }

    pub fn render(&mut self) -> MapResult<()> {
        let frame = self.build_frame();
        trace!(
            has_layer = frame.layer.is_some(),
            overlay = frame.overlay.is_some(),
            "render frame"
        );
        self.renderer.render(&frame)?;
        self.emit_plugin_event(MapEvent::Rendered);
        Ok(())
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    #[must_use]
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    pub(super) fn observe_clock(&mut self, now_ms: TimestampMs) {
        self.now_ms = self.now_ms.max(now_ms);
    }
}
