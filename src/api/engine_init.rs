use tracing::debug;

use crate::core::projection::MapViewport;
use crate::core::timeline::TimelineMapper;
use crate::error::MapResult;
use crate::interaction::{InteractionState, SettleDebouncer};
use crate::render::Renderer;

use super::engine::DataStatus;
use super::playback::PlaybackScheduler;
use super::point_set::ActivePointSet;
use super::viewport_controller::ViewportRenderController;
use super::{MapEngine, MapEngineConfig};

impl<R: Renderer> MapEngine<R> {
    /// Creates an engine with an empty point set at the configured year.
    ///
    /// Attach a source with [`MapEngine::set_point_source`] or push points
    /// with [`MapEngine::set_points`] to populate it.
    pub fn new(renderer: R, config: MapEngineConfig) -> MapResult<Self> {
        config.validate()?;

        let camera = MapViewport::new(config.center, config.zoom, config.viewport)?;
        let timeline = TimelineMapper::new(config.timeline_anchors.clone())?;
        let playback = PlaybackScheduler::new(config.playback, config.year);
        let controller = ViewportRenderController::new(
            config.render_mode,
            config.render_profile,
            config.density,
            config.max_zoom.floor() as u8,
        );
        let point_set = ActivePointSet::empty(config.year, config.cluster)?;

        debug!(
            width = config.viewport.width,
            height = config.viewport.height,
            zoom = config.zoom,
            year = config.year,
            mode = ?config.render_mode,
            "map engine initialized"
        );

        Ok(Self {
            renderer,
            camera,
            timeline,
            playback,
            controller,
            settle: SettleDebouncer::new(config.settle_delay_ms),
            interaction: InteractionState::default(),
            point_set,
            data_status: DataStatus::NoData,
            category_filter: None,
            source: None,
            plugins: Vec::new(),
            now_ms: 0,
            config,
        })
    }
}
