use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::projection::MapViewport;
use crate::core::timer::TimestampMs;
use crate::error::MapResult;
use crate::render::Renderer;

use super::{MapEngine, MapEvent};

/// What changed during one [`MapEngine::advance_to`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockAdvance {
    pub camera_moved: bool,
    pub layer_changed: bool,
    pub settled: bool,
    pub year_changed: bool,
}

impl ClockAdvance {
    /// `true` when the host should draw a new frame.
    #[must_use]
    pub fn needs_redraw(self) -> bool {
        self.camera_moved || self.layer_changed || self.settled || self.year_changed
    }
}

impl<R: Renderer> MapEngine<R> {
    /// Runs every timer due at `now_ms`.
    ///
    /// Order per call: camera flight, layer fades, viewport settle, playback.
    pub fn advance_to(&mut self, now_ms: TimestampMs) -> MapResult<ClockAdvance> {
        self.observe_clock(now_ms);
        let now_ms = self.now_ms;
        let mut advance = ClockAdvance::default();

        if let Some(step) = self.interaction.step_flight(now_ms) {
            self.camera = MapViewport::new(
                step.center,
                step.zoom,
                self.camera.size,
            )?;
            // Rebuilds wait for the flight to land.
            if step.finished {
                self.settle.notify(now_ms);
            } else {
                self.settle.cancel();
            }
            advance.camera_moved = true;
        }

        let rebuilds = self.controller.rebuild_count();
        advance.layer_changed =
            self.controller
                .advance_to(&self.point_set, &self.camera, now_ms);
        self.emit_layer_rebuilt_since(rebuilds);

        if self.settle.poll(now_ms) {
            let rebuilds = self.controller.rebuild_count();
            self.controller
                .on_viewport_settled(&self.point_set, &self.camera, now_ms);
            self.emit_plugin_event(MapEvent::ViewportSettled {
                zoom: self.camera.zoom,
            });
            self.emit_layer_rebuilt_since(rebuilds);
            advance.settled = true;
        }

        let previous_year = self.year();
        if let Some(tick) = self.playback.advance_to(now_ms) {
            trace!(ticks = tick.ticks, year = tick.year, "playback advanced");
            self.on_year_changed(previous_year, now_ms);
            advance.year_changed = tick.year != previous_year;
        }

        Ok(advance)
    }
}
