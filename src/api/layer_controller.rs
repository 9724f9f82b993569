use tracing::debug;

use crate::core::timer::TimestampMs;
use crate::error::MapResult;
use crate::render::{RenderProfile, Renderer};

use super::viewport_controller::RenderMode;
use super::{MapEngine, MapEvent};

impl<R: Renderer> MapEngine<R> {
    /// Switches between discrete markers and the density surface.
    pub fn set_render_mode(&mut self, mode: RenderMode, now_ms: TimestampMs) -> bool {
        self.observe_clock(now_ms);
        let rebuilds = self.controller.rebuild_count();
        if !self
            .controller
            .set_mode(mode, &self.point_set, &self.camera, now_ms)
        {
            return false;
        }
        debug!(?mode, "render mode changed");
        self.emit_plugin_event(MapEvent::RenderModeChanged { mode });
        self.emit_layer_rebuilt_since(rebuilds);
        true
    }

    pub fn toggle_render_mode(&mut self, now_ms: TimestampMs) -> RenderMode {
        let mode = self.render_mode().toggled();
        self.set_render_mode(mode, now_ms);
        mode
    }

    pub fn set_render_profile(&mut self, profile: RenderProfile, now_ms: TimestampMs) -> bool {
        self.observe_clock(now_ms);
        let rebuilds = self.controller.rebuild_count();
        if !self
            .controller
            .set_profile(profile, &self.point_set, &self.camera, now_ms)
        {
            return false;
        }
        self.emit_plugin_event(MapEvent::RenderProfileChanged { profile });
        self.emit_layer_rebuilt_since(rebuilds);
        true
    }

    /// Selects a profile by its key; unknown keys are an error, never defaulted.
    pub fn set_render_profile_key(&mut self, key: &str, now_ms: TimestampMs) -> MapResult<bool> {
        let profile: RenderProfile = key.parse()?;
        Ok(self.set_render_profile(profile, now_ms))
    }
}
