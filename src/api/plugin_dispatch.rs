use crate::extensions::PluginContext;
use crate::render::Renderer;

use super::{MapEngine, MapEvent};

impl<R: Renderer> MapEngine<R> {
    #[must_use]
    pub fn plugin_context(&self) -> PluginContext {
        PluginContext {
            camera: self.camera,
            year: self.year(),
            is_playing: self.playback.is_playing(),
            render_mode: self.controller.mode(),
            render_profile: self.controller.profile(),
            point_count: self.point_set.len(),
            data_status: self.data_status,
            interaction_mode: self.interaction.mode(),
        }
    }

    pub(super) fn emit_plugin_event(&mut self, event: MapEvent) {
        let context = self.plugin_context();
        for plugin in &mut self.plugins {
            plugin.on_event(event, context);
        }
    }

    /// Emits `LayerRebuilt` when the layer controller rebuilt after `before`.
    pub(super) fn emit_layer_rebuilt_since(&mut self, before: u64) {
        if self.controller.rebuild_count() == before {
            return;
        }
        if let Some(reason) = self.controller.last_rebuild() {
            self.emit_plugin_event(MapEvent::LayerRebuilt { reason });
        }
    }
}
