use crate::error::MapResult;
use crate::render::{MapLayer, RenderFrame, Renderer};

/// No-op renderer used by tests and headless engine usage.
///
/// It still validates frame content so tests can catch invalid geometry before
/// a real backend is introduced.
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub frames_rendered: usize,
    pub last_marker_count: usize,
    pub last_density_opacity: Option<f64>,
    pub last_overlay_shown: bool,
}

impl Renderer for NullRenderer {
    fn render(&mut self, frame: &RenderFrame) -> MapResult<()> {
        frame.validate()?;
        self.frames_rendered += 1;
        self.last_marker_count = match &frame.layer {
            Some(MapLayer::Markers(layer)) => layer.len(),
            _ => 0,
        };
        self.last_density_opacity = match &frame.layer {
            Some(MapLayer::Density(layer)) => Some(layer.opacity),
            _ => None,
        };
        self.last_overlay_shown = frame.overlay.is_some();
        Ok(())
    }
}
