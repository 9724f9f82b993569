use tracing::debug;

use crate::core::projection::MapViewport;
use crate::core::timer::TimestampMs;
use crate::core::types::{LonLat, Viewport};
use crate::error::{MapError, MapResult};
use crate::interaction::FlyTo;
use crate::render::Renderer;

use super::viewport_controller::ClickOutcome;
use super::{MapEngine, MapEvent};

impl<R: Renderer> MapEngine<R> {
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.interaction.on_pointer_move(x, y);
    }

    pub fn pan_start(&mut self) {
        self.interaction.on_pan_start();
        self.emit_plugin_event(MapEvent::PanStarted);
    }

    /// Drags the map by a pixel delta.
    pub fn pan_by_pixels(&mut self, dx: f64, dy: f64, now_ms: TimestampMs) {
        if !dx.is_finite() || !dy.is_finite() || (dx == 0.0 && dy == 0.0) {
            return;
        }
        self.camera = self.camera.panned_by_pixels(dx, dy);
        self.camera_changed(now_ms);
    }

    pub fn pan_end(&mut self, now_ms: TimestampMs) {
        self.interaction.on_pan_end();
        self.emit_plugin_event(MapEvent::PanEnded);
        self.camera_changed(now_ms);
    }

    /// Moves the camera. Zoom is clamped to the configured bounds.
    pub fn set_camera(&mut self, center: LonLat, zoom: f64, now_ms: TimestampMs) -> MapResult<()> {
        let camera = MapViewport::new(center, self.clamp_zoom(zoom)?, self.camera.size)?;
        if camera == self.camera {
            return Ok(());
        }
        self.camera = camera;
        self.camera_changed(now_ms);
        Ok(())
    }

    pub fn zoom_to(&mut self, zoom: f64, now_ms: TimestampMs) -> MapResult<()> {
        self.set_camera(self.camera.center, zoom, now_ms)
    }

    pub fn zoom_by(&mut self, delta: f64, now_ms: TimestampMs) -> MapResult<()> {
        self.zoom_to(self.camera.zoom + delta, now_ms)
    }

    /// Zooms while keeping the coordinate under `(x, y)` fixed on screen.
    pub fn zoom_around_pixel(
        &mut self,
        delta: f64,
        x: f64,
        y: f64,
        now_ms: TimestampMs,
    ) -> MapResult<()> {
        let anchor = self.camera.unproject(x, y);
        let zoom = self.clamp_zoom(self.camera.zoom + delta)?;
        let zoomed = MapViewport::new(self.camera.center, zoom, self.camera.size)?;
        let (ax, ay) = zoomed.project(anchor);
        let camera = zoomed.panned_by_pixels(x - ax, y - ay);
        if camera == self.camera {
            return Ok(());
        }
        self.camera = camera;
        self.camera_changed(now_ms);
        Ok(())
    }

    /// Resizes the drawing surface and redraws the visible layer at the new size.
    pub fn resize(&mut self, size: Viewport, now_ms: TimestampMs) -> MapResult<()> {
        let size = size.validate()?;
        if size == self.camera.size {
            return Ok(());
        }
        self.camera = MapViewport::new(self.camera.center, self.camera.zoom, size)?;
        self.config.viewport = size;
        self.observe_clock(now_ms);
        let rebuilds = self.controller.rebuild_count();
        self.controller
            .on_surface_resized(&self.point_set, &self.camera, now_ms);
        self.emit_layer_rebuilt_since(rebuilds);
        self.camera_changed(now_ms);
        Ok(())
    }

    /// Animates the camera to `center` at `zoom` over the configured duration.
    pub fn fly_to(&mut self, center: LonLat, zoom: f64, now_ms: TimestampMs) -> MapResult<()> {
        if !center.is_valid() {
            return Err(MapError::InvalidData(
                "flight target must be a valid coordinate".to_owned(),
            ));
        }
        self.observe_clock(now_ms);
        let flight = FlyTo {
            from_center: self.camera.center,
            from_zoom: self.camera.zoom,
            to_center: center,
            to_zoom: self.clamp_zoom(zoom)?,
            started_at_ms: now_ms,
            duration_ms: self.config.flight_duration_ms,
        };
        self.settle.cancel();
        self.interaction.start_flight(flight);
        debug!(lon = center.lon, lat = center.lat, zoom = flight.to_zoom, "camera flight started");
        Ok(())
    }

    /// Handles a click on the map surface.
    ///
    /// Clusters fly to their expansion zoom; leaves request the detail view.
    /// Clicks hit nothing while the density surface is shown.
    pub fn click(&mut self, x: f64, y: f64, now_ms: TimestampMs) -> MapResult<Option<ClickOutcome>> {
        self.observe_clock(now_ms);
        let Some(outcome) = self.controller.click(x, y) else {
            return Ok(None);
        };
        match outcome {
            ClickOutcome::ExpandCluster {
                cluster,
                center,
                zoom,
            } => {
                self.fly_to(center, f64::from(zoom), now_ms)?;
                self.emit_plugin_event(MapEvent::ClusterExpanded { cluster, zoom });
            }
            ClickOutcome::SelectRecord { id } => {
                self.emit_plugin_event(MapEvent::DetailRequested { id });
            }
        }
        Ok(Some(outcome))
    }

    pub(super) fn camera_changed(&mut self, now_ms: TimestampMs) {
        self.observe_clock(now_ms);
        self.settle.notify(now_ms);
    }

    fn clamp_zoom(&self, zoom: f64) -> MapResult<f64> {
        if !zoom.is_finite() {
            return Err(MapError::InvalidData("zoom must be finite".to_owned()));
        }
        Ok(zoom.clamp(self.config.min_zoom, self.config.max_zoom))
    }
}
