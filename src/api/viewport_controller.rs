use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::api::point_set::ActivePointSet;
use crate::core::cluster_index::ClusterId;
use crate::core::projection::MapViewport;
use crate::core::timer::{TimerSlot, TimestampMs};
use crate::core::types::LonLat;
use crate::render::{
    DensityConfig, DensityFieldRenderer, DensityLayer, FadeDirection, LayerFade, MapLayer,
    MarkerLayer, MarkerPrimitive, RenderProfile,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// Cluster badges and individual markers.
    #[default]
    Discrete,
    /// Continuous density surface.
    Density,
}

impl RenderMode {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Discrete => Self::Density,
            Self::Density => Self::Discrete,
        }
    }
}

/// What is currently materialized.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerState {
    Empty,
    Markers(MarkerLayer),
    Density(DensityLayer),
    /// Density layer on its way out; markers follow when the fade ends.
    FadingOut(DensityLayer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebuildReason {
    PointSetReplaced,
    ModeChanged,
    ProfileChanged,
    ViewportSettled,
    SurfaceResized,
    FadeCompleted,
}

/// Result of a click on the discrete layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClickOutcome {
    /// Fly to the cluster centroid at its expansion zoom.
    ExpandCluster {
        cluster: ClusterId,
        center: LonLat,
        zoom: u8,
    },
    /// Open the detail view for one record.
    SelectRecord { id: i64 },
}

/// Keeps exactly one of the marker or density layers materialized. Markers
/// are built only after a density fade-out has finished.
#[derive(Debug)]
pub struct ViewportRenderController {
    mode: RenderMode,
    profile: RenderProfile,
    density: DensityFieldRenderer,
    max_zoom: u8,
    state: LayerState,
    fade_timer: TimerSlot,
    last_rebuild: Option<RebuildReason>,
    rebuild_count: u64,
}

impl ViewportRenderController {
    #[must_use]
    pub fn new(
        mode: RenderMode,
        profile: RenderProfile,
        density_config: DensityConfig,
        max_zoom: u8,
    ) -> Self {
        Self {
            mode,
            profile,
            density: DensityFieldRenderer::new(density_config),
            max_zoom,
            state: LayerState::Empty,
            fade_timer: TimerSlot::new(),
            last_rebuild: None,
            rebuild_count: 0,
        }
    }

    #[must_use]
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    #[must_use]
    pub fn profile(&self) -> RenderProfile {
        self.profile
    }

    #[must_use]
    pub fn state(&self) -> &LayerState {
        &self.state
    }

    #[must_use]
    pub fn is_fading_out(&self) -> bool {
        matches!(self.state, LayerState::FadingOut(_))
    }

    #[must_use]
    pub fn last_rebuild(&self) -> Option<RebuildReason> {
        self.last_rebuild
    }

    #[must_use]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Snapshot of the single visible layer, if any.
    #[must_use]
    pub fn visible_layer(&self) -> Option<MapLayer> {
        match &self.state {
            LayerState::Empty => None,
            LayerState::Markers(layer) => Some(MapLayer::Markers(layer.clone())),
            LayerState::Density(layer) | LayerState::FadingOut(layer) => {
                Some(MapLayer::Density(layer.clone()))
            }
        }
    }

    /// Switches mode. Returns `false` when the mode is unchanged.
    pub fn set_mode(
        &mut self,
        mode: RenderMode,
        points: &ActivePointSet,
        camera: &MapViewport,
        now_ms: TimestampMs,
    ) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;

        if mode == RenderMode::Discrete {
            if let LayerState::Density(layer) = &mut self.state {
                let fade_ms = self.density.config().fade_ms;
                let mut fading = layer.clone();
                fading.begin_fade(LayerFade::new(FadeDirection::Out, now_ms, fade_ms));
                self.state = LayerState::FadingOut(fading);
                self.fade_timer.cancel();
                self.fade_timer.arm_once(now_ms, fade_ms);
                debug!(fade_ms, "density layer fading out");
                return true;
            }
        }

        self.rebuild(RebuildReason::ModeChanged, points, camera, now_ms);
        true
    }

    /// Switches the density profile; re-renders in place when in density mode.
    pub fn set_profile(
        &mut self,
        profile: RenderProfile,
        points: &ActivePointSet,
        camera: &MapViewport,
        now_ms: TimestampMs,
    ) -> bool {
        if self.profile == profile {
            return false;
        }
        self.profile = profile;
        if self.mode == RenderMode::Density {
            self.rebuild(RebuildReason::ProfileChanged, points, camera, now_ms);
        }
        true
    }

    pub fn replace_point_set(
        &mut self,
        points: &ActivePointSet,
        camera: &MapViewport,
        now_ms: TimestampMs,
    ) {
        self.rebuild(RebuildReason::PointSetReplaced, points, camera, now_ms);
    }

    pub fn on_viewport_settled(
        &mut self,
        points: &ActivePointSet,
        camera: &MapViewport,
        now_ms: TimestampMs,
    ) {
        self.rebuild(RebuildReason::ViewportSettled, points, camera, now_ms);
    }

    /// Advances fades and the fade-out timer. Returns `true` when the
    /// visible layer changed.
    pub fn advance_to(
        &mut self,
        points: &ActivePointSet,
        camera: &MapViewport,
        now_ms: TimestampMs,
    ) -> bool {
        let mut changed = false;
        match &mut self.state {
            LayerState::Density(layer) if layer.fade.is_some() => {
                layer.update_fade(now_ms);
                changed = true;
            }
            LayerState::FadingOut(layer) => {
                layer.update_fade(now_ms);
                changed = true;
            }
            _ => {}
        }

        if self.fade_timer.poll(now_ms) > 0 {
            self.rebuild(RebuildReason::FadeCompleted, points, camera, now_ms);
            changed = true;
        }
        changed
    }

    /// Hit-tests the marker layer at a surface pixel.
    #[must_use]
    pub fn click(&self, x: f64, y: f64) -> Option<ClickOutcome> {
        let LayerState::Markers(layer) = &self.state else {
            return None;
        };
        match layer.hit_test(x, y)? {
            MarkerPrimitive::Cluster(cluster) => Some(ClickOutcome::ExpandCluster {
                cluster: cluster.id,
                center: cluster.position,
                zoom: cluster.expansion_zoom.min(self.max_zoom),
            }),
            MarkerPrimitive::Leaf(leaf) => Some(ClickOutcome::SelectRecord {
                id: leaf.record_id,
            }),
        }
    }

    /// Rebuilds at the new surface size. A running fade-out keeps its ramp
    /// and its timer; only the raster is redrawn.
    pub fn on_surface_resized(
        &mut self,
        points: &ActivePointSet,
        camera: &MapViewport,
        now_ms: TimestampMs,
    ) {
        let LayerState::FadingOut(old) = &self.state else {
            self.rebuild(RebuildReason::SurfaceResized, points, camera, now_ms);
            return;
        };
        let (fade, opacity) = (old.fade, old.opacity);
        match self.density.render(points.points(), old.profile, camera, now_ms) {
            Some(mut layer) => {
                layer.fade = fade;
                layer.opacity = opacity;
                self.state = LayerState::FadingOut(layer);
                self.last_rebuild = Some(RebuildReason::SurfaceResized);
                self.rebuild_count += 1;
                debug!(
                    width = camera.size.width,
                    height = camera.size.height,
                    "fading layer redrawn at new size"
                );
            }
            None => {
                self.fade_timer.cancel();
                self.rebuild(RebuildReason::FadeCompleted, points, camera, now_ms);
            }
        }
    }

    fn rebuild(
        &mut self,
        reason: RebuildReason,
        points: &ActivePointSet,
        camera: &MapViewport,
        now_ms: TimestampMs,
    ) {
        match self.mode {
            RenderMode::Discrete => {
                if self.is_fading_out() && reason != RebuildReason::FadeCompleted {
                    trace!(?reason, "marker rebuild deferred until density fade-out ends");
                    return;
                }
                self.state = build_markers(points, camera);
            }
            RenderMode::Density => {
                self.fade_timer.cancel();
                let previous = std::mem::replace(&mut self.state, LayerState::Empty);
                let mut next = self
                    .density
                    .render(points.points(), self.profile, camera, now_ms);
                if matches!(
                    reason,
                    RebuildReason::ViewportSettled | RebuildReason::SurfaceResized
                ) {
                    if let (Some(layer), LayerState::Density(old)) = (&mut next, &previous) {
                        layer.fade = old.fade;
                        layer.opacity = old.opacity;
                    }
                }
                self.state = next.map_or(LayerState::Empty, LayerState::Density);
            }
        }

        self.last_rebuild = Some(reason);
        self.rebuild_count += 1;
        debug!(
            ?reason,
            mode = ?self.mode,
            profile = %self.profile,
            point_count = points.len(),
            "visible layer rebuilt"
        );
    }
}

fn build_markers(points: &ActivePointSet, camera: &MapViewport) -> LayerState {
    if points.index().is_empty() {
        return LayerState::Empty;
    }
    let features = points.index().query(&camera.query());
    LayerState::Markers(MarkerLayer::build(features, camera, |id| {
        points.location_label(id)
    }))
}

#[cfg(test)]
mod tests {
    use super::{ClickOutcome, LayerState, RebuildReason, RenderMode, ViewportRenderController};
    use crate::api::point_set::ActivePointSet;
    use crate::core::cluster_index::ClusterIndexConfig;
    use crate::core::projection::MapViewport;
    use crate::core::types::{GeoPoint, LonLat, Viewport};
    use crate::render::{DensityConfig, RenderProfile};

    fn camera(zoom: f64) -> MapViewport {
        MapViewport::new(LonLat::new(-75.0, 40.0), zoom, Viewport::new(640, 480)).expect("camera")
    }

    fn triad() -> ActivePointSet {
        ActivePointSet::build(
            2020,
            None,
            vec![
                GeoPoint::new(1, 40.0, -75.0),
                GeoPoint::new(2, 40.001, -75.001),
                GeoPoint::new(3, 40.002, -75.002),
            ],
            ClusterIndexConfig::default(),
        )
        .expect("points")
    }

    fn controller(mode: RenderMode) -> ViewportRenderController {
        ViewportRenderController::new(mode, RenderProfile::Density, DensityConfig::default(), 18)
    }

    #[test]
    fn discrete_mode_builds_markers_on_point_set() {
        let points = triad();
        let mut controller = controller(RenderMode::Discrete);
        controller.replace_point_set(&points, &camera(3.0), 0);
        let LayerState::Markers(layer) = controller.state() else {
            panic!("expected markers");
        };
        assert_eq!(layer.cluster_count(), 1);
        assert_eq!(
            controller.last_rebuild(),
            Some(RebuildReason::PointSetReplaced)
        );
    }

    #[test]
    fn empty_point_set_leaves_no_layer() {
        let empty = ActivePointSet::empty(2020, ClusterIndexConfig::default()).expect("empty");
        for mode in [RenderMode::Discrete, RenderMode::Density] {
            let mut controller = controller(mode);
            controller.replace_point_set(&empty, &camera(3.0), 0);
            assert_eq!(controller.state(), &LayerState::Empty);
            assert!(controller.visible_layer().is_none());
        }
    }

    #[test]
    fn malformed_only_point_set_leaves_no_layer() {
        let malformed = ActivePointSet::build(
            2020,
            None,
            vec![GeoPoint::new(1, 95.0, 0.0), GeoPoint::new(2, f64::NAN, 0.0)],
            ClusterIndexConfig::default(),
        )
        .expect("points");
        for mode in [RenderMode::Discrete, RenderMode::Density] {
            let mut controller = controller(mode);
            controller.replace_point_set(&malformed, &camera(3.0), 0);
            assert_eq!(controller.state(), &LayerState::Empty);
        }
    }

    #[test]
    fn switching_to_density_replaces_markers() {
        let points = triad();
        let view = camera(3.0);
        let mut controller = controller(RenderMode::Discrete);
        controller.replace_point_set(&points, &view, 0);
        assert!(controller.set_mode(RenderMode::Density, &points, &view, 10));
        assert!(matches!(controller.state(), LayerState::Density(_)));
        assert!(!controller.set_mode(RenderMode::Density, &points, &view, 20));
    }

    #[test]
    fn leaving_density_fades_before_markers_appear() {
        let points = triad();
        let view = camera(3.0);
        let mut controller = controller(RenderMode::Density);
        controller.replace_point_set(&points, &view, 0);
        controller.advance_to(&points, &view, 300);

        controller.set_mode(RenderMode::Discrete, &points, &view, 1_000);
        assert!(controller.is_fading_out());

        controller.on_viewport_settled(&points, &view, 1_100);
        assert!(controller.is_fading_out());

        controller.advance_to(&points, &view, 1_150);
        let LayerState::FadingOut(layer) = controller.state() else {
            panic!("expected fading density layer");
        };
        assert!((layer.opacity - 0.5).abs() < 1e-9);

        assert!(controller.advance_to(&points, &view, 1_300));
        assert!(matches!(controller.state(), LayerState::Markers(_)));
        assert_eq!(controller.last_rebuild(), Some(RebuildReason::FadeCompleted));
    }

    #[test]
    fn resize_mid_fade_redraws_raster_and_keeps_the_ramp() {
        let points = triad();
        let view = camera(3.0);
        let mut controller = controller(RenderMode::Density);
        controller.replace_point_set(&points, &view, 0);
        controller.advance_to(&points, &view, 300);
        controller.set_mode(RenderMode::Discrete, &points, &view, 1_000);
        controller.advance_to(&points, &view, 1_150);

        let wider = MapViewport::new(view.center, view.zoom, Viewport::new(1024, 768))
            .expect("camera");
        controller.on_surface_resized(&points, &wider, 1_150);
        let LayerState::FadingOut(layer) = controller.state() else {
            panic!("expected fading density layer");
        };
        assert_eq!((layer.width, layer.height), (1024, 768));
        assert!((layer.opacity - 0.5).abs() < 1e-9);
        assert_eq!(controller.last_rebuild(), Some(RebuildReason::SurfaceResized));

        assert!(controller.advance_to(&points, &wider, 1_300));
        assert!(matches!(controller.state(), LayerState::Markers(_)));
    }

    #[test]
    fn returning_to_density_mid_fade_cancels_marker_build() {
        let points = triad();
        let view = camera(3.0);
        let mut controller = controller(RenderMode::Density);
        controller.replace_point_set(&points, &view, 0);
        controller.set_mode(RenderMode::Discrete, &points, &view, 500);
        controller.set_mode(RenderMode::Density, &points, &view, 600);
        controller.advance_to(&points, &view, 2_000);
        assert!(matches!(controller.state(), LayerState::Density(_)));
    }

    #[test]
    fn profile_change_rerenders_only_in_density_mode() {
        let points = triad();
        let view = camera(3.0);
        let mut controller = controller(RenderMode::Discrete);
        controller.replace_point_set(&points, &view, 0);
        let rebuilds = controller.rebuild_count();
        assert!(controller.set_profile(RenderProfile::Precision, &points, &view, 10));
        assert_eq!(controller.rebuild_count(), rebuilds);

        controller.set_mode(RenderMode::Density, &points, &view, 20);
        controller.set_profile(RenderProfile::Clusters, &points, &view, 30);
        let LayerState::Density(layer) = controller.state() else {
            panic!("expected density layer");
        };
        assert_eq!(layer.profile, RenderProfile::Clusters);
        assert_eq!(controller.last_rebuild(), Some(RebuildReason::ProfileChanged));
    }

    #[test]
    fn settle_keeps_density_opacity() {
        let points = triad();
        let view = camera(3.0);
        let mut controller = controller(RenderMode::Density);
        controller.replace_point_set(&points, &view, 0);
        controller.advance_to(&points, &view, 400);
        controller.on_viewport_settled(&points, &view.panned_by_pixels(20.0, 0.0), 500);
        let LayerState::Density(layer) = controller.state() else {
            panic!("expected density layer");
        };
        assert_eq!(layer.opacity, 1.0);
        assert!(layer.fade.is_none());
    }

    #[test]
    fn clicks_resolve_clusters_and_leaves() {
        let points = triad();
        let mut controller = controller(RenderMode::Discrete);
        controller.replace_point_set(&points, &camera(3.0), 0);
        let Some(ClickOutcome::ExpandCluster { zoom, .. }) = controller.click(320.0, 240.0) else {
            panic!("expected cluster expansion");
        };
        assert!(zoom > 3 && zoom <= 18);

        controller.on_viewport_settled(&points, &camera(18.0), 10);
        let Some(ClickOutcome::SelectRecord { id }) = controller.click(320.0, 240.0) else {
            panic!("expected record selection");
        };
        assert_eq!(id, 1);
        assert!(controller.click(5.0, 5.0).is_none());
    }
}
