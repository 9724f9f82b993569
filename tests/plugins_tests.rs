use std::cell::RefCell;
use std::rc::Rc;

use signal_map::api::{
    DataStatus, MapEngine, MapEngineConfig, PointSetRequest, PointSetResponse, PointSetSource,
    RebuildReason, RenderMode,
};
use signal_map::core::{GeoPoint, LonLat, Viewport};
use signal_map::extensions::{MapEvent, MapPlugin, PluginContext};
use signal_map::render::NullRenderer;
use signal_map::{MapError, MapResult};

#[derive(Clone)]
struct RecordingPlugin {
    id: String,
    events: Rc<RefCell<Vec<MapEvent>>>,
    contexts: Rc<RefCell<Vec<PluginContext>>>,
}

impl RecordingPlugin {
    fn new(id: impl Into<String>, events: Rc<RefCell<Vec<MapEvent>>>) -> Self {
        Self {
            id: id.into(),
            events,
            contexts: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl MapPlugin for RecordingPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_event(&mut self, event: MapEvent, context: PluginContext) {
        self.events.borrow_mut().push(event);
        self.contexts.borrow_mut().push(context);
    }
}

/// Serves the triad for every year until told to fail.
struct FlakySource {
    fail: Rc<RefCell<bool>>,
}

impl PointSetSource for FlakySource {
    fn fetch(&mut self, request: &PointSetRequest) -> MapResult<PointSetResponse> {
        if *self.fail.borrow() {
            return Err(MapError::DataUnavailable("upstream timed out".to_owned()));
        }
        Ok(PointSetResponse::new(
            request.year,
            vec![
                GeoPoint::new(1, 40.0, -75.0),
                GeoPoint::new(2, 40.001, -75.001),
                GeoPoint::new(3, 40.002, -75.002),
            ],
        ))
    }
}

fn event_kind(event: &MapEvent) -> &'static str {
    match event {
        MapEvent::PointSetReplaced { .. } => "point_set",
        MapEvent::DataUnavailable { .. } => "unavailable",
        MapEvent::YearChanged { .. } => "year",
        MapEvent::PlaybackChanged { .. } => "playback",
        MapEvent::RenderModeChanged { .. } => "mode",
        MapEvent::RenderProfileChanged { .. } => "profile",
        MapEvent::LayerRebuilt { .. } => "layer",
        MapEvent::ViewportSettled { .. } => "settled",
        MapEvent::ClusterExpanded { .. } => "expand",
        MapEvent::DetailRequested { .. } => "detail",
        MapEvent::PanStarted => "pan_start",
        MapEvent::PanEnded => "pan_end",
        MapEvent::Rendered => "rendered",
    }
}

fn engine() -> MapEngine<NullRenderer> {
    let config = MapEngineConfig::new(Viewport::new(800, 600))
        .with_camera(LonLat::new(-75.001, 40.001), 3.0);
    MapEngine::new(NullRenderer::default(), config).expect("engine init")
}

#[test]
fn plugin_receives_deterministic_event_sequence() {
    let mut engine = engine();
    let events = Rc::new(RefCell::new(Vec::<MapEvent>::new()));
    engine
        .register_plugin(Box::new(RecordingPlugin::new("recorder", events.clone())))
        .expect("register plugin");

    let fail = Rc::new(RefCell::new(false));
    engine.set_point_source(Box::new(FlakySource { fail }), 0);
    engine.set_render_mode(RenderMode::Density, 10);
    engine.pan_start();
    engine.pan_by_pixels(5.0, 0.0, 20);
    engine.pan_end(30);
    engine.advance_to(60).expect("advance");
    engine.render().expect("render");

    let events = events.borrow();
    let kinds: Vec<&'static str> = events.iter().map(event_kind).collect();
    assert_eq!(
        kinds,
        vec![
            "point_set",
            "layer",
            "mode",
            "layer",
            "pan_start",
            "pan_end",
            "settled",
            "layer",
            "rendered",
        ]
    );
    assert_eq!(
        events[1],
        MapEvent::LayerRebuilt {
            reason: RebuildReason::PointSetReplaced
        }
    );
    assert_eq!(
        events[7],
        MapEvent::LayerRebuilt {
            reason: RebuildReason::ViewportSettled
        }
    );
}

#[test]
fn failed_fetch_recovers_to_the_empty_state() {
    let mut engine = engine();
    let events = Rc::new(RefCell::new(Vec::<MapEvent>::new()));
    engine
        .register_plugin(Box::new(RecordingPlugin::new("recorder", events.clone())))
        .expect("register plugin");

    let fail = Rc::new(RefCell::new(false));
    engine.set_point_source(Box::new(FlakySource { fail: fail.clone() }), 0);
    assert_eq!(engine.data_status(), DataStatus::Ready);

    *fail.borrow_mut() = true;
    assert_eq!(engine.step_forward(100), 2021);
    assert_eq!(engine.data_status(), DataStatus::Unavailable);
    assert!(engine.point_set().is_empty());
    assert!(engine.layer_controller().visible_layer().is_none());
    assert!(engine.build_frame().overlay.is_some());
    assert!(
        events
            .borrow()
            .contains(&MapEvent::DataUnavailable { year: 2021 })
    );

    *fail.borrow_mut() = false;
    assert_eq!(engine.reload(200), DataStatus::Ready);
    assert_eq!(engine.point_set().len(), 3);
    assert!(engine.build_frame().overlay.is_none());
}

#[test]
fn stale_responses_are_rejected() {
    let mut engine = engine();
    let err = engine
        .apply_point_set_response(PointSetResponse::new(1999, Vec::new()), 0)
        .expect_err("stale year");
    assert!(matches!(err, MapError::InvalidData(_)));
}

#[test]
fn context_reflects_engine_state_at_emit_time() {
    let mut engine = engine();
    let events = Rc::new(RefCell::new(Vec::<MapEvent>::new()));
    let plugin = RecordingPlugin::new("recorder", events);
    let contexts = plugin.contexts.clone();
    engine.register_plugin(Box::new(plugin)).expect("register");

    engine.play(0);
    engine.set_render_mode(RenderMode::Density, 5);

    // playback, mode, layer
    let contexts = contexts.borrow();
    assert_eq!(contexts.len(), 3);
    assert!(contexts[0].is_playing);
    assert_eq!(contexts[1].render_mode, RenderMode::Density);
    assert_eq!(contexts[1].year, 2020);
}

#[test]
fn plugin_ids_are_unique_and_removable() {
    let mut engine = engine();
    let events = Rc::new(RefCell::new(Vec::<MapEvent>::new()));
    engine
        .register_plugin(Box::new(RecordingPlugin::new("a", events.clone())))
        .expect("register a");
    assert!(
        engine
            .register_plugin(Box::new(RecordingPlugin::new("a", events.clone())))
            .is_err()
    );
    assert!(
        engine
            .register_plugin(Box::new(RecordingPlugin::new("", events.clone())))
            .is_err()
    );
    assert!(engine.has_plugin("a"));
    assert_eq!(engine.plugin_count(), 1);
    assert!(engine.unregister_plugin("a"));
    assert!(!engine.unregister_plugin("a"));
    assert_eq!(engine.plugin_count(), 0);
}

#[test]
fn clicks_emit_expand_and_detail_events() {
    let mut engine = engine();
    let events = Rc::new(RefCell::new(Vec::<MapEvent>::new()));
    engine
        .register_plugin(Box::new(RecordingPlugin::new("recorder", events.clone())))
        .expect("register plugin");
    engine
        .set_points(
            vec![
                GeoPoint::new(1, 40.0, -75.0),
                GeoPoint::new(2, 40.001, -75.001),
                GeoPoint::new(3, 40.002, -75.002),
            ],
            0,
        )
        .expect("points");

    engine.click(400.0, 300.0, 10).expect("click");
    assert!(
        events
            .borrow()
            .iter()
            .any(|event| matches!(event, MapEvent::ClusterExpanded { .. }))
    );
}
