use tracing::debug;

use crate::core::timeline::SLIDER_MAX;
use crate::core::timer::TimestampMs;
use crate::render::Renderer;

use super::playback::PlaybackSpeed;
use super::{MapEngine, MapEvent};

impl<R: Renderer> MapEngine<R> {
    pub fn play(&mut self, now_ms: TimestampMs) {
        self.observe_clock(now_ms);
        if self.playback.is_playing() {
            return;
        }
        self.playback.play(now_ms);
        self.emit_plugin_event(MapEvent::PlaybackChanged { is_playing: true });
    }

    pub fn pause(&mut self) {
        if !self.playback.is_playing() {
            return;
        }
        self.playback.pause();
        self.emit_plugin_event(MapEvent::PlaybackChanged { is_playing: false });
    }

    /// Flips between playing and paused; returns the new playing flag.
    pub fn toggle_playback(&mut self, now_ms: TimestampMs) -> bool {
        if self.playback.is_playing() {
            self.pause();
        } else {
            self.play(now_ms);
        }
        self.playback.is_playing()
    }

    pub fn set_playback_speed(&mut self, speed: PlaybackSpeed, now_ms: TimestampMs) {
        self.observe_clock(now_ms);
        self.playback.set_speed(speed, now_ms);
    }

    /// Jumps to `year` (clamped) and loads its point set.
    pub fn set_year(&mut self, year: i32, now_ms: TimestampMs) -> i32 {
        self.observe_clock(now_ms);
        let previous = self.year();
        self.playback.set_year(year);
        self.on_year_changed(previous, now_ms);
        self.year()
    }

    pub fn step_forward(&mut self, now_ms: TimestampMs) -> i32 {
        self.observe_clock(now_ms);
        let previous = self.year();
        self.playback.step_forward();
        self.on_year_changed(previous, now_ms);
        self.year()
    }

    pub fn step_backward(&mut self, now_ms: TimestampMs) -> i32 {
        self.observe_clock(now_ms);
        let previous = self.year();
        self.playback.step_backward();
        self.on_year_changed(previous, now_ms);
        self.year()
    }

    /// Scrubber position (0..=100) of the active year.
    #[must_use]
    pub fn timeline_progress(&self) -> f64 {
        self.timeline.year_to_progress(self.year())
    }

    pub fn set_timeline_progress(&mut self, progress: f64, now_ms: TimestampMs) -> i32 {
        let year = self.timeline.progress_to_year(progress);
        self.set_year(year, now_ms)
    }

    #[must_use]
    pub fn slider_value(&self) -> u32 {
        self.timeline.slider_value_for_year(self.year())
    }

    pub fn set_slider_value(&mut self, value: u32, now_ms: TimestampMs) -> i32 {
        let year = self.timeline.year_for_slider_value(value.min(SLIDER_MAX));
        self.set_year(year, now_ms)
    }

    pub(super) fn on_year_changed(&mut self, previous: i32, now_ms: TimestampMs) {
        let year = self.year();
        if year == previous {
            return;
        }
        debug!(previous, year, "active year changed");
        self.emit_plugin_event(MapEvent::YearChanged { year });
        if self.has_point_source() {
            self.reload(now_ms);
        }
    }
}
