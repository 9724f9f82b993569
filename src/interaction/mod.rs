mod settle;

pub use settle::SettleDebouncer;

use serde::{Deserialize, Serialize};

use crate::core::projection::{lat_to_unit_y, lon_to_unit_x, unit_x_to_lon, unit_y_to_lat};
use crate::core::timer::TimestampMs;
use crate::core::types::LonLat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionMode {
    Idle,
    Panning,
    /// A camera animation (cluster expansion) is in flight.
    Flying,
}

/// Camera animation toward a target center and zoom.
///
/// Centers are interpolated in unit Mercator space with an ease-in-out curve
/// so the path matches what a tile map shows for the same motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlyTo {
    pub from_center: LonLat,
    pub from_zoom: f64,
    pub to_center: LonLat,
    pub to_zoom: f64,
    pub started_at_ms: TimestampMs,
    pub duration_ms: u64,
}

/// Camera pose produced by one animation step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlyStep {
    pub center: LonLat,
    pub zoom: f64,
    pub finished: bool,
}

impl FlyTo {
    #[must_use]
    pub fn progress(self, now_ms: TimestampMs) -> f64 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(self.started_at_ms);
        (elapsed as f64 / self.duration_ms as f64).min(1.0)
    }

    #[must_use]
    pub fn step(self, now_ms: TimestampMs) -> FlyStep {
        let t = self.progress(now_ms);
        if t >= 1.0 {
            return FlyStep {
                center: self.to_center,
                zoom: self.to_zoom,
                finished: true,
            };
        }

        let eased = ease_in_out_cubic(t);
        let x0 = lon_to_unit_x(self.from_center.lon);
        let y0 = lat_to_unit_y(self.from_center.lat);
        let x1 = lon_to_unit_x(self.to_center.lon);
        let y1 = lat_to_unit_y(self.to_center.lat);
        let center = LonLat::new(
            unit_x_to_lon(x0 + (x1 - x0) * eased),
            unit_y_to_lat(y0 + (y1 - y0) * eased),
        );
        FlyStep {
            center,
            zoom: self.from_zoom + (self.to_zoom - self.from_zoom) * eased,
            finished: false,
        }
    }
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionState {
    mode: InteractionMode,
    cursor_x: f64,
    cursor_y: f64,
    flight: Option<FlyTo>,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            mode: InteractionMode::Idle,
            cursor_x: 0.0,
            cursor_y: 0.0,
            flight: None,
        }
    }
}

impl InteractionState {
    #[must_use]
    pub fn mode(self) -> InteractionMode {
        self.mode
    }

    #[must_use]
    pub fn cursor(self) -> (f64, f64) {
        (self.cursor_x, self.cursor_y)
    }

    #[must_use]
    pub fn flight(self) -> Option<FlyTo> {
        self.flight
    }

    pub fn on_pointer_move(&mut self, x: f64, y: f64) {
        self.cursor_x = x;
        self.cursor_y = y;
    }

    /// A user gesture interrupts any running camera animation.
    pub fn on_pan_start(&mut self) {
        self.flight = None;
        self.mode = InteractionMode::Panning;
    }

    pub fn on_pan_end(&mut self) {
        self.mode = InteractionMode::Idle;
    }

    pub fn start_flight(&mut self, flight: FlyTo) {
        self.flight = Some(flight);
        self.mode = InteractionMode::Flying;
    }

    /// Advances the running flight, returning the pose to apply.
    ///
    /// Returns `None` when no flight is active.
    pub fn step_flight(&mut self, now_ms: TimestampMs) -> Option<FlyStep> {
        let step = self.flight?.step(now_ms);
        if step.finished {
            self.flight = None;
            self.mode = InteractionMode::Idle;
        }
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::{FlyTo, InteractionMode, InteractionState};
    use crate::core::types::LonLat;

    fn flight() -> FlyTo {
        FlyTo {
            from_center: LonLat::new(0.0, 0.0),
            from_zoom: 3.0,
            to_center: LonLat::new(10.0, 0.0),
            to_zoom: 7.0,
            started_at_ms: 1_000,
            duration_ms: 500,
        }
    }

    #[test]
    fn flight_is_symmetric_at_midpoint() {
        let step = flight().step(1_250);
        assert!(!step.finished);
        assert_abs_diff_eq!(step.zoom, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(step.center.lon, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn flight_lands_exactly_on_target() {
        let mut state = InteractionState::default();
        state.start_flight(flight());
        assert_eq!(state.mode(), InteractionMode::Flying);
        let step = state.step_flight(1_600).expect("active flight");
        assert!(step.finished);
        assert_eq!(step.center, LonLat::new(10.0, 0.0));
        assert_eq!(step.zoom, 7.0);
        assert_eq!(state.mode(), InteractionMode::Idle);
        assert!(state.step_flight(1_700).is_none());
    }

    #[test]
    fn pan_interrupts_flight() {
        let mut state = InteractionState::default();
        state.start_flight(flight());
        state.on_pan_start();
        assert_eq!(state.mode(), InteractionMode::Panning);
        assert!(state.flight().is_none());
        state.on_pan_end();
        assert_eq!(state.mode(), InteractionMode::Idle);
    }
}
