use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::timeline::{DEFAULT_YEAR, MAX_YEAR, MIN_YEAR, clamp_year};
use crate::core::timer::{TimerSlot, TimestampMs};
use crate::error::{MapError, MapResult};

/// Playback speed multiplier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackSpeed {
    #[default]
    X1,
    X2,
    X5,
}

impl PlaybackSpeed {
    pub const ALL: [Self; 3] = [Self::X1, Self::X2, Self::X5];

    #[must_use]
    pub const fn multiplier(self) -> u64 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X5 => 5,
        }
    }

    pub fn from_multiplier(multiplier: u64) -> MapResult<Self> {
        Self::ALL
            .into_iter()
            .find(|speed| speed.multiplier() == multiplier)
            .ok_or_else(|| {
                MapError::InvalidConfig(format!(
                    "playback speed must be 1, 2 or 5, got {multiplier}"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Tick interval at 1x speed.
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: default_base_interval_ms(),
        }
    }
}

impl PlaybackConfig {
    pub fn validate(self) -> MapResult<Self> {
        if self.base_interval_ms == 0 {
            return Err(MapError::InvalidConfig(
                "playback base interval must be > 0".to_owned(),
            ));
        }
        Ok(self)
    }

    #[must_use]
    pub fn interval_ms(self, speed: PlaybackSpeed) -> u64 {
        (self.base_interval_ms / speed.multiplier()).max(1)
    }
}

fn default_base_interval_ms() -> u64 {
    1200
}

/// Scrubber state shared with the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineState {
    pub year: i32,
    pub is_playing: bool,
    pub speed: PlaybackSpeed,
}

impl Default for TimelineState {
    fn default() -> Self {
        Self {
            year: DEFAULT_YEAR,
            is_playing: false,
            speed: PlaybackSpeed::X1,
        }
    }
}

/// Year advance produced by [`PlaybackScheduler::advance_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackTick {
    pub ticks: u32,
    pub year: i32,
}

/// Drives the active year while playing.
///
/// The tick timer is armed only while playing; every reschedule cancels the
/// armed task before arming the replacement.
#[derive(Debug)]
pub struct PlaybackScheduler {
    config: PlaybackConfig,
    state: TimelineState,
    timer: TimerSlot,
}

impl PlaybackScheduler {
    #[must_use]
    pub fn new(config: PlaybackConfig, year: i32) -> Self {
        Self {
            config,
            state: TimelineState {
                year: clamp_year(year),
                ..TimelineState::default()
            },
            timer: TimerSlot::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> TimelineState {
        self.state
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.state.year
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    #[must_use]
    pub fn interval_ms(&self) -> u64 {
        self.config.interval_ms(self.state.speed)
    }

    #[must_use]
    pub fn next_tick_at(&self) -> Option<TimestampMs> {
        self.timer.next_deadline()
    }

    pub fn play(&mut self, now_ms: TimestampMs) {
        if self.state.is_playing {
            return;
        }
        self.state.is_playing = true;
        self.reschedule(now_ms);
        debug!(year = self.state.year, speed = ?self.state.speed, "playback started");
    }

    pub fn pause(&mut self) {
        if !self.state.is_playing {
            return;
        }
        self.state.is_playing = false;
        self.timer.cancel();
        debug!(year = self.state.year, "playback paused");
    }

    pub fn toggle(&mut self, now_ms: TimestampMs) -> bool {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play(now_ms);
        }
        self.state.is_playing
    }

    /// Changes speed; a running tick is rescheduled at the new interval.
    pub fn set_speed(&mut self, speed: PlaybackSpeed, now_ms: TimestampMs) {
        if self.state.speed == speed {
            return;
        }
        self.state.speed = speed;
        if self.state.is_playing {
            self.reschedule(now_ms);
        }
    }

    /// Jumps to `year` (clamped). Playback keeps its schedule.
    pub fn set_year(&mut self, year: i32) -> i32 {
        self.state.year = clamp_year(year);
        self.state.year
    }

    pub fn step_forward(&mut self) -> i32 {
        self.state.year = next_year(self.state.year);
        self.state.year
    }

    pub fn step_backward(&mut self) -> i32 {
        self.state.year = previous_year(self.state.year);
        self.state.year
    }

    /// Fires every tick due at `now_ms`, one year per tick.
    pub fn advance_to(&mut self, now_ms: TimestampMs) -> Option<PlaybackTick> {
        if !self.state.is_playing {
            return None;
        }
        let ticks = self.timer.poll(now_ms);
        if ticks == 0 {
            return None;
        }
        for _ in 0..ticks {
            self.state.year = next_year(self.state.year);
        }
        trace!(ticks, year = self.state.year, "playback tick");
        Some(PlaybackTick {
            ticks,
            year: self.state.year,
        })
    }

    fn reschedule(&mut self, now_ms: TimestampMs) {
        self.timer.cancel();
        self.timer.arm_repeating(now_ms, self.interval_ms());
    }
}

fn next_year(year: i32) -> i32 {
    if year >= MAX_YEAR { MIN_YEAR } else { year + 1 }
}

fn previous_year(year: i32) -> i32 {
    if year <= MIN_YEAR { MAX_YEAR } else { year - 1 }
}

#[cfg(test)]
mod tests {
    use super::{PlaybackConfig, PlaybackScheduler, PlaybackSpeed};
    use crate::core::timeline::{MAX_YEAR, MIN_YEAR};

    fn scheduler(year: i32) -> PlaybackScheduler {
        PlaybackScheduler::new(PlaybackConfig::default(), year)
    }

    #[test]
    fn one_tick_per_base_interval_at_1x() {
        let mut playback = scheduler(2000);
        playback.play(0);
        assert!(playback.advance_to(1_199).is_none());
        let tick = playback.advance_to(1_200).expect("tick");
        assert_eq!(tick.ticks, 1);
        assert_eq!(playback.year(), 2001);
    }

    #[test]
    fn five_ticks_per_base_interval_at_5x() {
        let mut playback = scheduler(2000);
        playback.set_speed(PlaybackSpeed::X5, 0);
        playback.play(0);
        assert_eq!(playback.interval_ms(), 240);
        let tick = playback.advance_to(1_200).expect("tick");
        assert_eq!(tick.ticks, 5);
        assert_eq!(playback.year(), 2005);
    }

    #[test]
    fn playing_wraps_past_max_year() {
        let mut playback = scheduler(MAX_YEAR);
        playback.play(0);
        playback.advance_to(1_200);
        assert_eq!(playback.year(), MIN_YEAR);
        assert!(playback.is_playing());
    }

    #[test]
    fn steps_wrap_and_leave_play_state_alone() {
        let mut playback = scheduler(MIN_YEAR);
        assert_eq!(playback.step_backward(), MAX_YEAR);
        assert_eq!(playback.step_forward(), MIN_YEAR);
        assert!(!playback.is_playing());

        playback.play(0);
        playback.step_forward();
        assert!(playback.is_playing());
    }

    #[test]
    fn speed_change_reschedules_without_duplicate_ticks() {
        let mut playback = scheduler(2000);
        playback.play(0);
        assert!(playback.advance_to(1_000).is_none());
        playback.set_speed(PlaybackSpeed::X2, 1_000);
        assert_eq!(playback.next_tick_at(), Some(1_600));
        assert!(playback.advance_to(1_200).is_none());
        assert_eq!(playback.advance_to(1_600).expect("tick").ticks, 1);
        assert_eq!(playback.year(), 2001);
    }

    #[test]
    fn pause_cancels_pending_tick() {
        let mut playback = scheduler(2000);
        assert!(playback.toggle(0));
        assert!(!playback.toggle(600));
        assert!(playback.advance_to(5_000).is_none());
        assert_eq!(playback.year(), 2000);
        assert!(playback.next_tick_at().is_none());
    }

    #[test]
    fn speed_set_while_stopped_applies_on_play() {
        let mut playback = scheduler(2000);
        playback.set_speed(PlaybackSpeed::X2, 0);
        assert!(playback.next_tick_at().is_none());
        playback.play(100);
        assert_eq!(playback.next_tick_at(), Some(700));
    }

    #[test]
    fn years_are_clamped_on_mutation() {
        let mut playback = scheduler(3000);
        assert_eq!(playback.year(), MAX_YEAR);
        assert_eq!(playback.set_year(100), MIN_YEAR);
        assert!(PlaybackSpeed::from_multiplier(3).is_err());
        assert_eq!(
            PlaybackSpeed::from_multiplier(5).expect("speed"),
            PlaybackSpeed::X5
        );
    }
}
