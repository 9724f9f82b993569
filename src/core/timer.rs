use serde::{Deserialize, Serialize};

/// Milliseconds on the host's monotonic clock.
pub type TimestampMs = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    Once,
    Repeating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmedTimer {
    kind: TimerKind,
    interval_ms: u64,
    next_deadline_ms: TimestampMs,
    generation: u64,
}

/// Holds at most one armed task. Arming an armed slot panics.
#[derive(Debug, Default)]
pub struct TimerSlot {
    armed: Option<ArmedTimer>,
    generation: u64,
}

impl TimerSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Generation of the currently armed task, bumped on every arm.
    #[must_use]
    pub fn generation(&self) -> Option<u64> {
        self.armed.map(|timer| timer.generation)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<TimestampMs> {
        self.armed.map(|timer| timer.next_deadline_ms)
    }

    /// Arms a one-shot task firing at `now_ms + delay_ms`.
    ///
    /// # Panics
    /// Panics when the slot is already armed.
    pub fn arm_once(&mut self, now_ms: TimestampMs, delay_ms: u64) {
        self.arm(TimerKind::Once, now_ms, delay_ms);
    }

    /// Arms a repeating task firing every `interval_ms` starting one interval from now.
    ///
    /// # Panics
    /// Panics when the slot is already armed or `interval_ms` is zero.
    pub fn arm_repeating(&mut self, now_ms: TimestampMs, interval_ms: u64) {
        assert!(interval_ms > 0, "repeating timer interval must be > 0");
        self.arm(TimerKind::Repeating, now_ms, interval_ms);
    }

    fn arm(&mut self, kind: TimerKind, now_ms: TimestampMs, interval_ms: u64) {
        assert!(
            self.armed.is_none(),
            "timer slot armed twice; cancel the previous task first"
        );
        self.generation += 1;
        self.armed = Some(ArmedTimer {
            kind,
            interval_ms,
            next_deadline_ms: now_ms.saturating_add(interval_ms),
            generation: self.generation,
        });
    }

    /// Cancels the armed task. Returns `true` when something was cancelled.
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// Number of deadlines reached at `now_ms` since the last poll.
    ///
    /// One-shot timers fire at most once and disarm themselves.
    pub fn poll(&mut self, now_ms: TimestampMs) -> u32 {
        let Some(mut timer) = self.armed else {
            return 0;
        };
        if now_ms < timer.next_deadline_ms {
            return 0;
        }

        match timer.kind {
            TimerKind::Once => {
                self.armed = None;
                1
            }
            TimerKind::Repeating => {
                let overdue = now_ms - timer.next_deadline_ms;
                let fired = overdue / timer.interval_ms + 1;
                timer.next_deadline_ms += fired * timer.interval_ms;
                self.armed = Some(timer);
                u32::try_from(fired).unwrap_or(u32::MAX)
            }
        }
    }
}
