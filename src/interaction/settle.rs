use tracing::trace;

use crate::core::timer::{TimerSlot, TimestampMs};

/// Trailing-edge debouncer for viewport-settle events.
///
/// Every viewport change restarts the quiet period; the settle fires once
/// no change has been seen for `delay_ms`.
#[derive(Debug)]
pub struct SettleDebouncer {
    delay_ms: u64,
    timer: TimerSlot,
}

impl SettleDebouncer {
    #[must_use]
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            timer: TimerSlot::new(),
        }
    }

    #[must_use]
    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.timer.is_armed()
    }

    /// Records a viewport change at `now_ms`.
    pub fn notify(&mut self, now_ms: TimestampMs) {
        self.timer.cancel();
        self.timer.arm_once(now_ms, self.delay_ms);
        trace!(now_ms, delay_ms = self.delay_ms, "viewport settle rescheduled");
    }

    /// `true` exactly once per quiet period, when the settle deadline passes.
    pub fn poll(&mut self, now_ms: TimestampMs) -> bool {
        self.timer.poll(now_ms) > 0
    }

    pub fn cancel(&mut self) -> bool {
        self.timer.cancel()
    }
}
