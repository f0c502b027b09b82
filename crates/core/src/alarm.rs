use log::debug;

use crate::host::{TimerEvent, TimerId, Timers};

/// Cancellable single-shot timer.
///
/// A zero duration disables the alarm: `start` schedules nothing.
#[derive(Debug)]
pub struct DeferredAlarm {
    duration_ms: u32,
    pending: Option<TimerId>,
}

impl DeferredAlarm {
    pub fn new(duration_ms: u32) -> Self {
        Self {
            duration_ms,
            pending: None,
        }
    }

    /// Arm the alarm; `event` is delivered once after the duration.
    ///
    /// Callers stop or let the alarm fire before re-arming. If one is still
    /// pending it is replaced, so at most one delivery is ever outstanding.
    pub fn start<T: Timers>(&mut self, timers: &mut T, event: TimerEvent) {
        if self.duration_ms == 0 {
            return;
        }
        if let Some(previous) = self.pending.take() {
            debug!("alarm for {} re-armed while pending", event.element);
            timers.clear_timeout(previous);
        }
        self.pending = Some(timers.set_timeout(self.duration_ms, event));
    }

    /// Cancel a pending alarm. No-op when nothing is pending.
    pub fn stop<T: Timers>(&mut self, timers: &mut T) {
        if let Some(timer) = self.pending.take() {
            timers.clear_timeout(timer);
        }
    }

    /// The host delivered the alarm's timer. Returns whether it was still
    /// armed, i.e. whether the callback should run.
    pub fn fire(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }
}
