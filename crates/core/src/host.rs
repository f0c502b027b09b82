//! The seam between the tracking logic and whatever runs it.
//!
//! The core is single-threaded and never blocks: it asks the host to send
//! messages, schedule timers and attach listeners, and the host feeds the
//! results back through the [`Registry`](crate::registry::Registry) entry
//! points (`handle_message`, `handle_timer`, `handle_sampling`,
//! `handle_host_resize`).

use childtrack_protocol::{FrameBounds, Outbound, TrackedElementId};
use serde::Deserialize;

/// Opaque handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// What a timer means when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Dwell time elapsed: promote visible to read.
    ReadAlarm,
    /// Extra geometry check scheduled after becoming visible.
    ReRequest,
    /// Trailing edge of the sampling rate limiter.
    SampleTrailing,
}

/// Payload handed back to [`Registry::handle_timer`](crate::registry::Registry::handle_timer).
///
/// `generation` identifies the tracker instance that armed the timer, so a
/// timer outliving its tracker cannot touch a replacement with the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent {
    pub element: TrackedElementId,
    pub generation: u64,
    pub kind: TimerKind,
}

/// Host window events that trigger a geometry re-sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingSignal {
    DomContentLoaded,
    Load,
    Scroll,
    Resize,
}

impl SamplingSignal {
    pub const ALL: [SamplingSignal; 4] = [
        SamplingSignal::DomContentLoaded,
        SamplingSignal::Load,
        SamplingSignal::Scroll,
        SamplingSignal::Resize,
    ];

    /// DOM event name the signal is attached to.
    pub fn event_name(self) -> &'static str {
        match self {
            SamplingSignal::DomContentLoaded => "DOMContentLoaded",
            SamplingSignal::Load => "load",
            SamplingSignal::Scroll => "scroll",
            SamplingSignal::Resize => "resize",
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|signal| signal.event_name() == name)
    }
}

/// A live listener registration.
///
/// Not `Clone`: the only way to end one is [`Host::release`], which consumes
/// it, so every subscription is released at most once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a subscription stays attached until released"]
pub struct Subscription(u64);

impl Subscription {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

pub trait Timers {
    /// Milliseconds on a monotonic-enough clock.
    fn now_ms(&self) -> f64;

    /// Schedule `event` to be delivered once after `delay_ms`.
    fn set_timeout(&mut self, delay_ms: u32, event: TimerEvent) -> TimerId;

    /// Cancel a scheduled timer. Unknown or already-fired ids are ignored.
    fn clear_timeout(&mut self, timer: TimerId);
}

pub trait Host: Timers {
    /// Post a message to the embedded document.
    fn send(&mut self, message: Outbound);

    /// Whether the embedding frame still contains a nested document.
    fn has_live_document(&self) -> bool;

    /// Current frame geometry, or `None` if it cannot be measured.
    fn frame_bounds(&self) -> Option<FrameBounds>;

    /// Current host viewport height.
    fn viewport_height(&self) -> f64;

    /// Forward an unread-counter delta to the host UI.
    fn apply_unread_delta(&mut self, delta: i64);

    /// Start delivering [`SamplingSignal`]s for `element` to
    /// `Registry::handle_sampling`. The host must also route the element's
    /// geometry replies to `Registry::handle_message`.
    fn subscribe_sampling(&mut self, element: &TrackedElementId) -> Subscription;

    /// Start delivering host window resizes to `Registry::handle_host_resize`.
    fn subscribe_resize(&mut self) -> Subscription;

    /// Detach a subscription.
    fn release(&mut self, subscription: Subscription);
}
