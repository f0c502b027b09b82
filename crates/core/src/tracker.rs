use childtrack_protocol::{Outbound, Rect, TrackedElementId};
use log::{debug, trace};

use crate::alarm::DeferredAlarm;
use crate::host::{Host, SamplingSignal, Subscription, TimerEvent, TimerId, TimerKind};
use crate::settings::TrackerSettings;
use crate::throttle::{RateLimitOptions, RateLimiter};
use crate::viewport::is_element_in_viewport;

/// Where a tracker is in the visible → read progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// Not (fully) on screen.
    Unarmed,
    /// On screen, read alarm running.
    VisiblePending,
    /// Stayed on screen for the whole read delay.
    Read,
}

/// Per-element visibility state machine.
///
/// Created by the registry on `request-tracking`; every handler receives the
/// host explicitly. [`VisibilityTracker::stop`] consumes the tracker, so a
/// stopped instance cannot transition again.
#[derive(Debug)]
pub struct VisibilityTracker {
    id: TrackedElementId,
    generation: u64,
    settings: TrackerSettings,
    phase: TrackerPhase,
    is_visible: bool,
    last_rect: Option<Rect>,
    alarm: DeferredAlarm,
    sampler: RateLimiter<SamplingSignal>,
    re_request: Option<TimerId>,
    subscription: Option<Subscription>,
}

impl VisibilityTracker {
    /// Build a tracker, attach its sampling subscription and send the first
    /// geometry request.
    pub fn start<H: Host>(
        host: &mut H,
        id: TrackedElementId,
        generation: u64,
        settings: TrackerSettings,
    ) -> Self {
        let subscription = host.subscribe_sampling(&id);
        let tracker = Self {
            alarm: DeferredAlarm::new(settings.read_delay_ms),
            sampler: RateLimiter::new(settings.sample_debounce_ms, RateLimitOptions::default()),
            id,
            generation,
            settings,
            phase: TrackerPhase::Unarmed,
            is_visible: false,
            last_rect: None,
            re_request: None,
            subscription: Some(subscription),
        };
        debug!("tracking {} (generation {})", tracker.id, generation);
        tracker.request_geometry(host);
        tracker
    }

    pub fn id(&self) -> &TrackedElementId {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    pub fn last_rect(&self) -> Option<Rect> {
        self.last_rect
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Whether the read alarm is currently armed.
    pub fn alarm_pending(&self) -> bool {
        self.alarm.is_pending()
    }

    /// A geometry reply arrived. Returns the new visibility.
    pub fn on_geometry<H: Host>(&mut self, host: &mut H, rect: Rect) -> bool {
        let now_visible = host
            .frame_bounds()
            .is_some_and(|bounds| is_element_in_viewport(&rect, &bounds));

        if self.is_visible && !now_visible {
            self.alarm.stop(host);
            self.phase = TrackerPhase::Unarmed;
            debug!("{} left the viewport", self.id);
        }

        if !self.is_visible && now_visible {
            let event = self.timer_event(TimerKind::ReadAlarm);
            self.alarm.start(host, event);
            self.phase = TrackerPhase::VisiblePending;
            debug!("{} entered the viewport", self.id);
            self.notify(
                host,
                Outbound::ElementVisible {
                    element: self.id.clone(),
                },
            );
            self.schedule_re_request(host);
        }

        self.is_visible = now_visible;
        self.last_rect = Some(rect);
        self.is_visible
    }

    /// A host window event arrived for this tracker.
    pub fn on_sampling<H: Host>(&mut self, host: &mut H, signal: SamplingSignal) {
        let event = self.timer_event(TimerKind::SampleTrailing);
        match self.sampler.call(host, event, signal) {
            Some(signal) => {
                trace!("{} sampling on {:?}", self.id, signal);
                self.request_geometry(host);
            }
            None => trace!("{} sample {:?} throttled", self.id, signal),
        }
    }

    /// One of this tracker's timers fired.
    pub fn on_timer<H: Host>(&mut self, host: &mut H, kind: TimerKind) {
        match kind {
            TimerKind::ReadAlarm => {
                if self.alarm.fire() && self.is_visible {
                    self.phase = TrackerPhase::Read;
                    debug!("{} read", self.id);
                    self.notify(
                        host,
                        Outbound::OnScreen {
                            element: self.id.clone(),
                        },
                    );
                }
            }
            TimerKind::ReRequest => {
                if self.re_request.take().is_some() {
                    self.request_geometry(host);
                }
            }
            TimerKind::SampleTrailing => {
                if let Some(signal) = self.sampler.on_timer(host) {
                    trace!("{} trailing sample after {:?}", self.id, signal);
                    self.request_geometry(host);
                }
            }
        }
    }

    /// Tear down: cancel every timer and release the sampling subscription.
    pub fn stop<H: Host>(mut self, host: &mut H) {
        self.alarm.stop(host);
        self.sampler.cancel(host);
        if let Some(timer) = self.re_request.take() {
            host.clear_timeout(timer);
        }
        if let Some(subscription) = self.subscription.take() {
            host.release(subscription);
        }
        debug!("stopped tracking {} (generation {})", self.id, self.generation);
    }

    fn schedule_re_request<H: Host>(&mut self, host: &mut H) {
        if let Some(previous) = self.re_request.take() {
            host.clear_timeout(previous);
        }
        let event = self.timer_event(TimerKind::ReRequest);
        self.re_request = Some(host.set_timeout(self.settings.re_request_delay_ms, event));
    }

    fn request_geometry<H: Host>(&self, host: &mut H) {
        self.notify(
            host,
            Outbound::RequestBoundingClientRect {
                element: self.id.clone(),
            },
        );
    }

    /// Send unless the frame lost its document.
    fn notify<H: Host>(&self, host: &mut H, message: Outbound) {
        if host.has_live_document() {
            host.send(message);
        } else {
            trace!(
                "suppressed {} for {}: no live document",
                message.message_type(),
                self.id
            );
        }
    }

    fn timer_event(&self, kind: TimerKind) -> TimerEvent {
        TimerEvent {
            element: self.id.clone(),
            generation: self.generation,
            kind,
        }
    }
}
