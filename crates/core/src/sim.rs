//! Deterministic, virtual-clock host and a small discrete-event harness.
//!
//! [`ManualHost`] implements [`Host`] by recording everything: sent
//! messages, scheduled timers, subscriptions and unread deltas. Time only
//! moves when the caller moves it.
//!
//! [`Harness`] wires a [`Registry<ManualHost>`] to a simulated embedded
//! document that answers geometry requests through the wire codec after a
//! fixed channel latency, so whole protocol exchanges can be replayed
//! without a browser.

use std::collections::{HashMap, VecDeque};

use childtrack_protocol::messages::names;
use childtrack_protocol::{FrameBounds, Inbound, Outbound, Rect, TrackedElementId, encode_rect};
use log::{debug, warn};

use crate::host::{Host, SamplingSignal, Subscription, TimerEvent, TimerId, Timers};
use crate::registry::{Registry, RegistryError};
use crate::settings::TrackerSettings;

#[derive(Debug)]
struct ScheduledTimer {
    id: u64,
    due: f64,
    event: TimerEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SubscriptionTarget {
    Sampling(TrackedElementId),
    Resize,
}

#[derive(Debug)]
pub struct ManualHost {
    now: f64,
    next_id: u64,
    timers: Vec<ScheduledTimer>,
    sent: Vec<Outbound>,
    live: bool,
    frame: Option<Rect>,
    viewport_width: f64,
    viewport_height: f64,
    unread_deltas: Vec<i64>,
    subscriptions: HashMap<u64, SubscriptionTarget>,
}

impl Default for ManualHost {
    /// A 1024x800 viewport with a frame at the top of the page.
    fn default() -> Self {
        Self::new(FrameBounds::new(
            Rect::new(0.0, 0.0, 2000.0, 1024.0),
            1024.0,
            800.0,
        ))
    }
}

impl ManualHost {
    pub fn new(bounds: FrameBounds) -> Self {
        Self {
            now: 0.0,
            next_id: 1,
            timers: Vec::new(),
            sent: Vec::new(),
            live: true,
            frame: Some(bounds.frame),
            viewport_width: bounds.viewport_width,
            viewport_height: bounds.viewport_height,
            unread_deltas: Vec::new(),
            subscriptions: HashMap::new(),
        }
    }

    pub fn set_now(&mut self, now: f64) {
        self.now = now;
    }

    pub fn set_live(&mut self, live: bool) {
        self.live = live;
    }

    /// Replace the frame geometry; `None` makes the frame unmeasurable.
    pub fn set_frame_bounds(&mut self, bounds: Option<FrameBounds>) {
        self.frame = bounds.map(|b| b.frame);
        if let Some(bounds) = bounds {
            self.viewport_width = bounds.viewport_width;
            self.viewport_height = bounds.viewport_height;
        }
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport_height = height;
    }

    /// Move the frame up by `dy`, as a host page scroll would.
    pub fn scroll_by(&mut self, dy: f64) {
        if let Some(frame) = self.frame.as_mut() {
            *frame = frame.offset_y(-dy);
        }
    }

    pub fn sent(&self) -> &[Outbound] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.sent)
    }

    pub fn unread_deltas(&self) -> &[i64] {
        &self.unread_deltas
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<f64> {
        self.earliest().map(|index| self.timers[index].due)
    }

    /// Remove and return the earliest timer due at or before `until`,
    /// advancing the clock to its due time.
    pub fn pop_due(&mut self, until: f64) -> Option<TimerEvent> {
        let index = self.earliest()?;
        if self.timers[index].due > until {
            return None;
        }
        let timer = self.timers.remove(index);
        self.now = self.now.max(timer.due);
        Some(timer.event)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Elements with a live sampling subscription, sorted.
    pub fn sampling_targets(&self) -> Vec<TrackedElementId> {
        let mut targets: Vec<_> = self
            .subscriptions
            .values()
            .filter_map(|target| match target {
                SubscriptionTarget::Sampling(id) => Some(id.clone()),
                SubscriptionTarget::Resize => None,
            })
            .collect();
        targets.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        targets
    }

    pub fn resize_subscribed(&self) -> bool {
        self.subscriptions
            .values()
            .any(|target| *target == SubscriptionTarget::Resize)
    }

    fn earliest(&self) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)))
            .map(|(index, _)| index)
    }

    fn subscribe(&mut self, target: SubscriptionTarget) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.insert(id, target);
        Subscription::new(id)
    }
}

impl Timers for ManualHost {
    fn now_ms(&self) -> f64 {
        self.now
    }

    fn set_timeout(&mut self, delay_ms: u32, event: TimerEvent) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.push(ScheduledTimer {
            id,
            due: self.now + f64::from(delay_ms),
            event,
        });
        TimerId::new(id)
    }

    fn clear_timeout(&mut self, timer: TimerId) {
        self.timers.retain(|scheduled| scheduled.id != timer.raw());
    }
}

impl Host for ManualHost {
    fn send(&mut self, message: Outbound) {
        self.sent.push(message);
    }

    fn has_live_document(&self) -> bool {
        self.live
    }

    fn frame_bounds(&self) -> Option<FrameBounds> {
        self.frame
            .map(|frame| FrameBounds::new(frame, self.viewport_width, self.viewport_height))
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn apply_unread_delta(&mut self, delta: i64) {
        self.unread_deltas.push(delta);
    }

    fn subscribe_sampling(&mut self, element: &TrackedElementId) -> Subscription {
        self.subscribe(SubscriptionTarget::Sampling(element.clone()))
    }

    fn subscribe_resize(&mut self) -> Subscription {
        self.subscribe(SubscriptionTarget::Resize)
    }

    fn release(&mut self, subscription: Subscription) {
        if self.subscriptions.remove(&subscription.raw()).is_none() {
            warn!("released unknown subscription {}", subscription.raw());
        }
    }
}

/// A host → embedded message as observed by the simulated document.
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub at: f64,
    pub message: Outbound,
}

#[derive(Debug)]
struct Delivery {
    due: f64,
    message_type: String,
    payload: String,
}

/// Registry + simulated embedded document + in-order channel.
#[derive(Debug)]
pub struct Harness {
    registry: Registry<ManualHost>,
    document: HashMap<TrackedElementId, Rect>,
    latency_ms: f64,
    in_flight: VecDeque<Delivery>,
    received: Vec<Received>,
    errors: Vec<(f64, RegistryError)>,
}

impl Harness {
    pub fn new(settings: TrackerSettings, bounds: FrameBounds, latency_ms: f64) -> Self {
        Self {
            registry: Registry::new(ManualHost::new(bounds), settings),
            document: HashMap::new(),
            latency_ms,
            in_flight: VecDeque::new(),
            received: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn now(&self) -> f64 {
        self.registry.host().now_ms()
    }

    pub fn registry(&self) -> &Registry<ManualHost> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<ManualHost> {
        &mut self.registry
    }

    /// Set where `element` currently sits in the embedded document.
    pub fn place(&mut self, element: &str, rect: Rect) {
        self.document.insert(TrackedElementId::from(element), rect);
    }

    /// Remove `element` from the embedded document; geometry requests for it
    /// go unanswered.
    pub fn remove_element(&mut self, element: &str) {
        self.document.remove(element);
    }

    /// The embedded document posts a raw message.
    pub fn post(&mut self, message_type: &str, payload: &str) {
        self.in_flight.push_back(Delivery {
            due: self.now() + self.latency_ms,
            message_type: message_type.to_owned(),
            payload: payload.to_owned(),
        });
        let now = self.now();
        self.run_until(now);
    }

    pub fn post_message(&mut self, message: &Inbound) {
        self.post(&message.message_type(), &message.payload());
    }

    /// A host window event fires now.
    pub fn window_event(&mut self, signal: SamplingSignal) {
        for element in self.registry.host().sampling_targets() {
            self.registry.handle_sampling(&element, signal);
        }
        if signal == SamplingSignal::Resize && self.registry.host().resize_subscribed() {
            self.registry.handle_host_resize();
        }
        self.collect();
        let now = self.now();
        self.run_until(now);
    }

    /// Scroll the host page by `dy` and fire a scroll event.
    pub fn scroll_by(&mut self, dy: f64) {
        self.registry.host_mut().scroll_by(dy);
        self.window_event(SamplingSignal::Scroll);
    }

    /// The frame's nested document goes away (or comes back).
    pub fn set_live(&mut self, live: bool) {
        self.registry.host_mut().set_live(live);
    }

    pub fn advance(&mut self, ms: f64) {
        let until = self.now() + ms;
        self.run_until(until);
    }

    /// Process channel deliveries and timers in time order up to `until`.
    /// Deliveries win ties with timers.
    pub fn run_until(&mut self, until: f64) {
        loop {
            let next_delivery = self.in_flight.front().map(|d| d.due).filter(|due| *due <= until);
            let next_timer = self.registry.host().next_due().filter(|due| *due <= until);

            match (next_delivery, next_timer) {
                (Some(delivery), Some(timer)) if timer < delivery => self.fire_timer(until),
                (Some(_), _) => self.deliver(),
                (None, Some(_)) => self.fire_timer(until),
                (None, None) => break,
            }
        }
        if until > self.now() {
            self.registry.host_mut().set_now(until);
        }
    }

    pub fn received(&self) -> &[Received] {
        &self.received
    }

    pub fn take_received(&mut self) -> Vec<Received> {
        std::mem::take(&mut self.received)
    }

    /// `(at, payload)` of every received message of `message_type`.
    pub fn received_of(&self, message_type: &str) -> Vec<(f64, String)> {
        self.received
            .iter()
            .filter(|r| r.message.message_type() == message_type)
            .map(|r| (r.at, r.message.payload()))
            .collect()
    }

    pub fn errors(&self) -> &[(f64, RegistryError)] {
        &self.errors
    }

    fn deliver(&mut self) {
        let Some(delivery) = self.in_flight.pop_front() else {
            return;
        };
        if delivery.due > self.now() {
            self.registry.host_mut().set_now(delivery.due);
        }
        if let Err(err) = self
            .registry
            .handle_message(&delivery.message_type, &delivery.payload)
        {
            warn!("{err}");
            self.errors.push((self.now(), err));
        }
        self.collect();
    }

    fn fire_timer(&mut self, until: f64) {
        if let Some(event) = self.registry.host_mut().pop_due(until) {
            self.registry.handle_timer(event);
        }
        self.collect();
    }

    /// Move host output into the simulated document, answering geometry
    /// requests.
    fn collect(&mut self) {
        let now = self.now();
        for message in self.registry.host_mut().take_sent() {
            if let Outbound::RequestBoundingClientRect { element } = &message {
                match self.document.get(element) {
                    Some(rect) => self.in_flight.push_back(Delivery {
                        due: now + self.latency_ms,
                        message_type: names::rect_return(element.as_str()),
                        payload: encode_rect(rect),
                    }),
                    None => debug!("embedded document has no element {element}"),
                }
            }
            self.received.push(Received { at: now, message });
        }
    }
}
