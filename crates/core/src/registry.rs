use std::collections::HashMap;

use childtrack_protocol::{Inbound, Outbound, ProtocolError, TrackedElementId};
use log::{debug, trace, warn};
use thiserror::Error;

use crate::host::{Host, SamplingSignal, Subscription, TimerEvent};
use crate::settings::TrackerSettings;
use crate::tracker::VisibilityTracker;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("remove-tracker for `{0}`, which is not tracked")]
    UnknownTracker(TrackedElementId),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Owns the trackers of one channel endpoint and dispatches everything the
/// host delivers to them.
///
/// One registry exists per embedded-document instance. It subscribes to host
/// resizes on construction and releases everything in
/// [`Registry::shutdown`] (also run on drop).
#[derive(Debug)]
pub struct Registry<H: Host> {
    host: H,
    settings: TrackerSettings,
    trackers: HashMap<TrackedElementId, VisibilityTracker>,
    next_generation: u64,
    resize: Option<Subscription>,
}

impl<H: Host> Registry<H> {
    pub fn new(mut host: H, settings: TrackerSettings) -> Self {
        let resize = host.subscribe_resize();
        Self {
            host,
            settings,
            trackers: HashMap::new(),
            next_generation: 1,
            resize: Some(resize),
        }
    }

    /// Parse and dispatch one raw channel message.
    pub fn handle_message(&mut self, message_type: &str, payload: &str) -> Result<(), RegistryError> {
        let message = Inbound::parse(message_type, payload)?;
        self.dispatch(message)
    }

    /// Dispatch a typed inbound message.
    pub fn dispatch(&mut self, message: Inbound) -> Result<(), RegistryError> {
        match message {
            Inbound::RequestTracking { element } => {
                self.start_tracking(element);
                Ok(())
            }
            Inbound::RemoveTracker { element } => self.remove_tracker(&element),
            Inbound::TestVisibilityTracker => {
                self.send_if_live(Outbound::VisibilityAvailable { available: true });
                Ok(())
            }
            Inbound::GetViewportHeight => {
                self.publish_viewport_height();
                Ok(())
            }
            Inbound::UpdateParentTitle { delta } => {
                self.host.apply_unread_delta(delta);
                Ok(())
            }
            Inbound::BoundingRectReturn { element, rect } => {
                match self.trackers.get_mut(&element) {
                    Some(tracker) => {
                        tracker.on_geometry(&mut self.host, rect);
                    }
                    None => debug!("dropping geometry for untracked element {element}"),
                }
                Ok(())
            }
        }
    }

    /// Deliver a fired timer to the tracker that armed it.
    pub fn handle_timer(&mut self, event: TimerEvent) {
        match self.trackers.get_mut(&event.element) {
            Some(tracker) if tracker.generation() == event.generation => {
                tracker.on_timer(&mut self.host, event.kind);
            }
            _ => trace!(
                "dropping stale {:?} timer for {} (generation {})",
                event.kind,
                event.element,
                event.generation
            ),
        }
    }

    /// Deliver a host window event to one tracker's sampling subscription.
    pub fn handle_sampling(&mut self, element: &TrackedElementId, signal: SamplingSignal) {
        match self.trackers.get_mut(element) {
            Some(tracker) => tracker.on_sampling(&mut self.host, signal),
            None => trace!("dropping {signal:?} for untracked element {element}"),
        }
    }

    /// The host window was resized.
    pub fn handle_host_resize(&mut self) {
        self.publish_viewport_height();
    }

    /// Tear down every tracker and release the resize subscription.
    pub fn shutdown(&mut self) {
        for (_, tracker) in self.trackers.drain() {
            tracker.stop(&mut self.host);
        }
        if let Some(resize) = self.resize.take() {
            self.host.release(resize);
        }
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    pub fn is_tracking(&self, element: &str) -> bool {
        self.trackers.contains_key(element)
    }

    pub fn tracker(&self, element: &str) -> Option<&VisibilityTracker> {
        self.trackers.get(element)
    }

    /// Tracked ids in sorted order.
    pub fn tracked_ids(&self) -> Vec<TrackedElementId> {
        let mut ids: Vec<_> = self.trackers.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// A second request for a tracked id replaces the old tracker after
    /// tearing it down, so its timers and listeners do not leak.
    fn start_tracking(&mut self, element: TrackedElementId) {
        if let Some(existing) = self.trackers.remove(&element) {
            warn!("{element} requested tracking twice; replacing the existing tracker");
            existing.stop(&mut self.host);
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        let tracker =
            VisibilityTracker::start(&mut self.host, element.clone(), generation, self.settings);
        self.trackers.insert(element, tracker);
    }

    fn remove_tracker(&mut self, element: &TrackedElementId) -> Result<(), RegistryError> {
        let tracker = self
            .trackers
            .remove(element)
            .ok_or_else(|| RegistryError::UnknownTracker(element.clone()))?;
        tracker.stop(&mut self.host);
        Ok(())
    }

    fn publish_viewport_height(&mut self) {
        let height = self.host.viewport_height();
        self.send_if_live(Outbound::ViewportHeight { height });
    }

    fn send_if_live(&mut self, message: Outbound) {
        if self.host.has_live_document() {
            self.host.send(message);
        } else {
            trace!("suppressed {}: no live document", message.message_type());
        }
    }
}

impl<H: Host> Drop for Registry<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TimerKind;
    use crate::sim::ManualHost;
    use childtrack_protocol::{FrameBounds, Rect};

    fn registry() -> Registry<ManualHost> {
        let host = ManualHost::new(FrameBounds::new(
            Rect::new(-100.0, 0.0, 1900.0, 1024.0),
            1024.0,
            800.0,
        ));
        Registry::new(host, TrackerSettings::default())
    }

    #[test]
    fn request_tracking_creates_tracker() {
        let mut registry = registry();
        assert_eq!(registry.handle_message("request-tracking", "fc1"), Ok(()));
        assert!(registry.is_tracking("fc1"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.host_mut().take_sent(),
            vec![Outbound::RequestBoundingClientRect {
                element: "fc1".into()
            }]
        );
    }

    #[test]
    fn remove_unknown_is_an_error() {
        let mut registry = registry();
        assert_eq!(
            registry.handle_message("remove-tracker", "nope"),
            Err(RegistryError::UnknownTracker("nope".into()))
        );
    }

    #[test]
    fn remove_tears_down_tracker() {
        let mut registry = registry();
        registry
            .handle_message("request-tracking", "fc1")
            .expect("message should dispatch");
        registry
            .handle_message("fc1-bounding-client-rect-return", "50 10 200 100")
            .expect("message should dispatch");
        assert_eq!(registry.host().pending_timers(), 2);

        assert_eq!(registry.handle_message("remove-tracker", "fc1"), Ok(()));
        assert!(registry.is_empty());
        assert_eq!(registry.host().pending_timers(), 0);
        // Only the resize subscription remains.
        assert_eq!(registry.host().active_subscriptions(), 1);
    }

    #[test]
    fn duplicate_request_replaces_and_cleans_up() {
        let mut registry = registry();
        registry
            .handle_message("request-tracking", "fc1")
            .expect("message should dispatch");
        registry
            .handle_message("fc1-bounding-client-rect-return", "50 10 200 100")
            .expect("message should dispatch");
        let first_generation = registry.tracker("fc1").map(VisibilityTracker::generation);

        registry
            .handle_message("request-tracking", "fc1")
            .expect("message should dispatch");
        assert_eq!(registry.len(), 1);
        let second_generation = registry.tracker("fc1").map(VisibilityTracker::generation);
        assert_ne!(first_generation, second_generation);
        assert_eq!(registry.host().pending_timers(), 0);
        assert_eq!(registry.host().active_subscriptions(), 2);

        // A timer from the old generation is ignored.
        registry.host_mut().take_sent();
        registry.handle_timer(TimerEvent {
            element: "fc1".into(),
            generation: first_generation.expect("first tracker"),
            kind: TimerKind::ReadAlarm,
        });
        assert!(registry.host_mut().take_sent().is_empty());
    }

    #[test]
    fn capability_probe_and_height_query() {
        let mut registry = registry();
        registry
            .handle_message("test-visibility-tracker", "test")
            .expect("message should dispatch");
        registry
            .handle_message("get-viewport-height", "")
            .expect("message should dispatch");
        assert_eq!(
            registry.host_mut().take_sent(),
            vec![
                Outbound::VisibilityAvailable { available: true },
                Outbound::ViewportHeight { height: 800.0 },
            ]
        );
    }

    #[test]
    fn height_is_resampled_each_time() {
        let mut registry = registry();
        registry.host_mut().set_viewport_height(640.0);
        registry.handle_host_resize();
        assert_eq!(
            registry.host_mut().take_sent(),
            vec![Outbound::ViewportHeight { height: 640.0 }]
        );
    }

    #[test]
    fn probe_is_suppressed_without_document() {
        let mut registry = registry();
        registry.host_mut().set_live(false);
        registry
            .handle_message("test-visibility-tracker", "")
            .expect("message should dispatch");
        registry
            .handle_message("get-viewport-height", "")
            .expect("message should dispatch");
        assert!(registry.host_mut().take_sent().is_empty());
    }

    #[test]
    fn title_delta_is_forwarded() {
        let mut registry = registry();
        registry
            .handle_message("update-parent-title", "3")
            .expect("message should dispatch");
        registry
            .handle_message("update-parent-title", "-1")
            .expect("message should dispatch");
        assert_eq!(registry.host().unread_deltas(), &[3, -1]);
    }

    #[test]
    fn unknown_message_is_reported() {
        let mut registry = registry();
        assert!(matches!(
            registry.handle_message("resize-me", ""),
            Err(RegistryError::Protocol(ProtocolError::UnknownMessage(_)))
        ));
    }

    #[test]
    fn shutdown_releases_all_subscriptions() {
        let mut registry = registry();
        registry
            .handle_message("request-tracking", "a")
            .expect("message should dispatch");
        registry
            .handle_message("request-tracking", "b")
            .expect("message should dispatch");
        assert_eq!(registry.host().active_subscriptions(), 3);
        registry.shutdown();
        assert_eq!(registry.host().active_subscriptions(), 0);
        assert!(registry.is_empty());
        assert_eq!(registry.tracked_ids(), Vec::<TrackedElementId>::new());
    }
}
