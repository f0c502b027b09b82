//! [`Host`] implementation backed by the browser window and a pym parent.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Weak;

use childtrack_core::title::apply_unread_delta;
use childtrack_core::{Host, Registry, SamplingSignal, Subscription, TimerEvent, TimerId, Timers};
use childtrack_protocol::messages::names;
use childtrack_protocol::{FrameBounds, Outbound, Rect, TrackedElementId};
use js_sys::{Function, Reflect};
use log::{trace, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::timers::TimerTable;

pub(crate) type SharedRegistry = RefCell<Registry<BrowserHost>>;
type EventClosure = Closure<dyn FnMut(web_sys::Event)>;
type TimerClosure = Closure<dyn FnMut()>;

/// Window listeners attached for one subscription.
struct Listener {
    events: Vec<&'static str>,
    closure: EventClosure,
}

pub struct BrowserHost {
    window: web_sys::Window,
    pym: JsValue,
    registry: Weak<SharedRegistry>,
    next_subscription: u64,
    listeners: HashMap<u64, Listener>,
    timers: TimerTable<TimerClosure>,
    /// Ids whose geometry reply handler is registered with pym. pym cannot
    /// unregister a handler, so each id gets exactly one.
    rect_handlers: HashSet<TrackedElementId>,
}

impl std::fmt::Debug for BrowserHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserHost")
            .field("listeners", &self.listeners.len())
            .field("timers", &self.timers.len())
            .field("rect_handlers", &self.rect_handlers.len())
            .finish_non_exhaustive()
    }
}

impl BrowserHost {
    pub(crate) fn new(window: web_sys::Window, pym: JsValue, registry: Weak<SharedRegistry>) -> Self {
        Self {
            window,
            pym,
            registry,
            next_subscription: 1,
            listeners: HashMap::new(),
            timers: TimerTable::new(),
            rect_handlers: HashSet::new(),
        }
    }

    fn listen(&mut self, events: Vec<&'static str>, closure: EventClosure) -> Subscription {
        for event in &events {
            if let Err(err) = self
                .window
                .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            {
                warn!("failed to listen for {event}: {err:?}");
            }
        }
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.insert(id, Listener { events, closure });
        Subscription::new(id)
    }

    fn register_rect_handler(&mut self, element: &TrackedElementId) {
        if !self.rect_handlers.insert(element.clone()) {
            return;
        }
        let registry = self.registry.clone();
        let message_type = names::rect_return(element.as_str());
        let handler_type = message_type.clone();
        let handler = Closure::<dyn FnMut(JsValue)>::new(move |payload: JsValue| {
            let payload = payload.as_string().unwrap_or_default();
            with_registry(&registry, |registry| {
                if let Err(err) = registry.handle_message(&handler_type, &payload) {
                    warn!("{err}");
                }
            });
        });
        if let Err(err) = on_message(&self.pym, &message_type, &handler.into_js_value()) {
            warn!("failed to register {message_type}: {err:?}");
        }
    }

    fn pym_element(&self, field: &str) -> Option<web_sys::Element> {
        Reflect::get(&self.pym, &JsValue::from_str(field))
            .ok()?
            .dyn_into::<web_sys::Element>()
            .ok()
    }

    fn viewport_width(&self) -> f64 {
        let root = self.window.document().and_then(|d| d.document_element());
        viewport_dimension(
            self.window.inner_width().ok().and_then(|v| v.as_f64()),
            root.map(|el| el.client_width()),
        )
    }

    fn viewport_height_or_client(&self) -> f64 {
        let root = self.window.document().and_then(|d| d.document_element());
        viewport_dimension(
            self.window.inner_height().ok().and_then(|v| v.as_f64()),
            root.map(|el| el.client_height()),
        )
    }
}

impl Timers for BrowserHost {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    fn set_timeout(&mut self, delay_ms: u32, event: TimerEvent) -> TimerId {
        let id = self.timers.reserve();
        let registry = self.registry.clone();
        // Taking the entry drops this closure mid-call; wasm-bindgen defers
        // the free until it returns.
        let callback = TimerClosure::new(move || {
            with_registry(&registry, |registry| {
                if let Some(event) = registry.host_mut().timers.fire(id) {
                    registry.handle_timer(event);
                }
            });
        });
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        match self.window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            delay,
        ) {
            Ok(handle) => self.timers.insert(id, handle, event, callback),
            Err(err) => warn!("setTimeout failed: {err:?}"),
        }
        id
    }

    fn clear_timeout(&mut self, timer: TimerId) {
        if let Some(handle) = self.timers.cancel(timer) {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}

impl Host for BrowserHost {
    fn send(&mut self, message: Outbound) {
        let result = Reflect::get(&self.pym, &JsValue::from_str("sendMessage"))
            .and_then(<JsValue as JsCast>::dyn_into::<Function>)
            .and_then(|send| {
                send.call2(
                    &self.pym,
                    &JsValue::from_str(message.message_type()),
                    &JsValue::from_str(&message.payload()),
                )
            });
        if let Err(err) = result {
            warn!("sendMessage({}) failed: {err:?}", message.message_type());
        }
    }

    fn has_live_document(&self) -> bool {
        self.pym_element("el")
            .map(|el| el.get_elements_by_tag_name("iframe").length() > 0)
            .unwrap_or(false)
    }

    fn frame_bounds(&self) -> Option<FrameBounds> {
        let rect = self.pym_element("iframe")?.get_bounding_client_rect();
        Some(FrameBounds::new(
            Rect::new(rect.top(), rect.left(), rect.bottom(), rect.right()),
            self.viewport_width(),
            self.viewport_height_or_client(),
        ))
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height_or_client()
    }

    fn apply_unread_delta(&mut self, delta: i64) {
        if let Some(document) = self.window.document() {
            let title = apply_unread_delta(&document.title(), delta);
            trace!("title -> {title}");
            document.set_title(&title);
        }
    }

    fn subscribe_sampling(&mut self, element: &TrackedElementId) -> Subscription {
        self.register_rect_handler(element);
        let registry = self.registry.clone();
        let target = element.clone();
        let closure = EventClosure::new(move |event: web_sys::Event| {
            let Some(signal) = SamplingSignal::from_event_name(&event.type_()) else {
                return;
            };
            with_registry(&registry, |registry| registry.handle_sampling(&target, signal));
        });
        let events = SamplingSignal::ALL.into_iter().map(SamplingSignal::event_name).collect();
        self.listen(events, closure)
    }

    fn subscribe_resize(&mut self) -> Subscription {
        let registry = self.registry.clone();
        let closure = EventClosure::new(move |_event: web_sys::Event| {
            with_registry(&registry, Registry::handle_host_resize);
        });
        self.listen(vec![SamplingSignal::Resize.event_name()], closure)
    }

    fn release(&mut self, subscription: Subscription) {
        let Some(listener) = self.listeners.remove(&subscription.raw()) else {
            warn!("released unknown subscription {}", subscription.raw());
            return;
        };
        for event in &listener.events {
            if let Err(err) = self
                .window
                .remove_event_listener_with_callback(event, listener.closure.as_ref().unchecked_ref())
            {
                warn!("failed to detach {event}: {err:?}");
            }
        }
    }
}

impl Drop for BrowserHost {
    fn drop(&mut self) {
        for handle in self.timers.drain_handles() {
            self.window.clear_timeout_with_handle(handle);
        }
        for (_, listener) in self.listeners.drain() {
            for event in &listener.events {
                let _ = self
                    .window
                    .remove_event_listener_with_callback(event, listener.closure.as_ref().unchecked_ref());
            }
        }
    }
}

/// `innerWidth || documentElement.clientWidth`: a missing or zero window
/// dimension falls back to the root element's client size.
fn viewport_dimension(inner: Option<f64>, client: Option<i32>) -> f64 {
    inner
        .filter(|v| *v > 0.0)
        .or_else(|| client.map(f64::from))
        .unwrap_or(0.0)
}

/// Run `f` against the registry if it is still alive and not already
/// borrowed further up the stack.
pub(crate) fn with_registry(registry: &Weak<SharedRegistry>, f: impl FnOnce(&mut Registry<BrowserHost>)) {
    let Some(registry) = registry.upgrade() else {
        trace!("registry detached; dropping callback");
        return;
    };
    match registry.try_borrow_mut() {
        Ok(mut registry) => f(&mut registry),
        Err(_) => warn!("re-entrant callback dropped"),
    }
}

/// `pym.onMessage(messageType, handler)`.
pub(crate) fn on_message(pym: &JsValue, message_type: &str, handler: &JsValue) -> Result<(), JsValue> {
    let on_message = Reflect::get(pym, &JsValue::from_str("onMessage"))?.dyn_into::<Function>()?;
    on_message.call2(pym, &JsValue::from_str(message_type), handler)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::viewport_dimension;

    #[test]
    fn window_size_wins_when_present() {
        assert_eq!(viewport_dimension(Some(800.0), Some(640)), 800.0);
    }

    #[test]
    fn missing_or_zero_window_size_uses_client_size() {
        assert_eq!(viewport_dimension(None, Some(640)), 640.0);
        assert_eq!(viewport_dimension(Some(0.0), Some(640)), 640.0);
        assert_eq!(viewport_dimension(None, None), 0.0);
    }
}
