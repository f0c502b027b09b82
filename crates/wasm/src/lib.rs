//! Browser entry point: attaches a visibility-tracking registry to a pym
//! parent so the embedded document can ask for element tracking.

mod host;
mod logger;
mod timers;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use childtrack_core::{Registry, TrackerSettings};
use childtrack_protocol::messages::names;
use log::{LevelFilter, info, warn};
use wasm_bindgen::prelude::*;

use crate::host::{BrowserHost, SharedRegistry, on_message, with_registry};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    logger::init(LevelFilter::Info);
}

/// Set the console log level (`"error"` … `"trace"`, or `"off"`).
#[wasm_bindgen(js_name = setLogLevel)]
pub fn set_log_level(level: &str) -> Result<(), JsError> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| JsError::new(&format!("unknown log level: {level}")))?;
    logger::init(level);
    Ok(())
}

/// A registry bound to one pym parent. Tracking stops on
/// [`TrackerEndpoint::detach`] or when the handle is freed.
#[wasm_bindgen]
pub struct TrackerEndpoint {
    registry: Option<Rc<SharedRegistry>>,
}

#[wasm_bindgen]
impl TrackerEndpoint {
    /// Tear down every tracker and detach all window listeners.
    pub fn detach(&mut self) {
        if let Some(registry) = self.registry.take() {
            match registry.try_borrow_mut() {
                Ok(mut registry) => registry.shutdown(),
                Err(_) => warn!("detach while the registry is busy; shutting down on drop"),
            }
        }
    }

    #[wasm_bindgen(js_name = trackedCount)]
    pub fn tracked_count(&self) -> usize {
        self.registry
            .as_ref()
            .and_then(|registry| registry.try_borrow().ok().map(|r| r.len()))
            .unwrap_or(0)
    }
}

/// Attach tracking to `pym_parent` (a `pym.Parent`). `settings` is an
/// optional JSON object of timing overrides.
#[wasm_bindgen]
pub fn attach(pym_parent: JsValue, settings: Option<String>) -> Result<TrackerEndpoint, JsError> {
    let settings = match settings {
        Some(json) => {
            TrackerSettings::from_json(&json).map_err(|e| JsError::new(&e.to_string()))?
        }
        None => TrackerSettings::default(),
    };
    let window = web_sys::window().ok_or_else(|| JsError::new("no window"))?;

    let registry: Rc<SharedRegistry> = Rc::new_cyclic(|weak| {
        let host = BrowserHost::new(window, pym_parent.clone(), weak.clone());
        RefCell::new(Registry::new(host, settings))
    });

    for message_type in names::FIXED_INBOUND {
        let handler = message_handler(Rc::downgrade(&registry), message_type);
        on_message(&pym_parent, message_type, &handler).map_err(|err| {
            JsError::new(&format!("pym.onMessage({message_type}) failed: {err:?}"))
        })?;
    }

    info!("visibility tracking attached ({settings:?})");
    Ok(TrackerEndpoint {
        registry: Some(registry),
    })
}

fn message_handler(registry: Weak<SharedRegistry>, message_type: &'static str) -> JsValue {
    Closure::<dyn FnMut(JsValue)>::new(move |payload: JsValue| {
        let payload = payload.as_string().unwrap_or_default();
        with_registry(&registry, |registry| {
            if let Err(err) = registry.handle_message(message_type, &payload) {
                warn!("{err}");
            }
        });
    })
    .into_js_value()
}
