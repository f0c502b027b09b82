use std::collections::BTreeMap;

use anyhow::{Result, ensure};
use childtrack_core::sim::Harness;
use childtrack_core::{SamplingSignal, TrackerSettings};
use childtrack_protocol::{FrameBounds, Rect};
use serde::Deserialize;

/// Time the replay keeps running after the last step when `until` is absent.
const SETTLE_MS: f64 = 2_000.0;

/// A scripted session: initial geometry plus timestamped actions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    #[serde(default)]
    pub settings: TrackerSettings,
    pub bounds: FrameBounds,
    /// One-way channel latency.
    #[serde(default)]
    pub latency_ms: f64,
    /// Initial element rects inside the embedded document.
    #[serde(default)]
    pub elements: BTreeMap<String, Rect>,
    #[serde(default)]
    pub steps: Vec<Step>,
    pub until: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Step {
    pub at: f64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    /// The embedded document posts a raw channel message.
    Post {
        #[serde(rename = "type")]
        message_type: String,
        #[serde(default)]
        payload: String,
    },
    /// Move an element inside the embedded document.
    Place { element: String, rect: Rect },
    /// Delete an element from the embedded document.
    Remove { element: String },
    /// Scroll the host page by `by` pixels and fire a scroll event.
    Scroll { by: f64 },
    /// Fire a host window event.
    Window { event: SamplingSignal },
    Unload,
    Reload,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Run the script to completion and return the harness for reporting.
pub fn run(script: &Script) -> Result<Harness> {
    let mut harness = Harness::new(script.settings, script.bounds, script.latency_ms);
    for (element, rect) in &script.elements {
        harness.place(element, *rect);
    }

    let mut steps: Vec<(usize, &Step)> = script.steps.iter().enumerate().collect();
    for (index, step) in &steps {
        ensure!(
            step.at.is_finite() && step.at >= 0.0,
            "step {index} has invalid time {}",
            step.at
        );
    }
    // Stable: steps sharing a timestamp keep their script order.
    steps.sort_by(|(_, a), (_, b)| a.at.total_cmp(&b.at));

    let mut last = 0.0_f64;
    for (_, step) in steps {
        harness.run_until(step.at);
        apply(&mut harness, &step.action);
        last = last.max(step.at);
    }

    let until = script.until.unwrap_or(last + SETTLE_MS);
    harness.run_until(until);
    Ok(harness)
}

fn apply(harness: &mut Harness, action: &Action) {
    match action {
        Action::Post {
            message_type,
            payload,
        } => harness.post(message_type, payload),
        Action::Place { element, rect } => harness.place(element, *rect),
        Action::Remove { element } => harness.remove_element(element),
        Action::Scroll { by } => harness.scroll_by(*by),
        Action::Window { event } => harness.window_event(*event),
        Action::Unload => harness.set_live(false),
        Action::Reload => harness.set_live(true),
    }
}
