//! Host-side visibility tracking for elements inside an embedded frame.
//!
//! The embedded document asks the host to track element ids; the host
//! requests each element's geometry over the channel, tests it against the
//! frame's on-screen region and reports `element-visible` and, after the
//! read delay, `on-screen`.

pub mod alarm;
pub mod host;
pub mod registry;
pub mod settings;
pub mod sim;
pub mod throttle;
pub mod title;
pub mod tracker;
pub mod viewport;

pub use host::{Host, SamplingSignal, Subscription, TimerEvent, TimerId, TimerKind, Timers};
pub use registry::{Registry, RegistryError};
pub use settings::{ConfigError, TrackerSettings};
pub use tracker::{TrackerPhase, VisibilityTracker};
