use serde::Serialize;
use thiserror::Error;

use crate::element_id::TrackedElementId;
use crate::geometry::{decode_rect, encode_rect, format_js_number};
use crate::types::Rect;

/// Channel message type names, exactly as they appear on the wire.
pub mod names {
    pub const REQUEST_TRACKING: &str = "request-tracking";
    pub const REMOVE_TRACKER: &str = "remove-tracker";
    pub const TEST_VISIBILITY_TRACKER: &str = "test-visibility-tracker";
    pub const GET_VIEWPORT_HEIGHT: &str = "get-viewport-height";
    pub const UPDATE_PARENT_TITLE: &str = "update-parent-title";
    /// Suffix of the per-element geometry reply, `<id>-bounding-client-rect-return`.
    pub const RECT_RETURN_SUFFIX: &str = "-bounding-client-rect-return";

    pub const REQUEST_BOUNDING_CLIENT_RECT: &str = "request-bounding-client-rect";
    pub const ELEMENT_VISIBLE: &str = "element-visible";
    pub const ON_SCREEN: &str = "on-screen";
    pub const VISIBILITY_AVAILABLE: &str = "visibility-available";
    pub const VIEWPORT_HEIGHT: &str = "viewport-height";

    /// Inbound types with a fixed name (everything but geometry replies).
    pub const FIXED_INBOUND: [&str; 5] = [
        REQUEST_TRACKING,
        REMOVE_TRACKER,
        TEST_VISIBILITY_TRACKER,
        GET_VIEWPORT_HEIGHT,
        UPDATE_PARENT_TITLE,
    ];

    /// Message type of the geometry reply for `id`.
    pub fn rect_return(id: &str) -> String {
        format!("{id}{RECT_RETURN_SUFFIX}")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown message type `{0}`")]
    UnknownMessage(String),
    #[error("`{message_type}` requires an element id")]
    MissingElementId { message_type: &'static str },
    #[error("title delta `{0}` is not an integer")]
    InvalidDelta(String),
}

/// Messages sent by the embedded document to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    RequestTracking { element: TrackedElementId },
    RemoveTracker { element: TrackedElementId },
    TestVisibilityTracker,
    GetViewportHeight,
    UpdateParentTitle { delta: i64 },
    /// Geometry reply for one element. The rect is already decoded and may
    /// contain NaN fields.
    BoundingRectReturn { element: TrackedElementId, rect: Rect },
}

impl Inbound {
    /// Parse a `(type, payload)` pair received from the channel.
    pub fn parse(message_type: &str, payload: &str) -> Result<Self, ProtocolError> {
        use names::*;

        match message_type {
            REQUEST_TRACKING => Ok(Inbound::RequestTracking {
                element: element_id(REQUEST_TRACKING, payload)?,
            }),
            REMOVE_TRACKER => Ok(Inbound::RemoveTracker {
                element: element_id(REMOVE_TRACKER, payload)?,
            }),
            TEST_VISIBILITY_TRACKER => Ok(Inbound::TestVisibilityTracker),
            GET_VIEWPORT_HEIGHT => Ok(Inbound::GetViewportHeight),
            UPDATE_PARENT_TITLE => Ok(Inbound::UpdateParentTitle {
                delta: parse_delta(payload)?,
            }),
            other => match other.strip_suffix(RECT_RETURN_SUFFIX) {
                Some(id) if !id.is_empty() => Ok(Inbound::BoundingRectReturn {
                    element: TrackedElementId::from(id),
                    rect: decode_rect(payload),
                }),
                _ => Err(ProtocolError::UnknownMessage(other.to_owned())),
            },
        }
    }

    /// Wire type name of this message.
    pub fn message_type(&self) -> String {
        use names::*;

        match self {
            Inbound::RequestTracking { .. } => REQUEST_TRACKING.to_owned(),
            Inbound::RemoveTracker { .. } => REMOVE_TRACKER.to_owned(),
            Inbound::TestVisibilityTracker => TEST_VISIBILITY_TRACKER.to_owned(),
            Inbound::GetViewportHeight => GET_VIEWPORT_HEIGHT.to_owned(),
            Inbound::UpdateParentTitle { .. } => UPDATE_PARENT_TITLE.to_owned(),
            Inbound::BoundingRectReturn { element, .. } => rect_return(element.as_str()),
        }
    }

    /// Wire payload of this message.
    pub fn payload(&self) -> String {
        match self {
            Inbound::RequestTracking { element } | Inbound::RemoveTracker { element } => {
                element.to_string()
            }
            Inbound::TestVisibilityTracker | Inbound::GetViewportHeight => String::new(),
            Inbound::UpdateParentTitle { delta } => delta.to_string(),
            Inbound::BoundingRectReturn { rect, .. } => encode_rect(rect),
        }
    }
}

/// Messages sent by the host to the embedded document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Outbound {
    RequestBoundingClientRect { element: TrackedElementId },
    ElementVisible { element: TrackedElementId },
    OnScreen { element: TrackedElementId },
    VisibilityAvailable { available: bool },
    ViewportHeight { height: f64 },
}

impl Outbound {
    pub fn message_type(&self) -> &'static str {
        use names::*;

        match self {
            Outbound::RequestBoundingClientRect { .. } => REQUEST_BOUNDING_CLIENT_RECT,
            Outbound::ElementVisible { .. } => ELEMENT_VISIBLE,
            Outbound::OnScreen { .. } => ON_SCREEN,
            Outbound::VisibilityAvailable { .. } => VISIBILITY_AVAILABLE,
            Outbound::ViewportHeight { .. } => VIEWPORT_HEIGHT,
        }
    }

    pub fn payload(&self) -> String {
        match self {
            Outbound::RequestBoundingClientRect { element }
            | Outbound::ElementVisible { element }
            | Outbound::OnScreen { element } => element.to_string(),
            Outbound::VisibilityAvailable { available } => available.to_string(),
            Outbound::ViewportHeight { height } => format_js_number(*height),
        }
    }

    /// The element this message concerns, if any.
    pub fn element(&self) -> Option<&TrackedElementId> {
        match self {
            Outbound::RequestBoundingClientRect { element }
            | Outbound::ElementVisible { element }
            | Outbound::OnScreen { element } => Some(element),
            Outbound::VisibilityAvailable { .. } | Outbound::ViewportHeight { .. } => None,
        }
    }
}

fn element_id(message_type: &'static str, payload: &str) -> Result<TrackedElementId, ProtocolError> {
    if payload.is_empty() {
        return Err(ProtocolError::MissingElementId { message_type });
    }
    Ok(TrackedElementId::from(payload))
}

/// Deltas arrive as stringified integers; an empty payload counts as 0.
fn parse_delta(payload: &str) -> Result<i64, ProtocolError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .parse::<i64>()
        .map_err(|_| ProtocolError::InvalidDelta(payload.to_owned()))
}
