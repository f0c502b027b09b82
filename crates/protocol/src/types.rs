use serde::{Deserialize, Serialize};

/// An element's bounding rectangle as reported by the document that owns it.
///
/// Coordinates are in that document's own client space; nothing here is
/// validated, so fields may be NaN when the reporter sent garbage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// A rect with every field NaN (what a fully malformed payload decodes to).
    pub fn nan() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    /// Whether all four fields are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.top.is_finite()
            && self.left.is_finite()
            && self.bottom.is_finite()
            && self.right.is_finite()
    }

    /// The same rect shifted vertically by `dy`.
    pub fn offset_y(&self, dy: f64) -> Self {
        Self::new(self.top + dy, self.left, self.bottom + dy, self.right)
    }
}

/// Geometry of the embedding frame as seen from the host document.
///
/// Sampled fresh for every evaluation; never cache one across samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameBounds {
    /// The frame element's bounding rect in host client coordinates.
    pub frame: Rect,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl FrameBounds {
    pub fn new(frame: Rect, viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            frame,
            viewport_width,
            viewport_height,
        }
    }

    /// Lowest y, in frame coordinates, that is still on screen.
    ///
    /// A frame whose top sits 100px above the host viewport (`frame.top ==
    /// -100`) inside an 800px viewport shows its content down to y = 900.
    pub fn vertical_bound(&self) -> f64 {
        self.viewport_height - self.frame.top
    }

    /// Highest y, in frame coordinates, that is still on screen.
    pub fn upper_bound(&self) -> f64 {
        self.vertical_bound() - self.viewport_height
    }

    /// Bounds after the host page scrolled down by `dy` pixels.
    pub fn scrolled_by(&self, dy: f64) -> Self {
        Self {
            frame: self.frame.offset_y(-dy),
            ..*self
        }
    }
}
