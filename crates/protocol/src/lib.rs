pub mod element_id;
pub mod geometry;
pub mod messages;
pub mod types;

pub use element_id::TrackedElementId;
pub use geometry::{decode_rect, encode_rect};
pub use messages::{Inbound, Outbound, ProtocolError};
pub use types::{FrameBounds, Rect};
