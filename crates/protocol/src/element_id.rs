use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Id of one tracked element inside the embedded document.
///
/// The registry keys its table by it and looks entries up with the `&str`
/// taken straight from a channel payload. Every timer event a tracker arms
/// carries a copy, so clones share one allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TrackedElementId(Arc<str>);

impl TrackedElementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// `Hash` on `Arc<str>` hashes the string, so this agrees with `str`.
impl Borrow<str> for TrackedElementId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TrackedElementId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for TrackedElementId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<TrackedElementId> for String {
    fn from(id: TrackedElementId) -> Self {
        id.0.to_string()
    }
}

impl fmt::Display for TrackedElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn registry_style_lookup_by_payload_str() {
        let mut trackers = HashMap::new();
        trackers.insert(TrackedElementId::from("fc1"), "tracker");
        let payload = String::from("fc1");
        assert_eq!(trackers.get(payload.as_str()), Some(&"tracker"));
        assert!(trackers.remove("fc1").is_some());
        assert!(trackers.get("fc1").is_none());
    }

    #[test]
    fn timer_copies_share_the_allocation() {
        let id = TrackedElementId::from("post-42");
        let armed = id.clone();
        assert!(Arc::ptr_eq(&id.0, &armed.0));
        assert_eq!(id, armed);
        assert_ne!(id, TrackedElementId::from("post-43"));
    }

    #[test]
    fn serde_uses_the_bare_string() {
        let id = TrackedElementId::from("post-42");
        let json = serde_json::to_string(&id).expect("id should serialize");
        assert_eq!(json, "\"post-42\"");
        let back: TrackedElementId = serde_json::from_str(&json).expect("id should deserialize");
        assert_eq!(back, id);
        assert!(serde_json::from_str::<TrackedElementId>("42").is_err());
    }

    #[test]
    fn display_writes_the_raw_id() {
        let id = TrackedElementId::from("a b");
        assert_eq!(format!("<{id}>"), "<a b>");
        assert_eq!(id.as_str(), "a b");
    }
}
