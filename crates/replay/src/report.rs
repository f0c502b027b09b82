use std::io::Write;

use anyhow::Result;
use childtrack_core::sim::Harness;
use childtrack_protocol::Outbound;
use serde::Serialize;

#[derive(Serialize)]
struct LogLine<'a> {
    at: f64,
    #[serde(flatten)]
    message: &'a Outbound,
}

/// Write the host → embedded message log, then a tracker summary.
pub fn write_report<W: Write>(out: &mut W, harness: &Harness, json: bool) -> Result<()> {
    for received in harness.received() {
        if json {
            let line = LogLine {
                at: received.at,
                message: &received.message,
            };
            writeln!(out, "{}", serde_json::to_string(&line)?)?;
        } else {
            writeln!(
                out,
                "{:>9.1}ms  {:<28} {}",
                received.at,
                received.message.message_type(),
                received.message.payload()
            )?;
        }
    }

    if json {
        return Ok(());
    }

    writeln!(out)?;
    let registry = harness.registry();
    writeln!(out, "trackers: {}", registry.len())?;
    for id in registry.tracked_ids() {
        if let Some(tracker) = registry.tracker(id.as_str()) {
            writeln!(
                out,
                "  {:<20} {:?} visible={}",
                id.as_str(),
                tracker.phase(),
                tracker.is_visible()
            )?;
        }
    }

    for (at, err) in harness.errors() {
        writeln!(out, "error at {at:.1}ms: {err}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use childtrack_core::TrackerSettings;
    use childtrack_protocol::{FrameBounds, Rect};

    fn harness() -> Harness {
        let bounds = FrameBounds::new(Rect::new(0.0, 0.0, 2000.0, 1024.0), 1024.0, 800.0);
        let mut harness = Harness::new(TrackerSettings::default(), bounds, 0.0);
        harness.place("fc1", Rect::new(50.0, 10.0, 200.0, 100.0));
        harness.post("request-tracking", "fc1");
        harness.post("remove-tracker", "ghost");
        harness.run_until(600.0);
        harness
    }

    #[test]
    fn text_report_lists_messages_and_trackers() {
        let mut out = Vec::new();
        write_report(&mut out, &harness(), false).expect("failed to write text report");
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("on-screen"), "{text}");
        assert!(text.contains("trackers: 1"));
        assert!(text.contains("Read visible=true"));
        assert!(text.contains("error at 0.0ms: remove-tracker for `ghost`"));
    }

    #[test]
    fn json_report_is_one_object_per_line() {
        let mut out = Vec::new();
        write_report(&mut out, &harness(), true).expect("failed to write json report");
        let text = String::from_utf8_lossy(&out);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], r#"{"at":500.0,"kind":"on-screen","element":"fc1"}"#);
    }
}
