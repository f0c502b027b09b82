/// Apply an unread-count delta to a document title of the form `"(3) Title"`.
///
/// The first `(<digits>)` group anywhere in the title is the counter and
/// everything after it is kept as the rest. With a counter present, a zero
/// delta resets it; otherwise the delta is added. A count that ends up at or
/// below zero removes the counter. Without a counter only a positive delta
/// adds one.
pub fn apply_unread_delta(title: &str, delta: i64) -> String {
    match split_counter(title) {
        Some((count, rest)) => {
            let count = if delta == 0 {
                0
            } else {
                count.saturating_add(delta)
            };
            if count > 0 {
                format!("({count}){rest}")
            } else {
                rest.trim().to_owned()
            }
        }
        None if delta > 0 => format!("({delta}) {title}"),
        None => title.to_owned(),
    }
}

/// Find the first `(<digits>)` and return the count plus the text after it.
fn split_counter(title: &str) -> Option<(i64, &str)> {
    title.match_indices('(').find_map(|(open, _)| {
        let after = &title[open + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 || after.as_bytes().get(digits) != Some(&b')') {
            return None;
        }
        let count = after[..digits].parse::<i64>().unwrap_or(i64::MAX);
        Some((count, &after[digits + 1..]))
    })
}
